use serde_json::{Map, Value};

/// Reads a JSON number or numeric string.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(num) => num.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn non_empty_str(value: &Value) -> Option<&str> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// First key in `keys` whose value is a non-blank string.
pub fn first_str<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(non_empty_str))
}

/// First key in `keys` whose value is a number or numeric string.
pub fn first_number(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| object.get(*key).and_then(number))
}

/// Like [`first_str`] but also renders numeric ids as text.
pub fn first_scalar_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key) {
        Some(Value::Number(num)) => Some(num.to_string()),
        Some(other) => non_empty_str(other).map(str::to_string),
        None => None,
    })
}

/// Maps a raw confidence onto `[0, 1]`; values in `(1, 100]` are percentages.
pub fn unit_fraction(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        0.0
    } else if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        raw.min(1.0)
    }
}
