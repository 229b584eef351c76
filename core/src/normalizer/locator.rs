use crate::wire::value::non_empty_str;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Keys searched, in order, for an image locator.
pub const LOCATOR_KEYS: [&str; 7] = [
    "image_url",
    "image",
    "image_path",
    "output_path",
    "path",
    "url",
    "imageUrl",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiBaseError {
    #[error("api base is empty")]
    Empty,
    #[error("api base {0:?} has no http(s) scheme")]
    MissingScheme(String),
}

/// Base URL of the detection service, stored without a trailing separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiBase(String);

impl ApiBase {
    pub fn parse(raw: &str) -> Result<Self, ApiBaseError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ApiBaseError::Empty);
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ApiBaseError::MissingScheme(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins `path` onto the base with exactly one separator.
    pub fn join(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.0.clone()
        } else {
            format!("{}/{}", self.0, path)
        }
    }

    /// Absolute locators pass through; relative and rooted paths hang off the base.
    pub fn resolve_locator(&self, candidate: &str) -> String {
        let candidate = candidate.trim();
        if has_scheme(candidate) {
            return candidate.to_string();
        }
        // Query and fragment are left untouched.
        let (path, suffix) = candidate.split_at(candidate.find(['?', '#']).unwrap_or(candidate.len()));
        let path = collapse_separators(&path.replace('\\', "/"));
        format!("{}{}", self.join(&path), suffix)
    }

    /// First non-blank string among [`LOCATOR_KEYS`], scanning `scopes` in order.
    pub fn find_locator(&self, scopes: &[&Map<String, Value>]) -> Option<String> {
        scopes.iter().find_map(|scope| {
            LOCATOR_KEYS
                .iter()
                .find_map(|key| scope.get(*key).and_then(non_empty_str))
                .map(|candidate| self.resolve_locator(candidate))
        })
    }
}

impl TryFrom<String> for ApiBase {
    type Error = ApiBaseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ApiBase> for String {
    fn from(base: ApiBase) -> Self {
        base.0
    }
}

impl fmt::Display for ApiBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn has_scheme(candidate: &str) -> bool {
    if candidate.starts_with("data:") {
        return true;
    }
    match candidate.find("://") {
        Some(idx) if idx > 0 => candidate[..idx]
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.')),
        _ => false,
    }
}

fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !previous_slash {
                out.push(ch);
            }
            previous_slash = true;
        } else {
            out.push(ch);
            previous_slash = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ApiBase {
        ApiBase::parse("http://localhost:8000/").unwrap()
    }

    #[test]
    fn parse_strips_trailing_separators() {
        assert_eq!(base().as_str(), "http://localhost:8000");
        assert_eq!(ApiBase::parse("  "), Err(ApiBaseError::Empty));
        assert!(matches!(
            ApiBase::parse("localhost:8000"),
            Err(ApiBaseError::MissingScheme(_))
        ));
    }

    #[test]
    fn absolute_locators_are_kept() {
        assert_eq!(
            base().resolve_locator("https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(base().resolve_locator("data:image/jpeg;base64,AAA"), "data:image/jpeg;base64,AAA");
    }

    #[test]
    fn rooted_and_relative_paths_join_with_one_separator() {
        assert_eq!(
            base().resolve_locator("/static/results/a.jpg"),
            "http://localhost:8000/static/results/a.jpg"
        );
        assert_eq!(
            base().resolve_locator("static//results/a.jpg"),
            "http://localhost:8000/static/results/a.jpg"
        );
        assert_eq!(
            base().resolve_locator("static\\results\\a.jpg"),
            "http://localhost:8000/static/results/a.jpg"
        );
    }

    #[test]
    fn query_string_is_kept_verbatim() {
        assert_eq!(
            base().resolve_locator("static//a.jpg?src=http://x//y"),
            "http://localhost:8000/static/a.jpg?src=http://x//y"
        );
        assert_eq!(
            base().resolve_locator("out\\a.png#frag\\1"),
            "http://localhost:8000/out/a.png#frag\\1"
        );
    }

    #[test]
    fn first_string_candidate_wins() {
        let object = json!({"image_url": 5, "image": "", "image_path": "out/a.png", "url": "http://x/y.png"});
        let object = object.as_object().unwrap();
        assert_eq!(
            base().find_locator(&[object]),
            Some("http://localhost:8000/out/a.png".to_string())
        );
    }

    #[test]
    fn missing_candidates_leave_no_locator() {
        let object = json!({"detections": []});
        assert_eq!(base().find_locator(&[object.as_object().unwrap()]), None);
    }
}
