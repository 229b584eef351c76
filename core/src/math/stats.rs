pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Sum of the known values, or `None` when nothing is known.
    pub fn sum_known(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
        values
            .into_iter()
            .flatten()
            .fold(None, |acc, value| Some(acc.unwrap_or(0.0) + value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_slice_is_none() {
        assert_eq!(StatsHelper::mean(&[]), None);
        assert_eq!(StatsHelper::mean(&[0.5, 1.0]), Some(0.75));
    }

    #[test]
    fn sum_known_skips_unknown_values() {
        assert_eq!(StatsHelper::sum_known([None, None]), None);
        assert_eq!(StatsHelper::sum_known([Some(10.0), None, Some(5.0)]), Some(15.0));
    }
}
