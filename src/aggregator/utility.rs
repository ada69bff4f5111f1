/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Rounds to one decimal place, the precision every chart shows.
///
/// Works on the exact binary value with ties to even, so `2.25` gives `2.2`
/// and `1.15` (stored just below) gives `1.1`.
pub fn round1(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

/// Percentage of `part` in `total`, 0.0 when there is nothing to divide.
pub fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(5.56), 5.6);
        assert_eq!(round1(3.333), 3.3);
        assert_eq!(round1(0.0), 0.0);
    }

    #[test]
    fn test_round1_exact_ties_to_even() {
        assert_eq!(round1(2.25), 2.2);
        assert_eq!(round1(2.75), 2.8);
        assert_eq!(round1(1.15), 1.1);
        assert_eq!(round1(2.35), 2.4);
        assert_eq!(round1(-2.25), -2.2);
        assert_eq!(round1(66.66666), 66.7);
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10, 0), 0.0);
        assert_eq!(pct(1, 4), 25.0);
    }
}
