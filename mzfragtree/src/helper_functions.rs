/// The relative tolerance used when comparing scores, to be robust against rounding differences
/// from summing the same scores in a different order.
pub const SCORE_EPSILON: f64 = 1e-9;

/// The absolute tolerance for comparisons against the given score, zero for infinite scores.
pub(crate) fn tolerance(score: f64) -> f64 {
    if score.is_finite() {
        SCORE_EPSILON * score.abs().max(1.0)
    } else {
        0.0
    }
}

/// Check if the score is certainly below the bound, allowing for rounding errors
pub(crate) fn below_bound(score: f64, bound: f64) -> bool {
    score < bound - tolerance(bound)
}

/// Check if two scores are equal, allowing for rounding errors
pub(crate) fn same_score(a: f64, b: f64) -> bool {
    (a - b).abs() <= tolerance(a.abs().max(b.abs()))
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn comparisons() {
        assert!(below_bound(1.0, 2.0));
        assert!(!below_bound(2.0 - 1e-12, 2.0));
        assert!(!below_bound(f64::NEG_INFINITY, f64::NEG_INFINITY));
        assert!(below_bound(1e300, f64::INFINITY));
        assert!(!below_bound(-1e300, f64::NEG_INFINITY));
        assert!(same_score(0.1 + 0.2, 0.3));
        assert!(!same_score(1.0, 1.001));
    }
}
