//! Risk classification.
//!
//! Every bucket decision in the application goes through [`classify`], so
//! the thresholds below are the only place the policy is written down.

use crate::models::RiskLevel;

/// Scores at or above this are at least Medium.
pub const MEDIUM_RISK_THRESHOLD: f64 = 30.0;

/// Scores at or above this are High.
pub const HIGH_RISK_THRESHOLD: f64 = 50.0;

/// Score used for display and bucketing; absent or NaN counts as 0.
pub fn effective_score(score: Option<f64>) -> f64 {
    match score {
        Some(s) if !s.is_nan() => s,
        _ => 0.0,
    }
}

/// Map a resilience score to its risk bucket.
pub fn classify(score: Option<f64>) -> RiskLevel {
    let score = effective_score(score);
    if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(Some(29.999)), RiskLevel::Low);
        assert_eq!(classify(Some(30.0)), RiskLevel::Medium);
        assert_eq!(classify(Some(49.999)), RiskLevel::Medium);
        assert_eq!(classify(Some(50.0)), RiskLevel::High);
    }

    #[test]
    fn test_absent_and_zero_are_low() {
        assert_eq!(classify(None), RiskLevel::Low);
        assert_eq!(classify(Some(0.0)), RiskLevel::Low);
        assert_eq!(classify(Some(f64::NAN)), RiskLevel::Low);
    }

    #[test]
    fn test_total_over_reals() {
        assert_eq!(classify(Some(-15.0)), RiskLevel::Low);
        assert_eq!(classify(Some(f64::INFINITY)), RiskLevel::High);
        assert_eq!(classify(Some(f64::NEG_INFINITY)), RiskLevel::Low);
        assert_eq!(classify(Some(1e9)), RiskLevel::High);
    }

    #[test]
    fn test_effective_score() {
        assert_eq!(effective_score(None), 0.0);
        assert_eq!(effective_score(Some(12.5)), 12.5);
    }
}
