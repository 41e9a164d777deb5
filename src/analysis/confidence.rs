/// Student-t confidence intervals for SOP table 8-1.
///
/// The critical value comes from a pluggable `TQuantile` so tests can
/// substitute a fixed or failing routine. The production implementation
/// uses `statrs`.
///
/// Interval formula, as published in the report template:
///
/// ```text
/// margin = standard_error * t_critical / sqrt(count)
/// lower  = mean - margin
/// upper  = mean + margin
/// ```
///
/// `standard_error` is already `sd / sqrt(count)`, so the template divides
/// by `sqrt(count)` twice. It is kept for comparability with published
/// reports.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::model::{DEFAULT_CONFIDENCE, GroupAggregate, GroupWarning, ReportError, SummaryRow};

// ---------------------------------------------------------------------------
// Confidence level
// ---------------------------------------------------------------------------

/// A two-sided confidence level strictly between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceLevel(f64);

impl ConfidenceLevel {
    pub fn new(value: f64) -> Result<Self, ReportError> {
        if value > 0.0 && value < 1.0 {
            Ok(ConfidenceLevel(value))
        } else {
            Err(ReportError::Config(format!(
                "confidence must be strictly between 0 and 1, got {}",
                value
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Cumulative probability of the upper critical value: `1 - (1 - c) / 2`.
    pub fn upper_tail_probability(self) -> f64 {
        1.0 - (1.0 - self.0) / 2.0
    }

    /// Column suffix for the interval bounds, e.g. `0.95`.
    pub fn label(self) -> String {
        format!("{}", self.0)
    }
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        ConfidenceLevel(DEFAULT_CONFIDENCE)
    }
}

// ---------------------------------------------------------------------------
// Quantile capability
// ---------------------------------------------------------------------------

/// Inverse CDF of the standard Student-t distribution.
pub trait TQuantile {
    /// Returns `x` with `P(T <= x) = probability` for `degrees_of_freedom`.
    fn quantile(&self, probability: f64, degrees_of_freedom: f64) -> Result<f64, String>;
}

/// `TQuantile` backed by `statrs::distribution::StudentsT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudentTQuantile;

impl TQuantile for StudentTQuantile {
    fn quantile(&self, probability: f64, degrees_of_freedom: f64) -> Result<f64, String> {
        if !(probability > 0.0 && probability < 1.0) {
            return Err(format!("probability {} outside (0, 1)", probability));
        }
        let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|e| e.to_string())?;
        Ok(dist.inverse_cdf(probability))
    }
}

/// Two-sided critical value for `degrees_of_freedom` at `confidence`.
///
/// Callers must not pass zero degrees of freedom.
pub fn t_critical(
    quantile: &dyn TQuantile,
    degrees_of_freedom: usize,
    confidence: ConfidenceLevel,
) -> Result<f64, String> {
    let x = quantile.quantile(
        confidence.upper_tail_probability(),
        degrees_of_freedom as f64,
    )?;
    if !x.is_finite() {
        return Err(format!("quantile returned non-finite value {}", x));
    }
    Ok(x.abs())
}

// ---------------------------------------------------------------------------
// Interval calculation
// ---------------------------------------------------------------------------

/// Extends an aggregate with its confidence interval.
///
/// Degenerate groups and quantile failures yield `None` bounds plus a
/// warning; they never abort the batch.
pub fn with_interval(
    aggregate: GroupAggregate,
    confidence: ConfidenceLevel,
    quantile: &dyn TQuantile,
) -> (SummaryRow, Option<GroupWarning>) {
    let undefined = |aggregate: GroupAggregate| SummaryRow {
        aggregate,
        t_critical: None,
        lower_bound: None,
        upper_bound: None,
    };

    let standard_error = match aggregate.standard_error {
        Some(se) if aggregate.degrees_of_freedom > 0 => se,
        _ => {
            let warning = GroupWarning::DegenerateGroup {
                key: aggregate.group_key.clone(),
                count: aggregate.count,
            };
            return (undefined(aggregate), Some(warning));
        }
    };

    let t = match t_critical(quantile, aggregate.degrees_of_freedom, confidence) {
        Ok(t) => t,
        Err(reason) => {
            let warning = GroupWarning::NumericalFailure {
                key: aggregate.group_key.clone(),
                degrees_of_freedom: aggregate.degrees_of_freedom,
                reason,
            };
            return (undefined(aggregate), Some(warning));
        }
    };

    let margin = standard_error * t / (aggregate.count as f64).sqrt();
    let row = SummaryRow {
        lower_bound: Some(aggregate.mean - margin),
        upper_bound: Some(aggregate.mean + margin),
        t_critical: Some(t),
        aggregate,
    };
    (row, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupKey;
    use std::cell::Cell;

    const EPS: f64 = 1e-4;

    fn aggregate(count: usize, mean: f64, standard_error: Option<f64>) -> GroupAggregate {
        GroupAggregate {
            group_key: GroupKey {
                event_group_id: "EG1".to_string(),
                region: None,
                segment: "Segment_1".to_string(),
            },
            mean,
            standard_error,
            count,
            degrees_of_freedom: count - 1,
            min_value: mean - 1.0,
            max_value: mean + 1.0,
        }
    }

    /// Returns a fixed value and counts calls.
    struct FixedQuantile {
        value: f64,
        calls: Cell<usize>,
    }

    impl TQuantile for FixedQuantile {
        fn quantile(&self, _probability: f64, _dof: f64) -> Result<f64, String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.value)
        }
    }

    struct FailingQuantile;

    impl TQuantile for FailingQuantile {
        fn quantile(&self, _probability: f64, dof: f64) -> Result<f64, String> {
            Err(format!("no convergence at dof {}", dof))
        }
    }

    // --- Confidence level ---------------------------------------------------

    #[test]
    fn test_confidence_level_rejects_bounds_and_outside_values() {
        for bad in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(ConfidenceLevel::new(bad).is_err(), "{} should be rejected", bad);
        }
        assert!(ConfidenceLevel::new(0.9).is_ok());
    }

    #[test]
    fn test_confidence_label_matches_template_suffix() {
        assert_eq!(ConfidenceLevel::default().label(), "0.95");
        assert_eq!(ConfidenceLevel::new(0.9).unwrap().label(), "0.9");
    }

    #[test]
    fn test_upper_tail_probability() {
        let c = ConfidenceLevel::new(0.95).unwrap();
        assert!((c.upper_tail_probability() - 0.975).abs() < 1e-12);
    }

    // --- statrs quantile ----------------------------------------------------

    #[test]
    fn test_student_t_critical_values_match_tables() {
        let c = ConfidenceLevel::default();
        let cases = [(1, 12.7062), (2, 4.3027), (5, 2.5706), (30, 2.0423)];
        for (dof, expected) in cases {
            let t = t_critical(&StudentTQuantile, dof, c).expect("quantile should succeed");
            assert!(
                (t - expected).abs() < EPS,
                "t_crit at dof {}: expected {}, got {}",
                dof,
                expected,
                t
            );
        }
    }

    #[test]
    fn test_student_t_quantile_rejects_zero_freedom() {
        assert!(StudentTQuantile.quantile(0.975, 0.0).is_err());
    }

    #[test]
    fn test_student_t_quantile_rejects_out_of_range_probability() {
        assert!(StudentTQuantile.quantile(1.0, 4.0).is_err());
        assert!(StudentTQuantile.quantile(0.0, 4.0).is_err());
    }

    // --- Interval -----------------------------------------------------------

    #[test]
    fn test_margin_divides_standard_error_by_sqrt_count() {
        let q = FixedQuantile { value: 2.0, calls: Cell::new(0) };
        let (row, warning) = with_interval(aggregate(4, 10.0, Some(3.0)), ConfidenceLevel::default(), &q);
        assert!(warning.is_none());
        // margin = 3.0 * 2.0 / sqrt(4) = 3.0
        assert_eq!(row.t_critical, Some(2.0));
        assert_eq!(row.lower_bound, Some(7.0));
        assert_eq!(row.upper_bound, Some(13.0));
    }

    #[test]
    fn test_negative_quantile_is_folded_to_positive() {
        let q = FixedQuantile { value: -2.0, calls: Cell::new(0) };
        let (row, _) = with_interval(aggregate(4, 10.0, Some(3.0)), ConfidenceLevel::default(), &q);
        assert_eq!(row.t_critical, Some(2.0));
        assert!(row.lower_bound.unwrap() <= 10.0 && row.upper_bound.unwrap() >= 10.0);
    }

    #[test]
    fn test_single_observation_skips_quantile_and_yields_sentinels() {
        let q = FixedQuantile { value: 2.0, calls: Cell::new(0) };
        let (row, warning) = with_interval(aggregate(1, 5.0, None), ConfidenceLevel::default(), &q);
        assert_eq!(q.calls.get(), 0, "quantile must not be called with zero dof");
        assert_eq!(row.t_critical, None);
        assert_eq!(row.lower_bound, None);
        assert_eq!(row.upper_bound, None);
        assert!(matches!(warning, Some(GroupWarning::DegenerateGroup { count: 1, .. })));
    }

    #[test]
    fn test_quantile_failure_yields_sentinels_and_numerical_warning() {
        let (row, warning) =
            with_interval(aggregate(3, 12.0, Some(1.0)), ConfidenceLevel::default(), &FailingQuantile);
        assert_eq!(row.lower_bound, None);
        assert_eq!(row.upper_bound, None);
        assert_eq!(row.aggregate.mean, 12.0, "aggregate fields survive a quantile failure");
        match warning {
            Some(GroupWarning::NumericalFailure { degrees_of_freedom, reason, .. }) => {
                assert_eq!(degrees_of_freedom, 2);
                assert!(reason.contains("no convergence"));
            }
            other => panic!("expected NumericalFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_quantile_is_a_numerical_failure() {
        let q = FixedQuantile { value: f64::INFINITY, calls: Cell::new(0) };
        let (row, warning) = with_interval(aggregate(3, 12.0, Some(1.0)), ConfidenceLevel::default(), &q);
        assert_eq!(row.t_critical, None);
        assert!(matches!(warning, Some(GroupWarning::NumericalFailure { .. })));
    }

    #[test]
    fn test_zero_standard_error_collapses_interval_to_mean() {
        let (row, warning) =
            with_interval(aggregate(3, 4.0, Some(0.0)), ConfidenceLevel::default(), &StudentTQuantile);
        assert!(warning.is_none());
        assert_eq!(row.lower_bound, Some(4.0));
        assert_eq!(row.upper_bound, Some(4.0));
    }
}
