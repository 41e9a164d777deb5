//! Grouped statistics for SOP table 8-1.
//!
//! `aggregate` computes per-group mean, standard error, count and extremes.
//! `summarize` runs the whole table: aggregate, attach confidence intervals,
//! sort into display order.

use std::collections::BTreeMap;

use super::confidence::{ConfidenceLevel, TQuantile, with_interval};
use super::groupings::partition;
use super::segments::sort_summary_rows;
use crate::model::{GroupAggregate, GroupKey, Observation, ReportError, SummaryTable, ValidationError};

/// Computes one aggregate per distinct group key.
///
/// Non-finite values are excluded before grouping. Sample standard deviation
/// uses Bessel's correction; the standard error is `None` for
/// single-observation groups.
pub fn aggregate(observations: &[Observation]) -> BTreeMap<GroupKey, GroupAggregate> {
    partition(observations)
        .into_iter()
        .map(|(key, values)| {
            let agg = aggregate_group(key.clone(), &values);
            (key, agg)
        })
        .collect()
}

/// `values` must be non-empty and finite.
fn aggregate_group(group_key: GroupKey, values: &[f64]) -> GroupAggregate {
    let count = values.len();
    let n = count as f64;

    let min_value = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let sum: f64 = values.iter().sum();
    let mean = if sum.is_finite() {
        sum / n
    } else {
        // The plain sum overflowed; pre-divided terms stay within f64 range.
        values.iter().map(|v| v / n).sum::<f64>()
    };
    // Division rounding can land one ulp outside [min, max].
    let mean = mean.clamp(min_value, max_value);

    let standard_error = if count < 2 {
        None
    } else {
        // Deviations are scaled by the largest magnitude so squaring cannot overflow.
        let scale = min_value.abs().max(max_value.abs());
        if scale == 0.0 {
            Some(0.0)
        } else {
            let sum_sq: f64 = values
                .iter()
                .map(|v| (v / scale - mean / scale).powi(2))
                .sum();
            Some(scale * ((sum_sq / (n - 1.0)).sqrt() / n.sqrt()))
        }
    };

    GroupAggregate {
        group_key,
        mean,
        standard_error,
        count,
        degrees_of_freedom: count - 1,
        min_value,
        max_value,
    }
}

/// Builds the ordered SOP 8-1 summary table.
///
/// Fails only when no finite observation remains. Per-group problems are
/// returned as warnings alongside rows with sentinel bounds.
pub fn summarize(
    observations: &[Observation],
    confidence: ConfidenceLevel,
    quantile: &dyn TQuantile,
) -> Result<SummaryTable, ReportError> {
    let aggregates = aggregate(observations);
    if aggregates.is_empty() {
        return Err(ValidationError::EmptyInput("marker distances".to_string()).into());
    }

    let mut rows = Vec::new();
    let mut warnings = Vec::new();
    for agg in aggregates.into_values() {
        let (row, warning) = with_interval(agg, confidence, quantile);
        rows.push(row);
        warnings.extend(warning);
    }
    sort_summary_rows(&mut rows);

    Ok(SummaryTable { rows, warnings })
}
