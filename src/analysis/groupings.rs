//! Organizes flat marker records into per-group value lists.

use std::collections::BTreeMap;

use crate::model::{GroupKey, GroupingScheme, MarkerDistance, Observation};

/// Observations extracted from a batch of marker records.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationBatch {
    pub observations: Vec<Observation>,
    /// Records dropped for a missing or non-finite distance.
    pub excluded: usize,
}

/// Converts marker records to observations, dropping unusable distances.
pub fn observations_from_markers(
    records: &[MarkerDistance],
    scheme: GroupingScheme,
) -> ObservationBatch {
    let mut observations = Vec::with_capacity(records.len());
    let mut excluded = 0;
    for record in records {
        match record.to_observation(scheme) {
            Some(obs) => observations.push(obs),
            None => excluded += 1,
        }
    }
    ObservationBatch {
        observations,
        excluded,
    }
}

/// Partitions observation values by group key.
///
/// Non-finite values are dropped here, so a key whose values are all
/// non-finite does not appear. Every key in the result has at least one
/// value; input order is kept within each group.
pub fn partition(observations: &[Observation]) -> BTreeMap<GroupKey, Vec<f64>> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.value.is_finite()) {
        groups
            .entry(obs.group_key.clone())
            .or_default()
            .push(obs.value);
    }
    groups
}
