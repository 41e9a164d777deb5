//! Percent cover cross-tabs for SOP table 8-2.
//!
//! Rows are (community type, vegetation type, scientific name); columns are
//! either segment ordinals (mean cover over the segment's points) or marker
//! point names (summed cover at the point).

use std::collections::{BTreeMap, BTreeSet};

use super::segments::{compare_segments, segment_column_label};
use crate::model::VegetationCover;

/// How cover values sharing a row and column are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverAggregate {
    Sum,
    Mean,
}

/// Which location attribute becomes the pivot columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverColumns {
    /// One column per segment, headed by the segment ordinal.
    Segment,
    /// One column per marker point, headed by the location name.
    Point,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PivotRowKey {
    pub community_type: String,
    pub vegetation_type: String,
    pub scientific_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub key: PivotRowKey,
    /// One cell per entry in `CoverPivot::columns`; `None` where no cover
    /// was recorded for that combination.
    pub cells: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverPivot {
    pub aggregate: CoverAggregate,
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
}

/// SOP 8-2 by segment: mean percent cover per segment.
pub fn cover_by_segment(records: &[VegetationCover]) -> CoverPivot {
    pivot_cover(records, CoverColumns::Segment, CoverAggregate::Mean)
}

/// SOP 8-2 by point: summed percent cover per marker point.
pub fn cover_by_point(records: &[VegetationCover]) -> CoverPivot {
    pivot_cover(records, CoverColumns::Point, CoverAggregate::Sum)
}

/// Cross-tabulates percent cover. Records without a cover value are skipped.
pub fn pivot_cover(
    records: &[VegetationCover],
    columns: CoverColumns,
    aggregate: CoverAggregate,
) -> CoverPivot {
    // (sum, count) per row key and column header
    let mut cells: BTreeMap<PivotRowKey, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
    let mut headers: BTreeSet<String> = BTreeSet::new();

    for record in records {
        let Some(cover) = record.percent_cover.filter(|c| c.is_finite()) else {
            continue;
        };
        let header = match columns {
            CoverColumns::Segment => record.segment.clone(),
            CoverColumns::Point => record.location_name.clone(),
        };
        let key = PivotRowKey {
            community_type: record.community_type.clone(),
            vegetation_type: record.vegetation_type.clone(),
            scientific_name: record.scientific_name.clone(),
        };
        let slot = cells.entry(key).or_default().entry(header.clone()).or_insert((0.0, 0));
        slot.0 += cover;
        slot.1 += 1;
        headers.insert(header);
    }

    let mut ordered: Vec<String> = headers.into_iter().collect();
    if columns == CoverColumns::Segment {
        ordered.sort_by(|a, b| compare_segments(a, b));
    }

    let rows = cells
        .into_iter()
        .map(|(key, by_column)| {
            let cells = ordered
                .iter()
                .map(|h| {
                    by_column.get(h).map(|&(sum, n)| match aggregate {
                        CoverAggregate::Sum => sum,
                        CoverAggregate::Mean => sum / n as f64,
                    })
                })
                .collect();
            PivotRow { key, cells }
        })
        .collect();

    let columns = match columns {
        CoverColumns::Segment => segment_headers(&ordered),
        CoverColumns::Point => ordered,
    };

    CoverPivot {
        aggregate,
        columns,
        rows,
    }
}

/// Header text for segment columns: the bare ordinal, unless another label
/// in the same table shares it, in which case the full label.
fn segment_headers(labels: &[String]) -> Vec<String> {
    let short: Vec<String> = labels.iter().map(|l| segment_column_label(l)).collect();
    labels
        .iter()
        .zip(&short)
        .map(|(label, s)| {
            if short.iter().filter(|other| *other == s).count() > 1 {
                label.clone()
            } else {
                s.clone()
            }
        })
        .collect()
}
