//! Segment ordinal parsing and display ordering.
//!
//! Segment labels look like `Segment_12`. The trailing digits give the
//! display order; grouping always uses the full label.

use std::cmp::Ordering;

use crate::model::SummaryRow;

/// Parses the trailing digits of a segment label.
///
/// Returns `None` when the label has no trailing digits or they overflow.
pub fn segment_ordinal(label: &str) -> Option<u32> {
    let trimmed = label.trim_end();
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    trimmed[digits_start..].parse().ok()
}

/// Orders segment labels numerically by ordinal; unparseable labels last,
/// then by label text.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    match (segment_ordinal(a), segment_ordinal(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Column header for a segment in the SOP 8-2 by-segment pivot: the bare
/// ordinal when present, otherwise the label itself.
pub fn segment_column_label(label: &str) -> String {
    segment_ordinal(label)
        .map(|n| n.to_string())
        .unwrap_or_else(|| label.to_string())
}

/// Sorts summary rows into SOP 8-1 display order: segment ordinal, then
/// event, then region.
pub fn sort_summary_rows(rows: &mut [SummaryRow]) {
    rows.sort_by(|a, b| {
        let ka = &a.aggregate.group_key;
        let kb = &b.aggregate.group_key;
        compare_segments(&ka.segment, &kb.segment)
            .then_with(|| ka.event_group_id.cmp(&kb.event_group_id))
            .then_with(|| ka.region.cmp(&kb.region))
    });
}
