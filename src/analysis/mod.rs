//! Statistical summarization for the annual ecotone report.
//!
//! Everything in here is pure: it takes records that have already been
//! fetched and returns new tables, never touching the database or disk.
//!
//! Submodules:
//! - `groupings`: turns marker records into observations and partitions them by group key.
//! - `summary`: per-group mean, standard error, extremes; builds the SOP 8-1 table.
//! - `confidence`: confidence level, pluggable Student-t quantile, interval bounds.
//! - `segments`: segment ordinal parsing and display ordering.
//! - `pivot`: SOP 8-2 percent cover cross-tabs.

pub mod confidence;
pub mod groupings;
pub mod pivot;
pub mod segments;
pub mod summary;
