//! Output renderers for the annual report.
//!
//! - `tables`: SOP 8-1 and 8-2 tables as CSV.
//! - `charts`: SOP 8-1 and 8-3 figures as SVG.

pub mod charts;
pub mod tables;
