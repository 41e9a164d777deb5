/// Core data types for the mangrove–marsh ecotone report.
///
/// This module defines the shared domain model imported by all other modules:
/// the survey records fetched from the database, the grouping key, the
/// aggregate and summary rows produced by `analysis`, and the error types.
/// It contains no I/O.

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Survey constants
// ---------------------------------------------------------------------------

/// Event type whose records feed the annual report.
pub const EVENT_TYPE_MARKER_VISIT: &str = "Marker Visit";

/// Default two-sided confidence level for SOP table 8-1.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

// ---------------------------------------------------------------------------
// Source records
// ---------------------------------------------------------------------------

/// One marker-distance record from `tbl_markerdata`, joined with its event
/// group and location.
///
/// `distance` is `None` when the field crew left the distance blank.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDistance {
    pub event_group_id: String,
    pub event_group_name: String,
    pub start_date: Option<NaiveDate>,
    pub region: Option<String>,
    pub segment: String,       // e.g. "Segment_12"
    pub location_name: String, // marker point within the segment
    pub distance: Option<f64>, // meters from ground truth
    pub method: Option<String>,
}

/// How marker distances are bucketed before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupingScheme {
    /// Event × segment, the SOP 8-1 layout.
    #[default]
    EventSegment,
    /// Event × region × segment.
    EventRegionSegment,
}

impl MarkerDistance {
    /// Builds the group key for this record under `scheme`.
    pub fn group_key(&self, scheme: GroupingScheme) -> GroupKey {
        let region = match scheme {
            GroupingScheme::EventSegment => None,
            GroupingScheme::EventRegionSegment => self.region.clone(),
        };
        GroupKey {
            event_group_id: self.event_group_id.clone(),
            region,
            segment: self.segment.clone(),
        }
    }

    /// Converts the record to an `Observation`.
    ///
    /// Returns `None` for a missing or non-finite distance; such records are
    /// excluded from aggregation rather than coerced to zero.
    pub fn to_observation(&self, scheme: GroupingScheme) -> Option<Observation> {
        let value = self.distance.filter(|d| d.is_finite())?;
        Some(Observation {
            group_key: self.group_key(scheme),
            value,
        })
    }
}

/// One vegetation cover record from `tbl_markerdata_vegetation`.
#[derive(Debug, Clone, PartialEq)]
pub struct VegetationCover {
    pub community_type: String,  // "Marsh" or "Mangrove"
    pub vegetation_type: String, // "Herb", "Shrub", "Tree"
    /// `None` when the species code has no entry in the species lookup.
    pub scientific_name: Option<String>,
    pub segment: String,
    pub location_name: String,
    pub percent_cover: Option<f64>,
}

/// Stratum cover on one side of the ecotone at a marker point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideCover {
    pub overall: Option<f64>,
    pub tree: Option<f64>,
    pub shrub: Option<f64>,
    pub herb: Option<f64>,
}

/// Cover by stratum for one marker point visit, feeding figure SOP 8-3.
#[derive(Debug, Clone, PartialEq)]
pub struct StratumCover {
    pub location_id: String,
    pub order_id: Option<i32>,
    pub location_name: String,
    pub start_date: Option<NaiveDate>,
    pub mangrove_side: SideCover,
    pub marsh_side: SideCover,
}

// ---------------------------------------------------------------------------
// Aggregation types
// ---------------------------------------------------------------------------

/// Composite aggregation bucket: survey event, optional region, segment.
///
/// Ordering is derived so grouped maps iterate deterministically; display
/// order is handled separately by `analysis::segments`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub event_group_id: String,
    pub region: Option<String>,
    pub segment: String,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}/{}/{}", self.event_group_id, region, self.segment),
            None => write!(f, "{}/{}", self.event_group_id, self.segment),
        }
    }
}

/// A single distance measurement tagged with its group.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub group_key: GroupKey,
    pub value: f64,
}

/// Per-group statistics produced by `analysis::summary::aggregate`.
///
/// `standard_error` is `None` when `count < 2`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate {
    pub group_key: GroupKey,
    pub mean: f64,
    pub standard_error: Option<f64>,
    pub count: usize,
    pub degrees_of_freedom: usize,
    pub min_value: f64,
    pub max_value: f64,
}

/// A `GroupAggregate` with its Student-t confidence interval.
///
/// `t_critical`, `lower_bound` and `upper_bound` are `None` for degenerate
/// groups and for groups whose quantile lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub aggregate: GroupAggregate,
    pub t_critical: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

/// Non-fatal, per-group problem recorded while building the summary.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupWarning {
    /// Fewer than two observations; standard error and interval undefined.
    DegenerateGroup { key: GroupKey, count: usize },
    /// The quantile routine failed for this group's degrees of freedom.
    NumericalFailure {
        key: GroupKey,
        degrees_of_freedom: usize,
        reason: String,
    },
}

impl GroupWarning {
    pub fn key(&self) -> &GroupKey {
        match self {
            GroupWarning::DegenerateGroup { key, .. } => key,
            GroupWarning::NumericalFailure { key, .. } => key,
        }
    }
}

impl std::fmt::Display for GroupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupWarning::DegenerateGroup { key, count } => write!(
                f,
                "Degenerate group {}: {} observation(s), confidence interval undefined",
                key, count
            ),
            GroupWarning::NumericalFailure {
                key,
                degrees_of_freedom,
                reason,
            } => write!(
                f,
                "Numerical failure for group {} (dof {}): {}",
                key, degrees_of_freedom, reason
            ),
        }
    }
}

/// The ordered SOP 8-1 table plus the warnings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
    pub warnings: Vec<GroupWarning>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Input problems that make the whole run meaningless.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A query result lacks a column the report needs.
    MissingColumn { query: String, column: String },
    /// A measurement column is not of a numeric type.
    NonNumericColumn {
        query: String,
        column: String,
        found: String,
    },
    /// No usable records were returned.
    EmptyInput(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingColumn { query, column } => {
                write!(f, "{}: missing required column '{}'", query, column)
            }
            ValidationError::NonNumericColumn {
                query,
                column,
                found,
            } => write!(
                f,
                "{}: column '{}' must be numeric, found {}",
                query, column, found
            ),
            ValidationError::EmptyInput(query) => write!(f, "{}: no usable records", query),
        }
    }
}

/// Errors that abort a report run.
#[derive(Debug, PartialEq)]
pub enum ReportError {
    /// The configuration file is missing, malformed, or out of range.
    Config(String),
    /// Connecting to or querying the survey database failed.
    Database(String),
    /// The fetched data cannot be summarized.
    InputValidation(ValidationError),
    /// Reading or writing a file failed.
    Io { path: String, message: String },
    /// A table or chart could not be rendered.
    Render(String),
}

impl ReportError {
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        ReportError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ReportError::Database(msg) => write!(f, "Database error: {}", msg),
            ReportError::InputValidation(err) => write!(f, "Input validation error: {}", err),
            ReportError::Io { path, message } => write!(f, "I/O error on {}: {}", path, message),
            ReportError::Render(msg) => write!(f, "Render error: {}", msg),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<ValidationError> for ReportError {
    fn from(err: ValidationError) -> Self {
        ReportError::InputValidation(err)
    }
}

impl From<postgres::Error> for ReportError {
    fn from(err: postgres::Error) -> Self {
        ReportError::Database(err.to_string())
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        ReportError::Render(err.to_string())
    }
}
