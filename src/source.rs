//! The upstream survey data seam.
//!
//! The report consumes three record sets; where they come from is behind
//! `SurveySource`. `db::PostgresSource` reads the survey database;
//! `InMemorySource` serves fixed records for tests and replays.

use crate::model::{MarkerDistance, ReportError, StratumCover, VegetationCover};

pub trait SurveySource {
    /// Marker distances for "Marker Visit" events (SOP 8-1).
    fn marker_distances(&mut self) -> Result<Vec<MarkerDistance>, ReportError>;

    /// Vegetation cover records with a recorded percent cover (SOP 8-2).
    fn vegetation_cover(&mut self) -> Result<Vec<VegetationCover>, ReportError>;

    /// Stratum cover per marker point visit (SOP 8-3).
    fn stratum_cover(&mut self) -> Result<Vec<StratumCover>, ReportError>;
}

/// A `SurveySource` over records already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub markers: Vec<MarkerDistance>,
    pub vegetation: Vec<VegetationCover>,
    pub strata: Vec<StratumCover>,
}

impl SurveySource for InMemorySource {
    fn marker_distances(&mut self) -> Result<Vec<MarkerDistance>, ReportError> {
        Ok(self.markers.clone())
    }

    fn vegetation_cover(&mut self) -> Result<Vec<VegetationCover>, ReportError> {
        Ok(self.vegetation.clone())
    }

    fn stratum_cover(&mut self) -> Result<Vec<StratumCover>, ReportError> {
        Ok(self.strata.clone())
    }
}
