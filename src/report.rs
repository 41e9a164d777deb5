//! Annual report run.
//!
//! Fetches every record set and builds the SOP 8-1 summary before writing
//! anything, so source failures and input validation errors leave the output
//! directory untouched. Rendering errors after that point abort the run with
//! the earlier outputs in place. Every file, table or figure, is written to
//! a temp file and renamed, so no output is ever left half-written.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::analysis::confidence::TQuantile;
use crate::analysis::groupings::observations_from_markers;
use crate::analysis::pivot::{cover_by_point, cover_by_segment};
use crate::analysis::summary::summarize;
use crate::config::ReportConfig;
use crate::export::charts::{EcotoneSide, render_stratum_chart, render_summary_chart};
use crate::export::tables::{pivot_csv, summary_csv, write_atomically};
use crate::logging::{self, Component};
use crate::model::{GroupWarning, ReportError};
use crate::source::SurveySource;

/// What a run produced, written next to the outputs as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportManifest {
    pub generated_at: DateTime<Utc>,
    pub run_date: NaiveDate,
    pub monitoring_year: i32,
    pub confidence: f64,
    pub observation_count: usize,
    pub excluded_observation_count: usize,
    pub group_count: usize,
    pub degenerate_groups: usize,
    pub numerical_failures: usize,
    pub warnings: Vec<String>,
    /// File names relative to the output directory.
    pub outputs: Vec<String>,
}

/// Creates the output and workspace directories if they are missing.
pub fn prepare_directories(config: &ReportConfig) -> Result<(), ReportError> {
    for dir in [&config.output_dir, &config.workspace_dir] {
        fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
    }
    Ok(())
}

/// Runs the full annual report against `source`.
pub fn run_report(
    config: &ReportConfig,
    source: &mut dyn SurveySource,
    quantile: &dyn TQuantile,
    run_date: NaiveDate,
) -> Result<ReportManifest, ReportError> {
    prepare_directories(config)?;

    let markers = source.marker_distances()?;
    let vegetation = source.vegetation_cover()?;
    let strata = source.stratum_cover()?;

    let batch = observations_from_markers(&markers, config.grouping);
    if batch.excluded > 0 {
        logging::warn(
            Component::Stats,
            None,
            &format!(
                "Excluded {} marker records with a missing or non-finite distance",
                batch.excluded
            ),
        );
    }

    let table = summarize(&batch.observations, config.confidence, quantile)?;

    let degenerate = table
        .warnings
        .iter()
        .filter(|w| matches!(w, GroupWarning::DegenerateGroup { .. }))
        .count();
    let failed = table.warnings.len() - degenerate;
    for warning in &table.warnings {
        logging::log_group_warning(warning);
    }
    logging::log_run_summary(table.rows.len(), degenerate, failed);

    let export_name = config.export_name(run_date);
    let run_name = config.run_name(run_date);
    let mut outputs = Vec::new();

    // SOP 8-1
    let summary = summary_csv(&table, config.confidence, config.grouping)?;
    let path = output_path(config, &export_name, "SOP8-1.csv");
    write_atomically(&path, &summary)?;
    logging::log_export(Component::Export, "SOP 8-1 summary table", &path);
    outputs.push(file_name(&path));

    let path = output_path(config, &run_name, "SOP8-1.svg");
    if render_summary_chart(&path, &table, config.confidence)? {
        logging::log_export(Component::Chart, "SOP 8-1 figure", &path);
        outputs.push(file_name(&path));
    }

    // SOP 8-2
    if vegetation.is_empty() {
        logging::warn(Component::Export, None, "No vegetation cover records; SOP 8-2 tables skipped");
    } else {
        let by_segment = pivot_csv(&cover_by_segment(&vegetation))?;
        let path = output_path(config, &export_name, "SOP8-2BySeg.csv");
        write_atomically(&path, &by_segment)?;
        logging::log_export(Component::Export, "SOP 8-2 cover by segment", &path);
        outputs.push(file_name(&path));

        let by_point = pivot_csv(&cover_by_point(&vegetation))?;
        let path = output_path(config, &export_name, "SOP8-2ByPoint.csv");
        write_atomically(&path, &by_point)?;
        logging::log_export(Component::Export, "SOP 8-2 cover by point", &path);
        outputs.push(file_name(&path));
    }

    // SOP 8-3
    for side in [EcotoneSide::Marsh, EcotoneSide::Mangrove] {
        let path = output_path(config, &run_name, &format!("{}.svg", side.file_suffix()));
        if render_stratum_chart(&path, side, &strata)? {
            logging::log_export(Component::Chart, &format!("SOP 8-3 {}", side.title()), &path);
            outputs.push(file_name(&path));
        } else {
            logging::warn(
                Component::Chart,
                None,
                &format!("No stratum cover records; SOP 8-3 {} skipped", side.title()),
            );
        }
    }

    let manifest = ReportManifest {
        generated_at: Utc::now(),
        run_date,
        monitoring_year: config.monitoring_year,
        confidence: config.confidence.value(),
        observation_count: batch.observations.len(),
        excluded_observation_count: batch.excluded,
        group_count: table.rows.len(),
        degenerate_groups: degenerate,
        numerical_failures: failed,
        warnings: table.warnings.iter().map(|w| w.to_string()).collect(),
        outputs,
    };

    let path = output_path(config, &run_name, "manifest.json");
    let json = serde_json::to_vec_pretty(&manifest).map_err(|e| ReportError::Render(e.to_string()))?;
    write_atomically(&path, &json)?;
    logging::log_export(Component::System, "run manifest", &path);

    Ok(manifest)
}

fn output_path(config: &ReportConfig, base: &str, suffix: &str) -> PathBuf {
    config.output_dir.join(format!("{}_{}", base, suffix))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
