/// Annual report binary
///
/// Usage: ecotone_report [config.toml]
///
/// Loads the run configuration (default `./ecotone_report.toml`), connects
/// to the survey database and writes the SOP tables and figures into the
/// configured output directory.

use std::process::ExitCode;

use chrono::Local;

use ecotone_report::analysis::confidence::StudentTQuantile;
use ecotone_report::config::{DEFAULT_CONFIG_PATH, ReportConfig};
use ecotone_report::db::{self, PostgresSource};
use ecotone_report::logging::{self, Component};
use ecotone_report::model::ReportError;
use ecotone_report::report::{ReportManifest, prepare_directories, run_report};

fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match ReportConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let run_date = Local::now().date_naive();
    if let Err(e) = prepare_directories(&config) {
        eprintln!("✗ {}", e);
        return ExitCode::FAILURE;
    }
    logging::init_logger(
        config.logging.level,
        Some(config.log_file_path(run_date)),
        config.logging.console_timestamps,
    );

    println!("🌿 Mangrove-marsh annual report {}", config.monitoring_year);
    logging::info(
        Component::System,
        None,
        &format!("Configuration loaded from {}", config_path),
    );

    match run(&config, run_date) {
        Ok(manifest) => {
            print_summary(&manifest);
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::error(Component::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ReportConfig, run_date: chrono::NaiveDate) -> Result<ReportManifest, ReportError> {
    let url = config.database.resolve_url()?;
    let client = db::connect_and_verify(&url, &config.database.schema)?;

    let mut source = PostgresSource::new(client, config.database.schema.clone());
    run_report(config, &mut source, &StudentTQuantile, run_date)
}

fn print_summary(manifest: &ReportManifest) {
    println!();
    println!("═══════════════════════════════════════");
    println!("  Observations used:     {}", manifest.observation_count);
    println!("  Observations excluded: {}", manifest.excluded_observation_count);
    println!("  Groups:                {}", manifest.group_count);
    println!("  Degenerate groups:     {}", manifest.degenerate_groups);
    println!("  Numerical failures:    {}", manifest.numerical_failures);
    println!("  Files written:         {}", manifest.outputs.len());
    println!("═══════════════════════════════════════");
    for output in &manifest.outputs {
        println!("  ✓ {}", output);
    }
}
