//! Run configuration.
//!
//! Loaded once from a TOML file and passed explicitly to every stage of the
//! report; nothing here is process-global.
//!
//! ```toml
//! monitoring_year = 2020
//! confidence = 0.95
//! output_dir = "./output/2020"
//! workspace_dir = "./workspace"
//! group_by_region = false
//!
//! [database]
//! schema = "mangrove_marsh"
//! # url = "postgresql://..."   (falls back to DATABASE_URL / .env)
//!
//! [logging]
//! level = "info"
//! console_timestamps = false
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::analysis::confidence::ConfidenceLevel;
use crate::logging::LogLevel;
use crate::model::{DEFAULT_CONFIDENCE, GroupingScheme, ReportError};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./ecotone_report.toml";

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    monitoring_year: i32,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    #[serde(default = "default_workspace_dir")]
    workspace_dir: PathBuf,
    #[serde(default)]
    group_by_region: bool,
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./workspace")
}

fn default_schema() -> String {
    "mangrove_marsh".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string; `DATABASE_URL` is used when absent.
    #[serde(default)]
    pub url: Option<String>,
    /// Schema holding the survey tables.
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: None,
            schema: default_schema(),
        }
    }
}

impl DatabaseConfig {
    /// The configured URL, else `DATABASE_URL` after loading `.env`.
    pub fn resolve_url(&self) -> Result<String, ReportError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        dotenv::dotenv().ok();
        std::env::var("DATABASE_URL").map_err(|_| {
            ReportError::Config(
                "no [database] url configured and DATABASE_URL is not set".to_string(),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: LogLevel,
    #[serde(default)]
    pub console_timestamps: bool,
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            console_timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub monitoring_year: i32,
    pub confidence: ConfidenceLevel,
    pub output_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub grouping: GroupingScheme,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl ReportConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        Self::from_toml_str(&text)
            .map_err(|e| ReportError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ReportError> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))?;

        if !is_sql_identifier(&raw.database.schema) {
            return Err(ReportError::Config(format!(
                "database schema '{}' must be a plain identifier",
                raw.database.schema
            )));
        }

        Ok(ReportConfig {
            monitoring_year: raw.monitoring_year,
            confidence: ConfidenceLevel::new(raw.confidence)?,
            output_dir: raw.output_dir,
            workspace_dir: raw.workspace_dir,
            grouping: if raw.group_by_region {
                GroupingScheme::EventRegionSegment
            } else {
                GroupingScheme::EventSegment
            },
            database: raw.database,
            logging: raw.logging,
        })
    }

    /// Base name for figures, manifest and log:
    /// `MangroveMarsh_AnnualTablesFigs_<year>_<YYYYMMDD>`.
    pub fn run_name(&self, run_date: NaiveDate) -> String {
        format!(
            "MangroveMarsh_AnnualTablesFigs_{}_{}",
            self.monitoring_year,
            run_date.format("%Y%m%d")
        )
    }

    /// Base name for the SOP tables: `MangroveMarsh_Export_<YYYYMMDD>`.
    pub fn export_name(&self, run_date: NaiveDate) -> String {
        format!("MangroveMarsh_Export_{}", run_date.format("%Y%m%d"))
    }

    pub fn log_file_path(&self, run_date: NaiveDate) -> PathBuf {
        self.workspace_dir
            .join(format!("{}_logfile.txt", self.run_name(run_date)))
    }
}

fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ReportConfig::from_toml_str("monitoring_year = 2020").expect("minimal config");
        assert_eq!(config.monitoring_year, 2020);
        assert_eq!(config.confidence.value(), 0.95);
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.grouping, GroupingScheme::EventSegment);
        assert_eq!(config.database.schema, "mangrove_marsh");
        assert_eq!(config.database.url, None);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_full_config_parses() {
        let text = r#"
            monitoring_year = 2022
            confidence = 0.9
            output_dir = "/data/out"
            workspace_dir = "/data/ws"
            group_by_region = true

            [database]
            url = "postgresql://reporter@localhost/sfcn"
            schema = "ecotone"

            [logging]
            level = "debug"
            console_timestamps = true
        "#;
        let config = ReportConfig::from_toml_str(text).expect("full config");
        assert_eq!(config.confidence.label(), "0.9");
        assert_eq!(config.grouping, GroupingScheme::EventRegionSegment);
        assert_eq!(config.database.schema, "ecotone");
        assert_eq!(
            config.database.resolve_url().unwrap(),
            "postgresql://reporter@localhost/sfcn"
        );
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.console_timestamps);
    }

    #[test]
    fn test_confidence_out_of_range_is_rejected() {
        for bad in ["1.0", "0.0", "95.0"] {
            let text = format!("monitoring_year = 2020\nconfidence = {}", bad);
            assert!(
                matches!(ReportConfig::from_toml_str(&text), Err(ReportError::Config(_))),
                "confidence {} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_missing_year_is_rejected() {
        assert!(ReportConfig::from_toml_str("confidence = 0.95").is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(ReportConfig::from_toml_str("monitoring_year = 2020\nconfidense = 0.9").is_err());
    }

    #[test]
    fn test_schema_must_be_identifier() {
        let text = "monitoring_year = 2020\n[database]\nschema = \"x; DROP TABLE y\"";
        assert!(ReportConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn test_output_names_follow_template() {
        let config = ReportConfig::from_toml_str(
            "monitoring_year = 2020\nworkspace_dir = \"/ws\"",
        )
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 3, 3).unwrap();
        assert_eq!(config.run_name(date), "MangroveMarsh_AnnualTablesFigs_2020_20230303");
        assert_eq!(config.export_name(date), "MangroveMarsh_Export_20230303");
        assert_eq!(
            config.log_file_path(date),
            PathBuf::from("/ws/MangroveMarsh_AnnualTablesFigs_2020_20230303_logfile.txt")
        );
    }
}
