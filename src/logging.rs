/// Structured logging for the annual report run
///
/// Provides context-rich logging with component tags, optional subject
/// identifiers (group keys, output files), timestamps, and severity levels.
/// Writes to the console and appends to the run's log file in the workspace.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::model::GroupWarning;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Database,
    Stats,
    Export,
    Chart,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Database => write!(f, "DB"),
            Component::Stats => write!(f, "STATS"),
            Component::Export => write!(f, "EXPORT"),
            Component::Chart => write!(f, "CHART"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<PathBuf>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<PathBuf>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, component: Component, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let entry = format_entry(level, component, subject, message);
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", entry),
                LogLevel::Warning => eprintln!("   {}", entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, subject_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path.display(), e);
            }
        }
    }

    fn append_to_file(path: &Path, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// One log-file line: `<timestamp> <LEVEL> <COMPONENT>[ [subject]]: <message>`.
fn format_entry(level: LogLevel, component: Component, subject: Option<&str>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!(
        "{} {} {}{}: {}",
        timestamp, level, component, subject_part, message
    )
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<PathBuf>, console_timestamps: bool) {
    Logger::init(min_level, log_file, console_timestamps);
}

fn dispatch(level: LogLevel, component: Component, subject: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, subject, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, component, subject, message);
}

/// Log a warning message
pub fn warn(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, component, subject, message);
}

/// Log an error message
pub fn error(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, component, subject, message);
}

/// Log a debug message
pub fn debug(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, component, subject, message);
}

// ---------------------------------------------------------------------------
// Group Warning Classification
// ---------------------------------------------------------------------------

/// Severity for a per-group summary warning.
///
/// Degenerate groups are routine in sparse survey years; a quantile failure
/// points at bad input or a numeric bug.
pub fn classify_group_warning(warning: &GroupWarning) -> LogLevel {
    match warning {
        GroupWarning::DegenerateGroup { .. } => LogLevel::Warning,
        GroupWarning::NumericalFailure { .. } => LogLevel::Error,
    }
}

/// Log a per-group warning with automatic classification
pub fn log_group_warning(warning: &GroupWarning) {
    let subject = warning.key().to_string();
    dispatch(
        classify_group_warning(warning),
        Component::Stats,
        Some(&subject),
        &warning.to_string(),
    );
}

// ---------------------------------------------------------------------------
// Export and Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a successfully written output file
pub fn log_export(component: Component, what: &str, path: &Path) {
    let message = format!("Successfully exported {} to: {}", what, path.display());
    info(component, None, &message);
}

/// Log a summary of the summarization step
pub fn log_run_summary(groups: usize, degenerate: usize, failed: usize) {
    let message = format!(
        "Summary complete: {} groups, {} degenerate, {} numerical failures",
        groups, degenerate, failed
    );

    if failed > 0 {
        error(Component::Stats, None, &message);
    } else if degenerate > 0 {
        warn(Component::Stats, None, &message);
    } else {
        info(Component::Stats, None, &message);
    }
}
