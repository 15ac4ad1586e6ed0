/// Structured logging for the rainfall pipeline
///
/// Provides context-rich logging with series/basin identifiers,
/// timestamps, and severity levels. Supports both console output
/// and file-based logging for scheduled (cron) runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::{HourBucket, TIMESTAMP_FORMAT};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
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
// Log Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Database,
    Observed,
    Forecast,
    Csv,
    ControlFile,
    Storage,
    System,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Database => write!(f, "DB"),
            Source::Observed => write!(f, "OBS"),
            Source::Forecast => write!(f, "FCST"),
            Source::Csv => write!(f, "CSV"),
            Source::ControlFile => write!(f, "HMS"),
            Source::Storage => write!(f, "GCS"),
            Source::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the model run has not published this horizon yet
    Expected,
    /// Unexpected failure - store unreachable, schema drift, bad credentials
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
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
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, source: &Source, series_id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let series_part = series_id.map(|s| format!(" [{}]", short_id(s))).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, source, series_part, message
        );

        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, series_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, series_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {
                    if self.min_level == LogLevel::Debug {
                        println!("   [DEBUG] {}{}: {}", source, series_part, message)
                    }
                }
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Series identifiers are 64-char hashes; the first 12 are enough to tell
/// them apart in a log line.
fn short_id(id: &str) -> &str {
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn dispatch(level: LogLevel, source: Source, series_id: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &source, series_id, message);
        }
    }
}

/// Log a general informational message
pub fn info(source: Source, series_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, source, series_id, message);
}

/// Log a warning message
pub fn warn(source: Source, series_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, source, series_id, message);
}

/// Log an error message
pub fn error(source: Source, series_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, source, series_id, message);
}

/// Log a debug message
pub fn debug(source: Source, series_id: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, source, series_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a store query failure based on the error text
pub fn classify_query_failure(error_message: &str) -> FailureType {
    if error_message.contains("No forecast data") || error_message.contains("no rows") {
        // Later horizons are routinely missing until the model run finishes
        FailureType::Expected
    } else if error_message.contains("Database error")
        || error_message.contains("connection")
        || error_message.contains("password")
    {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

/// Classify an object storage failure
pub fn classify_storage_failure(error_message: &str) -> FailureType {
    if error_message.contains("HTTP 404") {
        FailureType::Expected
    } else if error_message.contains("HTTP") || error_message.contains("timeout") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a store query failure with automatic classification
pub fn log_query_failure(series_id: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_query_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(Source::Database, Some(series_id), &message),
        FailureType::Unexpected => error(Source::Database, Some(series_id), &message),
        FailureType::Unknown => warn(Source::Database, Some(series_id), &message),
    }
}

/// Log an object storage failure with classification
pub fn log_storage_failure(object: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_storage_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(Source::Storage, Some(object), &message),
        FailureType::Unexpected => error(Source::Storage, Some(object), &message),
        FailureType::Unknown => warn(Source::Storage, Some(object), &message),
    }
}

// ---------------------------------------------------------------------------
// Series Summary Logging
// ---------------------------------------------------------------------------

/// Log length and first/last point of a reconstructed series, or warn when
/// the series came back empty.
pub fn log_series_summary(source: Source, label: &str, series: &[HourBucket]) {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) => {
            let message = format!(
                "{} series: {} points, {} ({}) .. {} ({})",
                label,
                series.len(),
                first.hour.format(TIMESTAMP_FORMAT),
                first.value,
                last.hour.format(TIMESTAMP_FORMAT),
                last.value
            );
            info(source, None, &message);
        }
        _ => warn(source, None, &format!("No data found for {} series", label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_query_failure_classification() {
        let missing = "No forecast data for window 2018-05-22 23:00:00 .. 2018-05-23 23:00:00";
        assert_eq!(classify_query_failure(missing), FailureType::Expected);

        let refused = "Database error: error connecting to server: connection refused";
        assert_eq!(classify_query_failure(refused), FailureType::Unexpected);

        assert_eq!(classify_query_failure("something odd"), FailureType::Unknown);
    }

    #[test]
    fn test_storage_failure_classification() {
        assert_eq!(classify_storage_failure("HTTP 404 Not Found"), FailureType::Expected);
        assert_eq!(classify_storage_failure("HTTP 500"), FailureType::Unexpected);
    }

    #[test]
    fn test_short_id_keeps_first_twelve_chars() {
        assert_eq!(
            short_id("b0e008522be904bcf71e290b3b0096b33c3e24d9b623dcbe7e58e7d1cc82d0db"),
            "b0e008522be9"
        );
        assert_eq!(short_id("KUB"), "KUB");
    }
}
