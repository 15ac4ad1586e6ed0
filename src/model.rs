/// Core data types for the Kelani basin rainfall pipeline.
///
/// This module defines the shared domain model imported by all other modules:
/// raw readings, hour buckets, query windows and the crate-wide error type.
/// It contains no I/O.

use chrono::{Duration, NaiveDateTime, Timelike};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Series shape constants
// ---------------------------------------------------------------------------

/// Number of hourly points in a composed basin series and in the CSV body.
pub const SERIES_LENGTH: usize = 119;

/// Hours of look-back before the model run, for both observations and the
/// day0 hindcast.
pub const LOOKBACK_HOURS: i64 = 48;

/// The stitched forecast is padded with zeros until it reaches this many
/// hours past the model run.
pub const FORECAST_HORIZON_HOURS: i64 = 72;

/// Timestamp format used on the command line, in the store and in the CSV.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single raw rainfall value as stored for one series identifier.
///
/// Times are Sri Lanka wall-clock times with no zone attached, exactly as the
/// store keeps them. Values are millimetres of rainfall.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub time: NaiveDateTime,
    pub value: Decimal,
}

impl Reading {
    pub fn new(time: NaiveDateTime, value: Decimal) -> Self {
        Self { time, value }
    }
}

/// Accumulated rainfall for one clock hour.
///
/// Also used for every point of a stitched or composed series, where `hour`
/// is the point's timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct HourBucket {
    pub hour: NaiveDateTime,
    pub value: Decimal,
}

impl HourBucket {
    pub fn new(hour: NaiveDateTime, value: Decimal) -> Self {
        Self { hour, value }
    }
}

/// An ordered hourly series for one basin.
pub type BasinSeries = Vec<HourBucket>;

/// Truncates a timestamp to the start of its hour.
pub fn truncate_to_hour(time: NaiveDateTime) -> NaiveDateTime {
    time.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_minute(0))
        .unwrap_or(time)
}

// ---------------------------------------------------------------------------
// Query windows
// ---------------------------------------------------------------------------

/// An inclusive `[start, end]` time range used to query one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl HorizonWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Observation window: the 48 hours up to and including the model run.
    pub fn observed(run: NaiveDateTime) -> Self {
        Self::new(run - Duration::hours(LOOKBACK_HOURS), run)
    }

    /// Returns true if `time` lies within the window, bounds included.
    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.start <= time && time <= self.end
    }
}

impl std::fmt::Display for HorizonWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format(TIMESTAMP_FORMAT),
            self.end.format(TIMESTAMP_FORMAT)
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise anywhere in the pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// A date or time argument did not match the expected format.
    InvalidDateTime(String),
    /// The configuration file exists but could not be read or parsed.
    Config(String),
    /// The relational store rejected a connection or query.
    Database(String),
    /// None of the three forecast horizons returned any hourly data.
    NoForecastData { window: String },
    /// A series has fewer points than an operation needs to index.
    SeriesTooShort { series: String, len: usize, required: usize },
    /// A rain CSV could not be written or re-read.
    Csv(String),
    /// The control file could not be patched.
    ControlFile(String),
    /// Object storage listing or download failed.
    Storage(String),
    /// Any other filesystem failure.
    Io(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidDateTime(msg) => write!(f, "Invalid date/time: {}", msg),
            PipelineError::Config(msg) => write!(f, "Config error: {}", msg),
            PipelineError::Database(msg) => write!(f, "Database error: {}", msg),
            PipelineError::NoForecastData { window } => {
                write!(f, "No forecast data for window {}", window)
            }
            PipelineError::SeriesTooShort { series, len, required } => write!(
                f,
                "Series {} has {} points, {} required",
                series, len, required
            ),
            PipelineError::Csv(msg) => write!(f, "CSV error: {}", msg),
            PipelineError::ControlFile(msg) => write!(f, "Control file error: {}", msg),
            PipelineError::Storage(msg) => write!(f, "Storage error: {}", msg),
            PipelineError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<postgres::Error> for PipelineError {
    fn from(err: postgres::Error) -> Self {
        PipelineError::Database(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 5, 22)
            .unwrap()
            .and_hms_micro_opt(h, m, s, 250_000)
            .unwrap()
    }

    #[test]
    fn test_truncate_to_hour_zeroes_minutes_seconds_and_micros() {
        let truncated = truncate_to_hour(at(21, 45, 30));
        assert_eq!(truncated.format(TIMESTAMP_FORMAT).to_string(), "2018-05-22 21:00:00");
        assert_eq!(truncated.nanosecond(), 0);
    }

    #[test]
    fn test_observed_window_spans_48_hours_ending_at_run() {
        let run = NaiveDate::from_ymd_opt(2018, 5, 22).unwrap().and_hms_opt(21, 0, 0).unwrap();
        let window = HorizonWindow::observed(run);
        assert_eq!(window.end, run);
        assert_eq!(window.end - window.start, Duration::hours(48));
        assert!(window.contains(run));
        assert!(window.contains(window.start));
        assert!(!window.contains(run + Duration::seconds(1)));
    }

    #[test]
    fn test_error_display_names_the_series() {
        let err = PipelineError::SeriesTooShort {
            series: "KLB".to_string(),
            len: 80,
            required: 119,
        };
        assert_eq!(err.to_string(), "Series KLB has 80 points, 119 required");
    }
}
