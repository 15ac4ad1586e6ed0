/// Entry flows behind the three subcommands.
///
/// - `rf-to-csv`: compose both Kelani basin series and write the rain CSV.
/// - `update-control`: copy the rain CSV's time span into the HEC-HMS
///   control file.
/// - `wrf-trigger`: fetch the WRF NetCDF output for a run date.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::{Path, PathBuf};

use crate::analysis::compose::compose_basin;
use crate::basins::{self, LOWER_BASIN, UPPER_BASIN};
use crate::config::Config;
use crate::control::{self, ControlTimes};
use crate::ingest::{PgReadingStore, ReadingStore};
use crate::logging::{self, Source};
use crate::model::PipelineError;
use crate::output::rain_csv::{self, rain_csv_path};
use crate::wrf_trigger::{self, WrfRequest};

// ---------------------------------------------------------------------------
// Date/time arguments
// ---------------------------------------------------------------------------

pub fn parse_run_date(date: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| PipelineError::InvalidDateTime(format!("date '{}': {}", date, e)))
}

pub fn parse_run_time(time: &str) -> Result<NaiveTime, PipelineError> {
    NaiveTime::parse_from_str(time.trim(), "%H:%M:%S")
        .map_err(|e| PipelineError::InvalidDateTime(format!("time '{}': {}", time, e)))
}

/// Model run timestamp from `YYYY-MM-DD` and `HH:MM:SS` arguments.
pub fn parse_run_datetime(date: &str, time: &str) -> Result<NaiveDateTime, PipelineError> {
    Ok(parse_run_date(date)?.and_time(parse_run_time(time)?))
}

// ---------------------------------------------------------------------------
// Completion report
// ---------------------------------------------------------------------------

/// Logs the completion line when dropped, whichever way the run ended.
pub struct CompletionReport {
    source: String,
    target: String,
    succeeded: bool,
}

impl CompletionReport {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            succeeded: false,
        }
    }

    pub fn succeed(&mut self) {
        self.succeeded = true;
    }

    pub fn message(&self) -> String {
        let outcome = if self.succeeded { "ok" } else { "failed" };
        format!("Completed {} to {} ({})", self.source, self.target, outcome)
    }
}

impl Drop for CompletionReport {
    fn drop(&mut self) {
        if self.succeeded {
            logging::info(Source::System, None, &self.message());
        } else {
            logging::error(Source::System, None, &self.message());
        }
    }
}

// ---------------------------------------------------------------------------
// rf-to-csv
// ---------------------------------------------------------------------------

/// Connects to the reading store and writes the rain CSV for `run`.
pub fn run_rf_to_csv(
    config: &Config,
    run: NaiveDateTime,
    tag: Option<&str>,
) -> Result<PathBuf, PipelineError> {
    let path = rain_csv_path(&config.output_dir, &config.rain_csv_file, run.date(), tag);
    let mut report = CompletionReport::new(&config.rf_dir_path, &path.display().to_string());

    let mut store = PgReadingStore::connect(&config.connection_string())?;
    compose_and_write(&mut store, run, &path)?;

    report.succeed();
    Ok(path)
}

/// Composes the upper and lower basin series from `store` and writes them
/// side by side to `path`.
pub fn compose_and_write(
    store: &mut dyn ReadingStore,
    run: NaiveDateTime,
    path: &Path,
) -> Result<(), PipelineError> {
    logging::info(Source::System, None, &format!("RF to CSV run for {}", run));

    let upper = basins::find_basin(UPPER_BASIN)
        .ok_or_else(|| PipelineError::Config(format!("basin {} not registered", UPPER_BASIN)))?;
    let lower = basins::find_basin(LOWER_BASIN)
        .ok_or_else(|| PipelineError::Config(format!("basin {} not registered", LOWER_BASIN)))?;

    let upper_series = compose_basin(store, upper, run)?;
    let lower_series = compose_basin(store, lower, run)?;

    rain_csv::write_rain_csv(path, &upper_series, &lower_series, &basins::csv_locations())
}

// ---------------------------------------------------------------------------
// update-control
// ---------------------------------------------------------------------------

/// Reads the rain CSV for `date` and patches its span into the control file.
pub fn run_update_control(
    config: &Config,
    date: NaiveDate,
    tag: Option<&str>,
) -> Result<ControlTimes, PipelineError> {
    let csv_path = rain_csv_path(&config.output_dir, &config.rain_csv_file, date, tag);
    let mut report = CompletionReport::new(
        &csv_path.display().to_string(),
        &config.hec_hms_control.display().to_string(),
    );

    let csv = rain_csv::read_rain_csv(&csv_path)?;
    let times = ControlTimes::from_rain_csv(&csv, config.time_interval)?;
    logging::debug(
        Source::ControlFile,
        None,
        &format!("{} rows, {} .. {}", csv.rows.len(), times.start, times.end),
    );
    control::patch_control_file(&config.hec_hms_control, &times)?;

    report.succeed();
    Ok(times)
}

// ---------------------------------------------------------------------------
// wrf-trigger
// ---------------------------------------------------------------------------

/// Downloads the run's NetCDF file. Returns whether the file was fetched;
/// storage failures are logged and reported as "try again later" since the
/// trigger is rerun by the scheduler.
pub fn run_wrf_trigger(config: &Config, request: &WrfRequest) -> Result<bool, PipelineError> {
    logging::info(
        Source::Storage,
        None,
        &format!("WRF trigger run for {} {}", request.run_date, request.run_time),
    );

    match wrf_trigger::trigger_download(config, request) {
        Ok(Some(_)) => {
            logging::info(Source::Storage, None, "proceed");
            Ok(true)
        }
        Ok(None) => {
            logging::info(Source::Storage, None, "try again later.");
            Ok(false)
        }
        Err(e @ PipelineError::Config(_)) => Err(e),
        Err(e) => {
            logging::log_storage_failure(&config.bucket_name, "download required files", &e);
            logging::info(Source::Storage, None, "try again later.");
            Ok(false)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
