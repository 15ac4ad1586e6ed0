/// Command line interface.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::model::PipelineError;
use crate::pipeline::{parse_run_date, parse_run_time};
use crate::wrf_trigger::WrfRequest;

#[derive(Parser, Debug)]
#[command(name = "kelani-rainfall", version, about = "Kelani basin rainfall pipeline", long_about = None)]
pub struct Cli {
    /// JSON (`.json`) or TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Append log lines to this file as well
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    /// Include debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose the basin rainfall series and write the rain CSV
    RfToCsv(RfToCsvArgs),
    /// Copy the rain CSV time span into the HEC-HMS control file
    UpdateControl(UpdateControlArgs),
    /// Download the WRF NetCDF output for a run date
    WrfTrigger(WrfTriggerArgs),
}

#[derive(Args, Debug)]
pub struct RfToCsvArgs {
    /// Model run date, YYYY-MM-DD (default today)
    #[arg(short = 'd', long)]
    pub date: Option<String>,
    /// Model run time, HH:MM:SS (default the current hour)
    #[arg(short = 't', long)]
    pub time: Option<String>,
    /// Simulation start date, YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<String>,
    /// Simulation start time, HH:MM:SS
    #[arg(long)]
    pub start_time: Option<String>,
    #[arg(short = 'T', long)]
    pub tag: Option<String>,
    /// Override RF_DIR_PATH
    #[arg(long = "wrf-rf")]
    pub wrf_rf: Option<String>,
    /// Override KUB_DIR_PATH; accepted for compatibility, not read
    #[arg(long = "wrf-kub")]
    pub wrf_kub: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateControlArgs {
    /// Date of the rain CSV, YYYY-MM-DD (default today)
    pub date: Option<String>,
    #[arg(short = 'T', long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug)]
pub struct WrfTriggerArgs {
    /// Run date, YYYY-MM-DD (default today)
    #[arg(short = 'd', long)]
    pub date: Option<String>,
    /// Run time, HH:00:00 (default the current hour)
    #[arg(short = 't', long)]
    pub time: Option<String>,
    /// Forecast days past the run
    #[arg(short = 'f', long, default_value_t = 3)]
    pub forward: u32,
    /// History days before the run
    #[arg(short = 'b', long, default_value_t = 2)]
    pub backward: u32,
    #[arg(short = 'T', long)]
    pub tag: Option<String>,
}

fn date_or_today(date: Option<&str>) -> Result<NaiveDate, PipelineError> {
    match date {
        Some(date) => parse_run_date(date),
        None => Ok(Local::now().date_naive()),
    }
}

fn time_or_current_hour(time: Option<&str>) -> Result<NaiveTime, PipelineError> {
    match time {
        Some(time) => parse_run_time(time),
        None => NaiveTime::from_hms_opt(Local::now().hour(), 0, 0)
            .ok_or_else(|| PipelineError::InvalidDateTime("current hour".to_string())),
    }
}

impl RfToCsvArgs {
    pub fn run_datetime(&self) -> Result<NaiveDateTime, PipelineError> {
        let date = date_or_today(self.date.as_deref())?;
        let time = time_or_current_hour(self.time.as_deref())?;
        Ok(date.and_time(time))
    }

    /// Validates the optional simulation start. It does not move the series
    /// window, which always follows the model run.
    pub fn simulation_start(&self) -> Result<Option<NaiveDateTime>, PipelineError> {
        match (self.start_date.as_deref(), self.start_time.as_deref()) {
            (None, None) => Ok(None),
            (date, time) => {
                let date = date_or_today(date)?;
                let time = match time {
                    Some(time) => parse_run_time(time)?,
                    None => NaiveTime::MIN,
                };
                Ok(Some(date.and_time(time)))
            }
        }
    }
}

impl UpdateControlArgs {
    pub fn csv_date(&self) -> Result<NaiveDate, PipelineError> {
        date_or_today(self.date.as_deref())
    }
}

impl WrfTriggerArgs {
    pub fn request(&self) -> Result<WrfRequest, PipelineError> {
        Ok(WrfRequest {
            run_date: date_or_today(self.date.as_deref())?,
            run_time: time_or_current_hour(self.time.as_deref())?,
            forward_days: self.forward,
            backward_days: self.backward,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
