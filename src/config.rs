/// Run configuration.
///
/// Deployed hosts keep a `CONFIG.json` with upper-case keys; TOML files with
/// the same keys are accepted as well. Every key is optional and unknown keys
/// are ignored, so one file can be shared by all three subcommands.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{self, Source};
use crate::model::PipelineError;

pub const DEFAULT_CONFIG_PATH: &str = "CONFIG.json";

fn default_rain_csv_file() -> String {
    "DailyRain.csv".to_string()
}

fn default_rf_dir_path() -> String {
    "./WRF/RF/".to_string()
}

fn default_kub_dir_path() -> String {
    "./WRF/kelani-upper-basin".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./OUTPUT")
}

fn default_hec_data_dir() -> String {
    "/home/uwcc-admin/udp/hec_data/".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_user() -> String {
    "root".to_string()
}

fn default_db_name() -> String {
    "curw".to_string()
}

fn default_control_file() -> PathBuf {
    PathBuf::from("./2008_2_Events/Control_1.control")
}

fn default_time_interval() -> u32 {
    60
}

fn default_wrf_data_dir() -> String {
    "./WRF/".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    /// Accepted for CONFIG.json compatibility; not read.
    pub rf_forecasted_days: u32,
    /// Base name of the rain CSV; the run date is inserted before the extension.
    pub rain_csv_file: String,
    /// WRF rainfall directory, named in the completion line of `rf-to-csv`.
    pub rf_dir_path: String,
    /// Accepted for CONFIG.json compatibility (and `--wrf-kub`); not read.
    pub kub_dir_path: String,
    pub output_dir: PathBuf,
    /// Accepted for CONFIG.json compatibility; not read.
    pub hec_data_dir: String,

    #[serde(alias = "MYSQL_HOST")]
    pub db_host: String,
    #[serde(alias = "MYSQL_USER")]
    pub db_user: String,
    #[serde(alias = "MYSQL_DB")]
    pub db_name: String,
    #[serde(alias = "MYSQL_PASSWORD")]
    pub db_password: String,
    /// Full connection URL; wins over the discrete settings above.
    pub database_url: Option<String>,

    pub hec_hms_control: PathBuf,
    /// Minutes written to the control file's `Time Interval:` line.
    pub time_interval: u32,

    /// Service account key JSON used to mint Cloud Storage access tokens.
    /// Empty means anonymous access.
    pub key_file_path: String,
    pub bucket_name: String,
    pub initial_path_prefix: String,
    /// NetCDF name template, e.g. `wrfout-d03.nc`; see `wrf_trigger`.
    pub net_cdf_file: String,
    pub wrf_data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rf_forecasted_days: 0,
            rain_csv_file: default_rain_csv_file(),
            rf_dir_path: default_rf_dir_path(),
            kub_dir_path: default_kub_dir_path(),
            output_dir: default_output_dir(),
            hec_data_dir: default_hec_data_dir(),
            db_host: default_db_host(),
            db_user: default_db_user(),
            db_name: default_db_name(),
            db_password: String::new(),
            database_url: None,
            hec_hms_control: default_control_file(),
            time_interval: default_time_interval(),
            key_file_path: String::new(),
            bucket_name: String::new(),
            initial_path_prefix: String::new(),
            net_cdf_file: String::new(),
            wrf_data_dir: default_wrf_data_dir(),
        }
    }
}

impl Config {
    /// Parses configuration text, as JSON or TOML depending on `is_json`.
    pub fn parse(text: &str, is_json: bool) -> Result<Self, PipelineError> {
        if is_json {
            Ok(serde_json::from_str(text)?)
        } else {
            Ok(toml::from_str(text)?)
        }
    }

    /// Loads the configuration file at `path`.
    ///
    /// A missing file is not an error: every setting falls back to its
    /// default and a warning is logged. Files ending in `.json` are read as
    /// JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                logging::warn(
                    Source::System,
                    None,
                    &format!("config {} not found, using defaults", path.display()),
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(PipelineError::Config(format!("{}: {}", path.display(), e)));
            }
        };

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self::parse(&text, is_json)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Applies a `DATABASE_URL` taken from the environment.
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database_url = Some(url);
        }
        self
    }

    /// Applies the `--wrf-rf` / `--wrf-kub` command line overrides.
    pub fn with_wrf_dirs(mut self, rf_dir: Option<String>, kub_dir: Option<String>) -> Self {
        if let Some(dir) = rf_dir {
            self.rf_dir_path = dir;
        }
        if let Some(dir) = kub_dir {
            self.kub_dir_path = dir;
        }
        self
    }

    /// Connection string for the reading store.
    pub fn connection_string(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => {
                let mut conn = format!(
                    "host={} user={} dbname={}",
                    self.db_host, self.db_user, self.db_name
                );
                if !self.db_password.is_empty() {
                    conn.push_str(&format!(" password={}", self.db_password));
                }
                conn
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
