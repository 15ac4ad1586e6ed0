/// Delft-FEWS rain CSV.
///
/// Layout (https://publicwiki.deltares.nl/display/FEWSDOC/CSV):
///
/// ```text
/// Location Names,Awissawella,Colombo
/// Location Ids,Awissawella,Colombo
/// Time,Rainfall,Rainfall
/// 2018-05-20 21:00:00,0.00,1.25
/// ...
/// ```
///
/// Exactly 119 data rows follow the three metadata rows.

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, WriterBuilder};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::logging::{self, Source};
use crate::model::{HourBucket, PipelineError, SERIES_LENGTH, TIMESTAMP_FORMAT};

/// Rows preceding the data rows.
pub const METADATA_ROWS: usize = 3;

const QUOTE: u8 = b'|';

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// Inserts the run date, and the tag if any, before the extension of the
/// configured base name: `DailyRain.csv` → `DailyRain-2018-05-22.wrf1.csv`.
pub fn rain_csv_file_name(base: &str, run_date: NaiveDate, tag: Option<&str>) -> String {
    let date = run_date.format("%Y-%m-%d");
    let tag = tag.filter(|t| !t.is_empty()).map(|t| format!(".{}", t)).unwrap_or_default();
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}{}.{}", stem, date, tag, ext),
        None => format!("{}-{}{}", base, date, tag),
    }
}

/// Full path of the rain CSV for a run.
pub fn rain_csv_path(output_dir: &Path, base: &str, run_date: NaiveDate, tag: Option<&str>) -> PathBuf {
    output_dir.join(rain_csv_file_name(base, run_date, tag))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Formats a rainfall value to two decimal places.
///
/// The value is rounded from its nearest `f64`, so `12.345` gives `12.35` and
/// `0.015` gives `0.01`, matching CSVs produced by earlier runs.
pub fn format_rainfall(value: Decimal) -> String {
    match value.to_f64() {
        Some(v) => format!("{:.2}", v),
        None => format!("{:.2}", value.round_dp(2)),
    }
}

/// Writes the upper and lower basin series side by side.
///
/// The timestamp column is taken from `upper`. Both series must hold at
/// least 119 points; extra points are ignored.
pub fn write_rain_csv(
    path: &Path,
    upper: &[HourBucket],
    lower: &[HourBucket],
    locations: &[&str],
) -> Result<(), PipelineError> {
    for (label, series) in [("upper basin", upper), ("lower basin", lower)] {
        if series.len() < SERIES_LENGTH {
            return Err(PipelineError::SeriesTooShort {
                series: label.to_string(),
                len: series.len(),
                required: SERIES_LENGTH,
            });
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(b',')
        .quote(QUOTE)
        .from_path(path)?;

    let mut names = vec!["Location Names"];
    names.extend_from_slice(locations);
    writer.write_record(&names)?;

    let mut ids = vec!["Location Ids"];
    ids.extend_from_slice(locations);
    writer.write_record(&ids)?;

    let mut headers = vec!["Time"];
    headers.extend(locations.iter().map(|_| "Rainfall"));
    writer.write_record(&headers)?;

    for (up, low) in upper.iter().zip(lower.iter()).take(SERIES_LENGTH) {
        writer.write_record([
            up.hour.format(TIMESTAMP_FORMAT).to_string(),
            format_rainfall(up.value),
            format_rainfall(low.value),
        ])?;
    }
    writer.flush()?;

    logging::info(
        Source::Csv,
        None,
        &format!("Wrote {} rows to {}", SERIES_LENGTH, path.display()),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One data row of a rain CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct RainRow {
    pub time: NaiveDateTime,
    pub values: Vec<Decimal>,
}

/// A parsed rain CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct RainCsv {
    pub locations: Vec<String>,
    pub rows: Vec<RainRow>,
}

impl RainCsv {
    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.rows.first().map(|r| r.time)
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|r| r.time)
    }
}

/// Reads a rain CSV written by `write_rain_csv`.
pub fn read_rain_csv(path: &Path) -> Result<RainCsv, PipelineError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .quote(QUOTE)
        .flexible(true)
        .from_path(path)?;

    let mut locations = Vec::new();
    let mut rows = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if line == 0 {
            locations = record.iter().skip(1).map(String::from).collect();
            continue;
        }
        if line < METADATA_ROWS {
            continue;
        }

        let time_field = record
            .get(0)
            .ok_or_else(|| PipelineError::Csv(format!("line {}: empty row", line + 1)))?;
        let time = NaiveDateTime::parse_from_str(time_field, TIMESTAMP_FORMAT)
            .map_err(|e| PipelineError::Csv(format!("line {}: '{}': {}", line + 1, time_field, e)))?;
        let values = record
            .iter()
            .skip(1)
            .map(|v| {
                Decimal::from_str(v.trim())
                    .map_err(|e| PipelineError::Csv(format!("line {}: '{}': {}", line + 1, v, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(RainRow { time, values });
    }

    Ok(RainCsv { locations, rows })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 5, 22).unwrap()
    }

    fn series(milli_step: i64) -> Vec<HourBucket> {
        let start = run_date().and_hms_opt(21, 0, 0).unwrap() - Duration::hours(48);
        (0..121)
            .map(|i| HourBucket::new(start + Duration::hours(i), Decimal::new(i * milli_step, 3)))
            .collect()
    }

    // --- Naming -------------------------------------------------------------

    #[test]
    fn test_file_name_inserts_date_before_extension() {
        assert_eq!(rain_csv_file_name("DailyRain.csv", run_date(), None), "DailyRain-2018-05-22.csv");
    }

    #[test]
    fn test_file_name_includes_tag() {
        assert_eq!(
            rain_csv_file_name("DailyRain.csv", run_date(), Some("wrf1")),
            "DailyRain-2018-05-22.wrf1.csv"
        );
        assert_eq!(rain_csv_file_name("DailyRain.csv", run_date(), Some("")), "DailyRain-2018-05-22.csv");
    }

    #[test]
    fn test_file_name_splits_on_last_dot() {
        assert_eq!(
            rain_csv_file_name("rain.daily.csv", run_date(), None),
            "rain.daily-2018-05-22.csv"
        );
        assert_eq!(rain_csv_file_name("DailyRain", run_date(), None), "DailyRain-2018-05-22");
    }

    // --- Formatting ---------------------------------------------------------

    #[test]
    fn test_format_rainfall_two_places() {
        assert_eq!(format_rainfall(Decimal::ZERO), "0.00");
        assert_eq!(format_rainfall(Decimal::new(5, 1)), "0.50");
        assert_eq!(format_rainfall(Decimal::from(7)), "7.00");
    }

    #[test]
    fn test_format_rainfall_rounds_from_nearest_double() {
        // 12.345 is stored as 12.3450000000000006..., 0.015 as 0.01499999...
        assert_eq!(format_rainfall(Decimal::new(12_345, 3)), "12.35");
        assert_eq!(format_rainfall(Decimal::new(15, 3)), "0.01");
        assert_eq!(format_rainfall(Decimal::new(2_675, 3)), "2.67");
        assert_eq!(format_rainfall(Decimal::new(12_355, 3)), "12.36");
    }

    // --- Writing ------------------------------------------------------------

    #[test]
    fn test_written_file_has_metadata_and_119_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("DailyRain-2018-05-22.csv");

        write_rain_csv(&path, &series(1), &series(2), &["Awissawella", "Colombo"]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3 + 119);
        assert_eq!(lines[0], "Location Names,Awissawella,Colombo");
        assert_eq!(lines[1], "Location Ids,Awissawella,Colombo");
        assert_eq!(lines[2], "Time,Rainfall,Rainfall");
        assert_eq!(lines[3], "2018-05-20 21:00:00,0.00,0.00");
        assert_eq!(lines[13], "2018-05-21 07:00:00,0.01,0.02");
    }

    #[test]
    fn test_short_series_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.csv");
        let short: Vec<HourBucket> = series(1).into_iter().take(100).collect();

        let result = write_rain_csv(&path, &series(1), &short, &["Awissawella", "Colombo"]);

        assert!(matches!(result, Err(PipelineError::SeriesTooShort { len: 100, .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_round_trip_preserves_times_and_two_place_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.csv");
        let upper = series(7);
        let lower = series(3);

        write_rain_csv(&path, &upper, &lower, &["Awissawella", "Colombo"]).unwrap();
        let parsed = read_rain_csv(&path).unwrap();

        assert_eq!(parsed.locations, vec!["Awissawella", "Colombo"]);
        assert_eq!(parsed.rows.len(), 119);
        for (i, row) in parsed.rows.iter().enumerate() {
            assert_eq!(row.time, upper[i].hour);
            assert_eq!(format_rainfall(row.values[0]), format_rainfall(upper[i].value));
            assert_eq!(format_rainfall(row.values[1]), format_rainfall(lower[i].value));
        }
        assert_eq!(parsed.first_time(), Some(upper[0].hour));
        assert_eq!(parsed.last_time(), Some(upper[118].hour));
    }

    #[test]
    fn test_read_rejects_bad_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Location Names,A\nLocation Ids,A\nTime,Rainfall\n22/05/2018,1.00\n").unwrap();
        assert!(matches!(read_rain_csv(&path), Err(PipelineError::Csv(_))));
    }
}
