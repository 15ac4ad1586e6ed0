/// Forecast stitching across the three WRF horizons.
///
/// Each WRF run publishes its basin mean rainfall as three separate series:
/// day0 (a 48 hour hindcast up to 23:00 on the run date), day1 and day2.
/// Stitching fetches each horizon over its own window, aggregates it to hourly
/// buckets, concatenates the three and zero-pads the tail so the result always
/// reaches 72 hours past the model run.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::analysis::hourly::aggregate_hourly;
use crate::ingest::ReadingStore;
use crate::logging::{self, Source};
use crate::model::{
    FORECAST_HORIZON_HOURS, HorizonWindow, HourBucket, LOOKBACK_HOURS, PipelineError,
};

// ---------------------------------------------------------------------------
// Horizon windows
// ---------------------------------------------------------------------------

/// Query windows for the day0, day1 and day2 horizons of a model run.
///
/// day0 runs from 48 hours before the run to 23:00 on the run date; day1 and
/// day2 each cover the following 24 hours. Adjacent windows share their
/// boundary instant.
pub fn horizon_windows(run: NaiveDateTime) -> [HorizonWindow; 3] {
    let day0_end = run.date().and_time(NaiveTime::MIN) + Duration::hours(23);
    let day0 = HorizonWindow::new(run - Duration::hours(LOOKBACK_HOURS), day0_end);
    let day1 = HorizonWindow::new(day0.end, day0.end + Duration::hours(24));
    let day2 = HorizonWindow::new(day1.end, day1.end + Duration::hours(24));
    [day0, day1, day2]
}

// ---------------------------------------------------------------------------
// Stitching
// ---------------------------------------------------------------------------

/// Concatenates aggregated horizons and zero-pads the tail to `run + 72h`.
///
/// Horizons are appended in the order given without re-sorting. Padding
/// starts one hour after the last available point and stops at the first
/// point at or beyond the target.
///
/// Returns `NoForecastData` if every horizon is empty.
pub fn stitch_horizons(
    run: NaiveDateTime,
    horizons: Vec<Vec<HourBucket>>,
) -> Result<Vec<HourBucket>, PipelineError> {
    let mut series: Vec<HourBucket> = horizons.into_iter().flatten().collect();

    let target = run + Duration::hours(FORECAST_HORIZON_HOURS);
    let Some(mut cursor) = series.last().map(|b| b.hour) else {
        return Err(PipelineError::NoForecastData {
            window: HorizonWindow::new(run - Duration::hours(LOOKBACK_HOURS), target).to_string(),
        });
    };

    while cursor < target {
        cursor += Duration::hours(1);
        series.push(HourBucket::new(cursor, Decimal::ZERO));
    }

    Ok(series)
}

/// Fetches, aggregates and stitches the three forecast horizons for a run.
///
/// # Arguments
/// * `store` - reading source
/// * `run` - model run timestamp
/// * `forecast_ids` - series identifiers for day0, day1 and day2
pub fn stitch_forecast(
    store: &mut dyn ReadingStore,
    run: NaiveDateTime,
    forecast_ids: &[&str; 3],
) -> Result<Vec<HourBucket>, PipelineError> {
    let windows = horizon_windows(run);
    let mut horizons = Vec::with_capacity(3);

    for (day, (&series_id, window)) in forecast_ids.iter().zip(windows.iter()).enumerate() {
        let readings = store.fetch_readings(series_id, window).inspect_err(|e| {
            logging::log_query_failure(series_id, &format!("day{} forecast fetch", day), e)
        })?;
        let buckets = aggregate_hourly(&readings);

        if buckets.is_empty() {
            logging::warn(
                Source::Forecast,
                Some(series_id),
                &format!("day{} horizon empty for {} ({} raw readings)", day, window, readings.len()),
            );
        } else {
            logging::debug(
                Source::Forecast,
                Some(series_id),
                &format!("day{}: {} hourly points from {} readings", day, buckets.len(), readings.len()),
            );
        }
        horizons.push(buckets);
    }

    stitch_horizons(run, horizons).inspect_err(|e| {
        logging::log_query_failure(forecast_ids[0], "forecast stitch", e)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
