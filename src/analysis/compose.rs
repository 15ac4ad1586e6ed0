/// Basin series composition.
///
/// A basin with gauges gets a series whose past hours come from observation
/// wherever an observed bucket exists for the exact slot, and from the
/// stitched forecast everywhere else. A basin without gauges simply uses the
/// stitched forecast.

use chrono::{Duration, NaiveDateTime};

use crate::analysis::forecast::stitch_forecast;
use crate::analysis::hourly::aggregate_hourly;
use crate::basins::Basin;
use crate::ingest::ReadingStore;
use crate::logging::{self, Source};
use crate::model::{
    BasinSeries, HorizonWindow, HourBucket, LOOKBACK_HOURS, PipelineError, SERIES_LENGTH,
};

/// Slot timestamps of a composed series.
///
/// Slot 0 is `run - 48h`; every later slot `i` is `run - 48h + (i + 1)h`, so
/// the first step is two hours and the hour `run - 47h` never gets a slot.
pub fn slot_times(run: NaiveDateTime) -> Vec<NaiveDateTime> {
    let start = run - Duration::hours(LOOKBACK_HOURS);
    (0..SERIES_LENGTH as i64)
        .map(|i| if i == 0 { start } else { start + Duration::hours(i + 1) })
        .collect()
}

/// Merges observed hourly buckets over the stitched forecast.
///
/// Observed buckets are consumed strictly in order: a slot takes the next
/// unconsumed bucket only if its hour equals the slot time, otherwise the
/// slot falls back to the forecast value at the same index. Every output
/// point carries its slot timestamp.
///
/// Returns `SeriesTooShort` if a fallback slot indexes past the end of the
/// forecast.
pub fn compose_with_observation(
    observed: &[HourBucket],
    forecast: &[HourBucket],
    run: NaiveDateTime,
) -> Result<BasinSeries, PipelineError> {
    let mut series = Vec::with_capacity(SERIES_LENGTH);
    let mut pending = observed.iter().peekable();

    for (i, slot) in slot_times(run).into_iter().enumerate() {
        let value = match pending.next_if(|b| b.hour == slot) {
            Some(bucket) => bucket.value,
            None => forecast
                .get(i)
                .map(|b| b.value)
                .ok_or_else(|| PipelineError::SeriesTooShort {
                    series: "forecast".to_string(),
                    len: forecast.len(),
                    required: i + 1,
                })?,
        };
        series.push(HourBucket::new(slot, value));
    }

    Ok(series)
}

/// A basin without observations uses the stitched forecast as-is. Points
/// beyond the first 119 are carried along but never written.
pub fn compose_without_observation(forecast: Vec<HourBucket>) -> BasinSeries {
    forecast
}

/// Fetches the 48 hour observation window and aggregates it to hours.
pub fn fetch_observed(
    store: &mut dyn ReadingStore,
    run: NaiveDateTime,
    observed_id: &str,
) -> Result<Vec<HourBucket>, PipelineError> {
    let window = HorizonWindow::observed(run);
    let readings = store
        .fetch_readings(observed_id, &window)
        .inspect_err(|e| logging::log_query_failure(observed_id, "observed fetch", e))?;
    let buckets = aggregate_hourly(&readings);

    if buckets.is_empty() {
        logging::warn(
            Source::Observed,
            Some(observed_id),
            &format!("no observed hours for {}; forecast fills every slot", window),
        );
    }
    Ok(buckets)
}

/// Builds the composed series for one basin, choosing the variant from
/// whether the basin has an observed series.
pub fn compose_basin(
    store: &mut dyn ReadingStore,
    basin: &Basin,
    run: NaiveDateTime,
) -> Result<BasinSeries, PipelineError> {
    let series = match basin.observed_id {
        Some(observed_id) => {
            let observed = fetch_observed(store, run, observed_id)?;
            let forecast = stitch_forecast(store, run, &basin.forecast_ids)?;
            compose_with_observation(&observed, &forecast, run)
        }
        None => {
            let forecast = stitch_forecast(store, run, &basin.forecast_ids)?;
            Ok(compose_without_observation(forecast))
        }
    }
    .map_err(|e| match e {
        PipelineError::SeriesTooShort { len, required, .. } => PipelineError::SeriesTooShort {
            series: format!("{} forecast", basin.key),
            len,
            required,
        },
        other => other,
    })?;

    logging::log_series_summary(Source::Forecast, basin.key, &series);
    Ok(series)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::forecast::stitch_horizons;
    use crate::basins::{LOWER_BASIN, UPPER_BASIN, find_basin};
    use crate::ingest::MemoryStore;
    use crate::model::{Reading, TIMESTAMP_FORMAT};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    /// Model run used across the tests: 2018-05-22 21:00:00.
    fn run() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 5, 22).unwrap().and_hms_opt(21, 0, 0).unwrap()
    }

    fn start() -> NaiveDateTime {
        run() - Duration::hours(48)
    }

    /// 121 hourly forecast points from run-48h to run+72h, value = index.
    fn forecast() -> Vec<HourBucket> {
        (0..121)
            .map(|h| HourBucket::new(start() + Duration::hours(h), Decimal::from(h)))
            .collect()
    }

    // --- Slot layout --------------------------------------------------------

    #[test]
    fn test_slot_times_start_with_a_two_hour_step() {
        let slots = slot_times(run());
        assert_eq!(slots.len(), 119);
        assert_eq!(slots[0].format(TIMESTAMP_FORMAT).to_string(), "2018-05-20 21:00:00");
        assert_eq!(slots[1].format(TIMESTAMP_FORMAT).to_string(), "2018-05-20 23:00:00");
        for (i, slot) in slots.iter().enumerate().skip(1) {
            assert_eq!(*slot, start() + Duration::hours(i as i64 + 1));
        }
        assert_eq!(slots[118], run() + Duration::hours(71));
    }

    // --- With observation ---------------------------------------------------

    #[test]
    fn test_composed_series_has_119_points_on_slot_times() {
        let series = compose_with_observation(&[], &forecast(), run()).unwrap();
        assert_eq!(series.len(), 119);
        assert_eq!(series[0].hour, start());
        assert_eq!(series[1].hour, run() - Duration::hours(46));
        assert_eq!(series[118].hour, start() + Duration::hours(119));
    }

    #[test]
    fn test_no_observations_falls_back_to_forecast_by_index() {
        let forecast = forecast();
        let series = compose_with_observation(&[], &forecast, run()).unwrap();
        for (i, point) in series.iter().enumerate() {
            assert_eq!(point.value, forecast[i].value, "slot {} should use forecast[{}]", i, i);
        }
    }

    #[test]
    fn test_matching_observations_replace_forecast_values() {
        let observed = vec![
            HourBucket::new(start(), Decimal::new(555, 2)),
            HourBucket::new(start() + Duration::hours(2), Decimal::new(777, 2)),
            HourBucket::new(start() + Duration::hours(3), Decimal::new(888, 2)),
        ];
        let series = compose_with_observation(&observed, &forecast(), run()).unwrap();
        assert_eq!(series[0].value, Decimal::new(555, 2));
        assert_eq!(series[1].value, Decimal::new(777, 2));
        assert_eq!(series[2].value, Decimal::new(888, 2));
        assert_eq!(series[3].value, Decimal::from(3));
    }

    #[test]
    fn test_observation_that_falls_behind_is_never_resynced() {
        // run-47h has no slot, so this bucket blocks every later observation
        let observed = vec![
            HourBucket::new(start() + Duration::hours(1), Decimal::from(100)),
            HourBucket::new(start() + Duration::hours(2), Decimal::from(200)),
        ];
        let forecast = forecast();
        let series = compose_with_observation(&observed, &forecast, run()).unwrap();
        for (i, point) in series.iter().enumerate() {
            assert_eq!(point.value, forecast[i].value, "slot {} should use forecast[{}]", i, i);
        }
    }

    #[test]
    fn test_short_forecast_is_a_typed_error() {
        let short: Vec<HourBucket> = forecast().into_iter().take(80).collect();
        let result = compose_with_observation(&[], &short, run());
        match result {
            Err(PipelineError::SeriesTooShort { len, required, .. }) => {
                assert_eq!(len, 80);
                assert_eq!(required, 81);
            }
            other => panic!("expected SeriesTooShort, got {:?}", other),
        }
    }

    #[test]
    fn test_observations_cover_short_forecast_slots() {
        // Slots matched by an observation never index the forecast.
        let observed: Vec<HourBucket> = slot_times(run())
            .into_iter()
            .map(|t| HourBucket::new(t, Decimal::ONE))
            .collect();
        let series = compose_with_observation(&observed, &[], run()).unwrap();
        assert!(series.iter().all(|p| p.value == Decimal::ONE));
    }

    // --- Without observation ------------------------------------------------

    #[test]
    fn test_without_observation_returns_forecast_unchanged() {
        let forecast = forecast();
        assert_eq!(compose_without_observation(forecast.clone()), forecast);
    }

    // --- Store-backed composition -------------------------------------------

    fn hourly_readings(from: NaiveDateTime, hours: i64, tenths: i64) -> Vec<Reading> {
        (0..=hours)
            .map(|h| Reading::new(from + Duration::hours(h), Decimal::new(tenths, 1)))
            .collect()
    }

    #[test]
    fn test_compose_basin_without_observations_matches_forecast_values() {
        let upper = find_basin(UPPER_BASIN).unwrap();
        let lower = find_basin(LOWER_BASIN).unwrap();
        let mut store = MemoryStore::new();
        for basin in [upper, lower] {
            store.insert(basin.forecast_ids[0], hourly_readings(start(), 50, 12));
        }

        let kub = compose_basin(&mut store, upper, run()).unwrap();
        let klb = compose_basin(&mut store, lower, run()).unwrap();

        assert_eq!(kub.len(), 119);
        assert!(klb.len() >= 119);
        for i in 0..119 {
            assert_eq!(kub[i].value, klb[i].value, "slot {}", i);
        }
    }

    #[test]
    fn test_compose_basin_uses_observed_series_for_upper_basin() {
        let upper = find_basin(UPPER_BASIN).unwrap();
        let observed_id = upper.observed_id.unwrap();
        let mut store = MemoryStore::new()
            .with_series(upper.forecast_ids[0], hourly_readings(start(), 50, 0))
            .with_series(observed_id, hourly_readings(start(), 48, 25));

        let kub = compose_basin(&mut store, upper, run()).unwrap();

        // observed bucket at start() matches slot 0; the one at start()+1h has
        // no slot and stalls the cursor for the rest of the window
        assert_eq!(kub[0].value, Decimal::new(25, 1));
        assert_eq!(kub[1].value, Decimal::ZERO);
    }

    #[test]
    fn test_compose_basin_without_any_forecast_fails() {
        let lower = find_basin(LOWER_BASIN).unwrap();
        let mut store = MemoryStore::new();
        let result = compose_basin(&mut store, lower, run());
        assert!(matches!(result, Err(PipelineError::NoForecastData { .. })));
    }

    #[test]
    fn test_stitched_forecast_is_long_enough_for_composition() {
        let day0 = vec![HourBucket::new(start(), Decimal::ONE)];
        let forecast = stitch_horizons(run(), vec![day0]).unwrap();
        assert!(forecast.len() >= 119);
        assert!(compose_with_observation(&[], &forecast, run()).is_ok());
    }
}
