/// Hourly aggregation of raw readings.
///
/// Raw series arrive at whatever cadence the gauge or model cell reports
/// (5-minute, 15-minute, hourly). Everything downstream works on one value
/// per clock hour, obtained by summing all readings that share an hour.

use crate::model::{HourBucket, Reading, truncate_to_hour};

/// Collapses time-ordered readings into hourly sums.
///
/// A bucket is emitted only when the next reading falls into a different
/// hour, so the bucket still accumulating at the end of the input is never
/// emitted. A single reading, or readings all within one hour, therefore
/// produce no buckets.
pub fn aggregate_hourly(readings: &[Reading]) -> Vec<HourBucket> {
    let Some((first, rest)) = readings.split_first() else {
        return Vec::new();
    };

    let mut buckets = Vec::new();
    let mut current = HourBucket::new(truncate_to_hour(first.time), first.value);

    for reading in rest {
        let hour = truncate_to_hour(reading.time);
        if hour == current.hour {
            // Missing and negative sentinels are summed as-is.
            current.value += reading.value;
        } else {
            let finished = std::mem::replace(&mut current, HourBucket::new(hour, reading.value));
            buckets.push(finished);
        }
    }

    buckets
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
