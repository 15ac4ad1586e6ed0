/// Timeseries reconstruction for the rainfall pipeline.
///
/// Turns raw observed and forecast readings into the fixed 119-point hourly
/// series written to the rain CSV.
///
/// Submodules:
/// - `hourly` — collapses raw readings into hourly sums.
/// - `forecast` — stitches and zero-pads the day0/day1/day2 horizons.
/// - `compose` — merges observations over the stitched forecast per basin.

pub mod compose;
pub mod forecast;
pub mod hourly;
