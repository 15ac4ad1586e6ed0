/// Kelani basin rainfall pipeline.
///
/// Reconstructs hourly rainfall series for the Kelani upper and lower basins
/// from observed and forecast readings, writes them as a Delft-FEWS CSV,
/// keeps the HEC-HMS control file in step, and fetches WRF model output.

pub mod analysis;
pub mod basins;
pub mod cli;
pub mod config;
pub mod control;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod wrf_trigger;
