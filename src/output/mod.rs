/// Files produced by the rainfall pipeline.
///
/// Submodules:
/// - `rain_csv` — the Delft-FEWS rain CSV consumed by HEC-HMS.

pub mod rain_csv;
