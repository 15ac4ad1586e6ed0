/// The seam between the reconstruction core and wherever readings live.
///
/// The core only ever asks one question: "give me the readings for this
/// series between these two timestamps". Production answers it from
/// PostgreSQL; tests and replays answer it from memory.

use std::collections::HashMap;

use crate::model::{HorizonWindow, PipelineError, Reading};

/// Time-ordered readings for a named series within an inclusive window.
pub trait ReadingStore {
    fn fetch_readings(
        &mut self,
        series_id: &str,
        window: &HorizonWindow,
    ) -> Result<Vec<Reading>, PipelineError>;
}

/// Readings held in memory, keyed by series identifier.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    series: HashMap<String, Vec<Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds readings to a series, keeping the series sorted by time.
    pub fn insert(&mut self, series_id: &str, readings: impl IntoIterator<Item = Reading>) {
        let entry = self.series.entry(series_id.to_string()).or_default();
        entry.extend(readings);
        entry.sort_by_key(|r| r.time);
    }

    /// Builder-style variant of `insert`.
    pub fn with_series(mut self, series_id: &str, readings: impl IntoIterator<Item = Reading>) -> Self {
        self.insert(series_id, readings);
        self
    }
}

impl ReadingStore for MemoryStore {
    fn fetch_readings(
        &mut self,
        series_id: &str,
        window: &HorizonWindow,
    ) -> Result<Vec<Reading>, PipelineError> {
        Ok(self
            .series
            .get(series_id)
            .map(|readings| {
                readings
                    .iter()
                    .filter(|r| window.contains(r.time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
