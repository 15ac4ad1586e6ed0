/// PostgreSQL-backed reading store.
///
/// Rainfall series live in a single `data` table keyed by the series hash:
///
/// ```sql
/// CREATE TABLE data (
///     id    VARCHAR(64) NOT NULL,
///     time  TIMESTAMP   NOT NULL,
///     value NUMERIC(11, 3),
///     PRIMARY KEY (id, time)
/// );
/// ```
///
/// Times are local wall-clock times stored without a zone, so they map to
/// `chrono::NaiveDateTime` directly.

use chrono::NaiveDateTime;
use postgres::{Client, NoTls};
use rust_decimal::Decimal;

use crate::ingest::store::ReadingStore;
use crate::logging::{self, Source};
use crate::model::{HorizonWindow, PipelineError, Reading, TIMESTAMP_FORMAT};

pub struct PgReadingStore {
    client: Client,
}

impl PgReadingStore {
    /// Opens one connection for the lifetime of the run.
    ///
    /// # Arguments
    /// * `connection` - libpq-style key/value string or `postgres://` URL
    pub fn connect(connection: &str) -> Result<Self, PipelineError> {
        let client = Client::connect(connection, NoTls)?;
        Ok(Self { client })
    }

    /// Get the full time range stored for a series
    pub fn data_range(
        &mut self,
        series_id: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, PipelineError> {
        let row = self.client.query_one(
            "SELECT MIN(time), MAX(time)
             FROM data
             WHERE id = $1",
            &[&series_id],
        )?;

        let min: Option<NaiveDateTime> = row.get(0);
        let max: Option<NaiveDateTime> = row.get(1);

        match (min, max) {
            (Some(start), Some(end)) => Ok(Some((start, end))),
            _ => Ok(None),
        }
    }
}

impl ReadingStore for PgReadingStore {
    fn fetch_readings(
        &mut self,
        series_id: &str,
        window: &HorizonWindow,
    ) -> Result<Vec<Reading>, PipelineError> {
        let rows = self.client.query(
            "SELECT time, value
             FROM data
             WHERE id = $1
               AND time >= $2
               AND time <= $3
             ORDER BY time",
            &[&series_id, &window.start, &window.end],
        )?;

        let mut readings = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Option<Decimal> = row.get(1);
            readings.push(Reading {
                time: row.get(0),
                value: value.unwrap_or(Decimal::ZERO),
            });
        }

        if readings.is_empty() {
            // Say what the series does hold so a lagging model run is obvious
            let held = match self.data_range(series_id)? {
                Some((start, end)) => format!(
                    "series holds {} .. {}",
                    start.format(TIMESTAMP_FORMAT),
                    end.format(TIMESTAMP_FORMAT)
                ),
                None => "series holds no rows".to_string(),
            };
            logging::debug(
                Source::Database,
                Some(series_id),
                &format!("no readings in {}; {}", window, held),
            );
        }

        Ok(readings)
    }
}
