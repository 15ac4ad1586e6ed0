/// Reading sources for the rainfall pipeline.
///
/// Submodules:
/// - `store` — the `ReadingStore` seam and an in-memory implementation.
/// - `pg` — the production store backed by the `data` table.

pub mod pg;
pub mod store;

pub use pg::PgReadingStore;
pub use store::{MemoryStore, ReadingStore};
