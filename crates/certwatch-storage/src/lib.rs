//! Durable per-host certificate observations.
//!
//! The default implementation ([`cert_store::CertStore`]) keeps one row per
//! monitored domain in a SQLite database opened in WAL mode.
//! [`memory::MemoryStore`] offers the same contract without touching disk and
//! is what most tests run against.

pub mod cert_store;
pub mod error;
pub mod memory;


use certwatch_common::Observation;

pub use cert_store::CertStore;
pub use error::{Result, StorageError};
pub use memory::MemoryStore;

/// Persistence backend for [`Observation`]s.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the reconciler writes from parallel probe tasks while the HTTP
/// handlers read.
pub trait ObservationStore: Send + Sync {
    /// Inserts the observation, or replaces every field of the existing row
    /// for the same domain. Must be atomic per row: readers see either the
    /// old observation or the new one, never a mix.
    fn upsert(&self, observation: &Observation) -> Result<()>;

    /// Returns the current observation for `domain`, if it was ever probed
    /// successfully.
    fn get(&self, domain: &str) -> Result<Option<Observation>>;

    /// Returns all observations, most urgent (lowest `days_left`) first. Ties
    /// are ordered by domain.
    fn list_by_urgency(&self) -> Result<Vec<Observation>>;

    /// Number of stored observations.
    fn count(&self) -> Result<u64>;
}
