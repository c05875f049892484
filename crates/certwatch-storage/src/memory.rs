use certwatch_common::Observation;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{Result, StorageError};
use crate::ObservationStore;

/// In-process [`ObservationStore`] backed by a `HashMap`.
///
/// Can be switched into an unavailable state to exercise the error paths of
/// callers.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, Observation>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with [`StorageError::Unavailable`]
    /// until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, HashMap<String, Observation>> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObservationStore for MemoryStore {
    fn upsert(&self, observation: &Observation) -> Result<()> {
        self.check_available()?;
        self.rows()
            .insert(observation.domain.clone(), observation.clone());
        Ok(())
    }

    fn get(&self, domain: &str) -> Result<Option<Observation>> {
        self.check_available()?;
        Ok(self.rows().get(domain).cloned())
    }

    fn list_by_urgency(&self) -> Result<Vec<Observation>> {
        self.check_available()?;
        let mut all: Vec<Observation> = self.rows().values().cloned().collect();
        all.sort_by(|a, b| {
            a.days_left
                .cmp(&b.days_left)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        Ok(all)
    }

    fn count(&self) -> Result<u64> {
        self.check_available()?;
        Ok(self.rows().len() as u64)
    }
}
