use crate::cert::reconciler::Reconciler;
use certwatch_storage::ObservationStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared handles for HTTP handlers. The store is read-only from here; writes
/// only go through the reconciler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObservationStore>,
    pub reconciler: Arc<Reconciler>,
    pub hosts: Arc<Vec<String>>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(reconciler: Arc<Reconciler>, hosts: Arc<Vec<String>>) -> Self {
        Self {
            store: reconciler.store().clone(),
            reconciler,
            hosts,
            start_time: Utc::now(),
        }
    }
}
