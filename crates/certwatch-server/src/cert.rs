//! The certificate observation pipeline: probe each host, then reconcile the
//! results into the store.

pub mod prober;
pub mod reconciler;
pub mod scheduler;
