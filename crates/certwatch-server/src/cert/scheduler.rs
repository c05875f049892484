use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::reconciler::Reconciler;

/// Re-runs reconciliation over the static target list on a fixed interval.
pub struct RecheckScheduler {
    reconciler: Arc<Reconciler>,
    hosts: Arc<Vec<String>>,
    interval_secs: u64,
}

impl RecheckScheduler {
    pub fn new(reconciler: Arc<Reconciler>, hosts: Arc<Vec<String>>, interval_secs: u64) -> Self {
        Self {
            reconciler,
            hosts,
            interval_secs,
        }
    }

    /// Loops forever. The first tick fires one full interval after start,
    /// since startup already ran a pass.
    pub async fn run(&self) {
        if self.interval_secs == 0 {
            tracing::info!("Certificate re-check disabled (interval is 0)");
            return;
        }

        tracing::info!(
            interval_secs = self.interval_secs,
            hosts = self.hosts.len(),
            "Certificate re-check scheduler started"
        );

        let period = Duration::from_secs(self.interval_secs);
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;
        loop {
            tick.tick().await;
            let report = self.reconciler.reconcile(&self.hosts, Utc::now()).await;
            if !report.is_clean() {
                tracing::warn!(
                    failed = report.failures.len(),
                    "Certificate re-check finished with failures"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::prober::{ExpiryProber, ProbeError};
    use async_trait::async_trait;
    use certwatch_storage::{MemoryStore, ObservationStore};
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExpiryProber for CountingProber {
        async fn probe(&self, _hostname: &str, _timeout: Duration) -> Result<DateTime<Utc>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Utc::now() + chrono::Duration::days(45))
        }
    }

    fn scheduler(prober: Arc<CountingProber>, store: Arc<MemoryStore>, secs: u64) -> RecheckScheduler {
        let reconciler = Arc::new(Reconciler::new(prober, store, Duration::from_secs(1), 2));
        RecheckScheduler::new(reconciler, Arc::new(vec!["a.example".to_string()]), secs)
    }

    #[tokio::test(start_paused = true)]
    async fn reruns_every_interval() {
        let prober = Arc::new(CountingProber {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::new());
        let sched = scheduler(prober.clone(), store.clone(), 60);

        let handle = tokio::spawn(async move { sched.run().await });
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        handle.abort();

        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_interval_returns_immediately() {
        let prober = Arc::new(CountingProber {
            calls: AtomicUsize::new(0),
        });
        let sched = scheduler(prober.clone(), Arc::new(MemoryStore::new()), 0);
        sched.run().await;
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }
}
