use certwatch_common::Observation;
use certwatch_storage::ObservationStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::prober::{ExpiryProber, ProbeError};

/// Why one host produced no store update during a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("store write failed: {0}")]
    Store(String),

    #[error("probe task aborted: {0}")]
    Aborted(String),
}

impl ReconcileError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Probe(e) => e.kind(),
            ReconcileError::Store(_) => "StorageError",
            ReconcileError::Aborted(_) => "TaskAborted",
        }
    }
}

/// A per-host diagnostic. The host's stored observation, if any, was left
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    pub host: String,
    pub error: ReconcileError,
}

/// Outcome of one reconciliation run. Both lists follow the input host order.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub checked: usize,
    pub updated: Vec<Observation>,
    pub failures: Vec<HostFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Probes every configured host and upserts the successes.
///
/// Each host is an independent unit: a failed probe or store write for one
/// host is recorded in the report and never stops the others.
pub struct Reconciler {
    prober: Arc<dyn ExpiryProber>,
    store: Arc<dyn ObservationStore>,
    timeout: Duration,
    max_concurrent: usize,
}

impl Reconciler {
    pub fn new(
        prober: Arc<dyn ExpiryProber>,
        store: Arc<dyn ObservationStore>,
        timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            prober,
            store,
            timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObservationStore> {
        &self.store
    }

    pub async fn reconcile(&self, hosts: &[String], now: DateTime<Utc>) -> ReconcileReport {
        tracing::info!(
            count = hosts.len(),
            max_concurrent = self.max_concurrent,
            "Reconciling certificate observations"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(hosts.len());

        for host in hosts {
            let semaphore = semaphore.clone();
            let prober = self.prober.clone();
            let store = self.store.clone();
            let timeout = self.timeout;
            let task_host = host.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                reconcile_host(prober.as_ref(), store.as_ref(), task_host, timeout, now).await
            });
            handles.push((host.clone(), handle));
        }

        let mut report = ReconcileReport {
            checked: hosts.len(),
            ..ReconcileReport::default()
        };

        for (host, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(domain = %host, error = %e, "Certificate probe task panicked");
                    Err(ReconcileError::Aborted(e.to_string()))
                }
            };
            match outcome {
                Ok(observation) => report.updated.push(observation),
                Err(error) => report.failures.push(HostFailure { host, error }),
            }
        }

        tracing::info!(
            checked = report.checked,
            updated = report.updated.len(),
            failed = report.failures.len(),
            "Reconciliation finished"
        );
        report
    }
}

async fn reconcile_host(
    prober: &dyn ExpiryProber,
    store: &dyn ObservationStore,
    host: String,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<Observation, ReconcileError> {
    let not_after = match prober.probe(&host, timeout).await {
        Ok(not_after) => not_after,
        Err(e) => {
            tracing::warn!(domain = %host, kind = e.kind(), error = %e, "Certificate probe failed");
            return Err(e.into());
        }
    };

    let observation = Observation::from_expiry(host, not_after, now);
    if let Err(e) = store.upsert(&observation) {
        tracing::error!(domain = %observation.domain, error = %e, "Failed to store observation");
        return Err(ReconcileError::Store(e.to_string()));
    }

    tracing::info!(
        domain = %observation.domain,
        days_left = observation.days_left,
        expiry_date = %observation.expiry_date,
        "Certificate checked"
    );
    Ok(observation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use certwatch_common::Urgency;
    use certwatch_storage::MemoryStore;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProber {
        answers: Mutex<HashMap<String, Result<DateTime<Utc>, ProbeError>>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedProber {
        fn new(answers: Vec<(&str, Result<DateTime<Utc>, ProbeError>)>) -> Self {
            Self {
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .map(|(h, r)| (h.to_string(), r))
                        .collect(),
                ),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn set(&self, host: &str, answer: Result<DateTime<Utc>, ProbeError>) {
            self.answers.lock().unwrap().insert(host.to_string(), answer);
        }
    }

    #[async_trait]
    impl ExpiryProber for ScriptedProber {
        async fn probe(&self, hostname: &str, _timeout: Duration) -> Result<DateTime<Utc>, ProbeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .get(hostname)
                .cloned()
                .unwrap_or_else(|| Err(ProbeError::Connection(format!("unknown host {hostname}"))))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap()
    }

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn reconciler(prober: Arc<ScriptedProber>, store: Arc<MemoryStore>) -> Reconciler {
        Reconciler::new(prober, store, Duration::from_secs(5), 4)
    }

    #[tokio::test]
    async fn success_and_timeout_in_one_run() {
        let prober = Arc::new(ScriptedProber::new(vec![
            ("a.example", Ok(now() + ChronoDuration::days(8))),
            ("b.example", Err(ProbeError::Timeout(Duration::from_secs(5)))),
        ]));
        let store = Arc::new(MemoryStore::new());
        let report = reconciler(prober, store.clone())
            .reconcile(&hosts(&["a.example", "b.example"]), now())
            .await;

        assert_eq!(report.checked, 2);
        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].host, "b.example");
        assert_eq!(report.failures[0].error.kind(), "TimeoutError");

        let rows = store.list_by_urgency().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].domain, "a.example");
        assert_eq!(rows[0].days_left, 8);
        assert_eq!(rows[0].last_checked, now());
        assert_eq!(rows[0].urgency(), Urgency::Critical);
        assert!(store.get("b.example").unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_probe_keeps_previous_observation() {
        let prober = Arc::new(ScriptedProber::new(vec![
            ("a.example", Ok(now() + ChronoDuration::days(50))),
            ("b.example", Ok(now() + ChronoDuration::days(20))),
        ]));
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(prober.clone(), store.clone());
        let targets = hosts(&["a.example", "b.example"]);

        reconciler.reconcile(&targets, now()).await;
        let before = store.get("a.example").unwrap().unwrap();

        prober.set("a.example", Err(ProbeError::Handshake("UnknownIssuer".into())));
        prober.set("b.example", Ok(now() + ChronoDuration::days(90)));
        let later = now() + ChronoDuration::days(1);
        let report = reconciler.reconcile(&targets, later).await;

        assert_eq!(store.get("a.example").unwrap().unwrap(), before);
        let b = store.get("b.example").unwrap().unwrap();
        assert_eq!(b.days_left, 89);
        assert_eq!(b.last_checked, later);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].host, "a.example");
        assert_eq!(report.failures[0].error.kind(), "HandshakeError");
    }

    #[tokio::test]
    async fn same_inputs_give_identical_observation() {
        let prober = Arc::new(ScriptedProber::new(vec![(
            "a.example",
            Ok(now() + ChronoDuration::days(33)),
        )]));
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(prober, store.clone());
        let targets = hosts(&["a.example"]);

        reconciler.reconcile(&targets, now()).await;
        let first = store.get("a.example").unwrap().unwrap();
        reconciler.reconcile(&targets, now()).await;
        let second = store.get("a.example").unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn later_run_lowers_days_left() {
        let expiry = now() + ChronoDuration::days(40);
        let prober = Arc::new(ScriptedProber::new(vec![("a.example", Ok(expiry))]));
        let store = Arc::new(MemoryStore::new());
        let reconciler = reconciler(prober, store.clone());
        let targets = hosts(&["a.example"]);

        reconciler.reconcile(&targets, now()).await;
        let early = store.get("a.example").unwrap().unwrap().days_left;
        reconciler
            .reconcile(&targets, now() + ChronoDuration::days(12) + ChronoDuration::hours(3))
            .await;
        let late = store.get("a.example").unwrap().unwrap().days_left;

        assert_eq!(early, 40);
        assert_eq!(late, 27);
    }

    #[tokio::test]
    async fn store_failure_is_reported_per_host() {
        let prober = Arc::new(ScriptedProber::new(vec![
            ("a.example", Ok(now() + ChronoDuration::days(3))),
            ("b.example", Err(ProbeError::Connection("refused".into()))),
        ]));
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let report = reconciler(prober, store.clone())
            .reconcile(&hosts(&["a.example", "b.example"]), now())
            .await;

        assert!(report.updated.is_empty());
        let kinds: Vec<&str> = report.failures.iter().map(|f| f.error.kind()).collect();
        assert_eq!(kinds, vec!["StorageError", "ConnectionError"]);
    }

    #[tokio::test]
    async fn report_follows_input_order() {
        let prober = Arc::new(
            ScriptedProber::new(vec![
                ("c.example", Ok(now() + ChronoDuration::days(1))),
                ("a.example", Ok(now() + ChronoDuration::days(2))),
                ("b.example", Ok(now() + ChronoDuration::days(3))),
            ])
            .with_delay(Duration::from_millis(5)),
        );
        let store = Arc::new(MemoryStore::new());
        let report = reconciler(prober, store)
            .reconcile(&hosts(&["c.example", "a.example", "b.example"]), now())
            .await;

        let order: Vec<&str> = report.updated.iter().map(|o| o.domain.as_str()).collect();
        assert_eq!(order, vec!["c.example", "a.example", "b.example"]);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let names: Vec<String> = (0..12).map(|i| format!("h{i}.example")).collect();
        let prober = Arc::new(
            ScriptedProber::new(
                names
                    .iter()
                    .map(|n| (n.as_str(), Ok(now() + ChronoDuration::days(60))))
                    .collect(),
            )
            .with_delay(Duration::from_millis(20)),
        );
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(prober.clone(), store.clone(), Duration::from_secs(5), 3);

        let report = reconciler.reconcile(&names, now()).await;

        assert_eq!(report.updated.len(), 12);
        assert!(prober.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(store.count().unwrap(), 12);
    }

    #[tokio::test]
    async fn empty_host_list_is_a_no_op() {
        let prober = Arc::new(ScriptedProber::new(vec![]));
        let store = Arc::new(MemoryStore::new());
        let report = reconciler(prober, store.clone()).reconcile(&[], now()).await;
        assert_eq!(report.checked, 0);
        assert!(report.is_clean());
        assert_eq!(store.count().unwrap(), 0);
    }
}
