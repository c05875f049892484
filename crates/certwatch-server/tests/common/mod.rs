#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use certwatch_common::Observation;
use certwatch_server::app;
use certwatch_server::cert::prober::{ExpiryProber, ProbeError};
use certwatch_server::cert::reconciler::Reconciler;
use certwatch_server::state::AppState;
use certwatch_storage::{MemoryStore, ObservationStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

/// Answers probes from a table: `Ok(days)` means the certificate expires that
/// many days (plus an hour of slack) after the moment of probing.
pub struct FakeProber {
    answers: Mutex<HashMap<String, std::result::Result<i64, ProbeError>>>,
}

impl FakeProber {
    pub fn new(answers: &[(&str, std::result::Result<i64, ProbeError>)]) -> Self {
        Self {
            answers: Mutex::new(
                answers
                    .iter()
                    .map(|(h, r)| (h.to_string(), r.clone()))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, host: &str, answer: std::result::Result<i64, ProbeError>) {
        self.answers
            .lock()
            .expect("fake prober lock")
            .insert(host.to_string(), answer);
    }
}

#[async_trait]
impl ExpiryProber for FakeProber {
    async fn probe(
        &self,
        hostname: &str,
        _timeout: Duration,
    ) -> std::result::Result<DateTime<Utc>, ProbeError> {
        let answer = self
            .answers
            .lock()
            .expect("fake prober lock")
            .get(hostname)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::Connection(format!("no route to {hostname}"))));
        answer.map(|days| Utc::now() + ChronoDuration::days(days) + ChronoDuration::hours(1))
    }
}

pub struct TestContext {
    pub store: Arc<dyn ObservationStore>,
    pub prober: Arc<FakeProber>,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context(
    hosts: &[&str],
    answers: &[(&str, std::result::Result<i64, ProbeError>)],
) -> TestContext {
    build_test_context_with_store(hosts, answers, Arc::new(MemoryStore::new()))
}

pub fn build_test_context_with_store(
    hosts: &[&str],
    answers: &[(&str, std::result::Result<i64, ProbeError>)],
    store: Arc<dyn ObservationStore>,
) -> TestContext {
    let prober = Arc::new(FakeProber::new(answers));
    let reconciler = Arc::new(Reconciler::new(
        prober.clone(),
        store.clone(),
        Duration::from_secs(5),
        4,
    ));
    let hosts = Arc::new(hosts.iter().map(|h| h.to_string()).collect::<Vec<_>>());
    let state = AppState::new(reconciler, hosts);
    let app = app::build_http_app(state.clone());
    TestContext {
        store,
        prober,
        state,
        app,
    }
}

pub fn seeded(domain: &str, days_left: i64) -> Observation {
    let now = Utc::now();
    Observation::from_expiry(domain, now + ChronoDuration::days(days_left) + ChronoDuration::hours(1), now)
}

pub async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> Result<(StatusCode, axum::http::HeaderMap, String)> {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, headers, String::from_utf8(bytes.to_vec())?))
}

pub async fn request_json(app: &axum::Router, method: &str, uri: &str) -> Result<(StatusCode, Value)> {
    let (status, _, body) = request(app, method, uri).await?;
    Ok((status, serde_json::from_str(&body)?))
}
