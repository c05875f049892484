use anyhow::Result;
use certwatch_storage::{CertStore, ObservationStore};
use chrono::Utc;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use certwatch_server::app;
use certwatch_server::cert::prober::TlsProber;
use certwatch_server::cert::reconciler::{ReconcileReport, Reconciler};
use certwatch_server::cert::scheduler::RecheckScheduler;
use certwatch_server::config::ServerConfig;
use certwatch_server::logging;
use certwatch_server::state::AppState;
use certwatch_server::view::status_rows;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  certwatch [config.toml]          Run a reconciliation pass, then serve the status page");
    eprintln!("  certwatch check [config.toml]    Run one reconciliation pass, print the status table and exit");
    eprintln!();
    eprintln!("The config path defaults to $CERTWATCH_CONFIG, then config/certwatch.toml.");
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    logging::init_tracing()?;

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("check") => {
            let config_path = ServerConfig::resolve_path(args.get(2).map(String::as_str));
            run_check(&config_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        other => {
            let config_path = ServerConfig::resolve_path(other);
            run_server(&config_path).await
        }
    }
}

/// Opens the store and wires the prober into a reconciler.
fn build_reconciler(config: &ServerConfig) -> Result<Arc<Reconciler>> {
    let store: Arc<dyn ObservationStore> = Arc::new(CertStore::new(Path::new(&config.data_dir))?);
    let prober = Arc::new(
        TlsProber::new(config.probe.tls_port)
            .map_err(|e| anyhow::anyhow!("Failed to build TLS client config: {e}"))?,
    );
    Ok(Arc::new(Reconciler::new(
        prober,
        store,
        config.probe.timeout(),
        config.probe.max_concurrent,
    )))
}

/// One-shot pass for cron jobs and manual checks.
#[allow(clippy::print_stdout)]
async fn run_check(config_path: &str) -> Result<()> {
    let config = ServerConfig::load_or_default(config_path)?;
    let hosts = config.hosts();
    let reconciler = build_reconciler(&config)?;

    let report = reconciler.reconcile(&hosts, Utc::now()).await;

    let rows = status_rows(reconciler.store().list_by_urgency()?);
    println!(
        "{:<40} {:<12} {:>9}  {:<19}  {}",
        "DOMAIN", "EXPIRY", "DAYS LEFT", "LAST CHECKED", "URGENCY"
    );
    for row in &rows {
        let obs = &row.observation;
        println!(
            "{:<40} {:<12} {:>9}  {:<19}  {}",
            obs.domain,
            obs.expiry_date.format("%Y-%m-%d"),
            obs.days_left,
            obs.last_checked.format("%Y-%m-%d %H:%M:%S"),
            row.urgency
        );
    }
    print_failures(&report);

    if report.is_clean() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} of {} hosts could not be checked",
            report.failures.len(),
            report.checked
        ))
    }
}

#[allow(clippy::print_stdout)]
fn print_failures(report: &ReconcileReport) {
    if report.failures.is_empty() {
        return;
    }
    println!();
    println!("Failed hosts:");
    for failure in &report.failures {
        println!("  {} [{}] {}", failure.host, failure.error.kind(), failure.error);
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load_or_default(config_path)?;
    let hosts = Arc::new(config.hosts());

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        targets = hosts.len(),
        "certwatch starting"
    );

    let reconciler = build_reconciler(&config)?;

    // Startup pass. Per-host failures are already logged; they never block
    // serving.
    let report = reconciler.reconcile(&hosts, Utc::now()).await;
    if !report.is_clean() {
        tracing::warn!(
            failed = report.failures.len(),
            checked = report.checked,
            "Startup reconciliation finished with failures"
        );
    }

    let recheck_handle = if config.schedule.enabled {
        let scheduler = RecheckScheduler::new(
            reconciler.clone(),
            hosts.clone(),
            config.schedule.recheck_interval_secs,
        );
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("Certificate re-check scheduler disabled");
        None
    };

    let state = AppState::new(reconciler, hosts);

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let result = axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;

    // Upserts are single statements, so aborting mid-run leaves no partial row.
    if let Some(h) = recheck_handle {
        h.abort();
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server error");
    }
    tracing::info!("Server stopped");

    Ok(())
}
