//! curator-engine - local-first media-library kernel
//!
//! Watches an inbox for media files, fingerprints them, reconciles
//! metadata claims into canonical values, groups files into hubs,
//! organises them on disk and serves the catalogue over HTTP + SSE.
//!
//! The only mandatory input is the path to the configuration JSON,
//! given as the first argument or via `CURATOR_CONFIG`.

use anyhow::{Context, Result};
use curator_common::config;
use curator_common::events::EventBus;
use curator_engine::ingest::organiser::Organiser;
use curator_engine::ingest::{scan, EnrichmentRequest, IngestOrchestrator};
use curator_engine::processors::ProcessorRegistry;
use curator_engine::scoring::{ScoringConfig, ScoringEngine};
use curator_engine::store;
use curator_engine::watch::debounce::{DebounceConfig, DebounceQueue};
use curator_engine::watch::poller::PollWatcher;
use curator_engine::watch::TracingErrorSink;
use curator_engine::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Poll interval of the in-tree watcher
const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Listen address of the HTTP shell
const LISTEN_ADDR: &str = "127.0.0.1:5780";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting curator-engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path()?;
    info!("Configuration: {}", config_path.display());
    let config = Arc::new(config::load_config(&config_path)?);

    std::fs::create_dir_all(&config.watch_root)?;
    std::fs::create_dir_all(&config.data_root)?;

    // Store startup is fatal on integrity failure: the engine refuses to
    // accept traffic over a corrupt catalogue.
    let db = store::init_store(&config.database_path, config.maintenance.vacuum_on_startup)
        .await
        .context("catalogue startup failed")?;
    info!("Catalogue ready: {}", config.database_path.display());

    store::providers::sync_providers(&db, &config.providers).await?;

    let event_bus = EventBus::new(1000);
    let scoring = ScoringEngine::new(ScoringConfig::from(&config.scoring));
    let concurrency = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    // Format-specific processors register here; the engine ships with the
    // fallback alone.
    let registry = Arc::new(ProcessorRegistry::with_fallback_only(concurrency));

    // Enrichment is an external collaborator; headless builds just drain it.
    let (enrichment_tx, mut enrichment_rx) =
        tokio::sync::mpsc::channel::<EnrichmentRequest>(256);
    tokio::spawn(async move {
        while let Some(request) = enrichment_rx.recv().await {
            tracing::debug!(edition_id = %request.edition_id, "Enrichment requested");
        }
    });

    let orchestrator = Arc::new(IngestOrchestrator::new(
        db.clone(),
        scoring.clone(),
        registry,
        Organiser::new(&config.data_root),
        Arc::new(event_bus.clone()),
        Some(enrichment_tx),
        config.maintenance.max_transaction_log_entries,
    ));

    let cancel = CancellationToken::new();

    // Watcher → debounce queue → orchestrator
    let (queue, candidate_rx) = DebounceQueue::new(DebounceConfig::default());

    let watcher = PollWatcher::new(&config.watch_root, WATCH_POLL_INTERVAL);
    let watcher_handle = watcher.spawn(
        queue.clone(),
        Arc::new(TracingErrorSink),
        cancel.clone(),
    );

    let orchestrator_handle = tokio::spawn(Arc::clone(&orchestrator).run(
        candidate_rx,
        concurrency,
        cancel.clone(),
    ));

    // Pick up files that appeared while the process was down
    {
        let watch_root = config.watch_root.clone();
        let queue = queue.clone();
        let bus = event_bus.clone();
        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let root = watch_root.clone();
            let found =
                tokio::task::spawn_blocking(move || scan::differential_scan(&root, &queue))
                    .await
                    .unwrap_or(0);
            bus.emit_lossy(curator_common::events::CuratorEvent::ScanCompleted {
                root: watch_root.display().to_string(),
                candidates_found: found,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: chrono::Utc::now(),
            });
        });
    }

    // HTTP shell
    let state = AppState::new(db, event_bus, Arc::clone(&config), scoring);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    info!("Listening on http://{LISTEN_ADDR}");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
                _ = shutdown.cancelled() => {}
            }
        })
        .await?;

    cancel.cancel();
    if let Err(e) = watcher_handle.await {
        warn!(error = %e, "Watcher task join failed");
    }
    if let Err(e) = orchestrator_handle.await {
        warn!(error = %e, "Orchestrator task join failed");
    }

    info!("curator-engine stopped");
    Ok(())
}

/// Configuration path: first CLI argument, then `CURATOR_CONFIG`
fn resolve_config_path() -> Result<PathBuf> {
    if let Some(arg) = std::env::args().nth(1) {
        return Ok(PathBuf::from(arg));
    }

    if let Ok(path) = std::env::var("CURATOR_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    anyhow::bail!(
        "configuration path required: pass it as the first argument or set CURATOR_CONFIG"
    )
}
