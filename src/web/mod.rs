//! `kd web`: HTTP observer over the shared engine
//!
//! A background poller folds the log on the blocking pool every interval,
//! reconciles against the on-disk state store and publishes the result into
//! [`state::SharedState`]. Handlers only ever read that state.

mod routes;
pub mod state;

use crate::engine::{Engine, JsonFileStore, Reconciler, TickGuard};
use crate::errors::{KdError, Result};
use axum::routing::get;
use axum::Router;
use state::SharedState;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Everything `kd web` needs after flags and config are merged
#[derive(Debug, Clone)]
pub struct WebSettings {
    pub engine: Engine,
    pub state_file: PathBuf,
    pub port: u16,
    pub port_retries: u16,
    pub interval_ms: u64,
    pub notification_buffer: usize,
    pub open: bool,
}

/// Build the axum Router over shared observer state.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/api/state", get(routes::get_state))
        .route("/api/health", get(routes::health))
        .route("/api/notifications", get(routes::notifications))
        .with_state(state)
}

/// Bind `port`, moving up one port at a time while the address is taken
pub async fn bind(port: u16, retries: u16) -> Result<TcpListener> {
    let last = port.saturating_add(retries);
    for candidate in port..=last {
        match TcpListener::bind(("0.0.0.0", candidate)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port = candidate, "Port in use, trying next");
            }
            Err(source) => {
                return Err(KdError::Bind {
                    port: candidate,
                    source,
                })
            }
        }
    }
    Err(KdError::PortExhausted {
        first: port,
        last,
        attempts: (last - port).saturating_add(1),
    })
}

/// Snapshot job state owned by the poller
struct Poller {
    engine: Engine,
    reconciler: Arc<Mutex<Reconciler<JsonFileStore>>>,
    guard: TickGuard,
    shared: SharedState,
}

impl Poller {
    /// Run one tick unless the previous one is still in flight
    async fn tick(&self) {
        let Some(permit) = self.guard.try_begin() else {
            tracing::debug!("Previous snapshot still running, skipping tick");
            return;
        };

        let engine = self.engine.clone();
        let reconciler = Arc::clone(&self.reconciler);
        let job = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let snapshot = engine.snapshot()?;
            let notifications = match reconciler.lock() {
                Ok(mut reconciler) => reconciler.reconcile(&snapshot),
                Err(poisoned) => poisoned.into_inner().reconcile(&snapshot),
            };
            Ok::<_, KdError>((snapshot, notifications))
        });

        let outcome = job.await;
        let mut shared = self.shared.write().await;
        match outcome {
            Ok(Ok((snapshot, notifications))) => shared.apply(snapshot, notifications),
            Ok(Err(e)) => shared.fail(e.to_string()),
            Err(e) => shared.fail(format!("snapshot task failed: {e}")),
        }
    }

    async fn run(self, interval_ms: u64, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => self.tick().await,
            }
        }
        tracing::debug!("Poller stopped");
    }
}

/// Serve until Ctrl-C
pub async fn serve(settings: WebSettings) -> Result<()> {
    let shared = state::shared(settings.notification_buffer);
    let store = JsonFileStore::new(&settings.state_file);
    tracing::debug!(path = %store.path().display(), "Observer state store");
    let reconciler = Reconciler::new(store);
    tracing::info!(
        known = reconciler.state().known.len(),
        next_id = reconciler.state().next_id,
        "Restored observer state"
    );
    let poller = Poller {
        engine: settings.engine.clone(),
        reconciler: Arc::new(Mutex::new(reconciler)),
        guard: TickGuard::new(),
        shared: Arc::clone(&shared),
    };
    // First snapshot before the port opens so /api/state never serves a blank
    poller.tick().await;

    let listener = bind(settings.port, settings.port_retries).await?;
    let port = listener
        .local_addr()
        .map_err(|source| KdError::Bind {
            port: settings.port,
            source,
        })?
        .port();
    let url = format!("http://localhost:{port}");
    let options = settings.engine.options();
    tracing::info!(
        port,
        events = %settings.engine.events_path().display(),
        max_history = options.max_history,
        max_events = options.max_events,
        "Web observer listening"
    );
    println!("[KD] Web observer running at {url}");
    println!("[KD] Press Ctrl+C to stop.");

    if settings.open {
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "Failed to open browser");
        }
    }

    let cancel = CancellationToken::new();
    let poll_handle = tokio::spawn(poller.run(settings.interval_ms, cancel.clone()));

    axum::serve(listener, build_router(shared))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down web observer");
        })
        .await
        .map_err(KdError::Serve)?;

    cancel.cancel();
    let _ = poll_handle.await;
    Ok(())
}
