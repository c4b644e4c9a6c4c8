// Clippy configuration: enable pedantic but allow overly strict lints
#![allow(clippy::missing_errors_doc)] // Internal functions don't need # Errors docs
#![allow(clippy::missing_panics_doc)] // Internal functions don't need # Panics docs
#![allow(clippy::must_use_candidate)] // Not all getters need #[must_use]
#![allow(clippy::doc_markdown)] // Don't require backticks around JSON, TOML, etc.
#![allow(clippy::too_many_lines)] // Some functions are naturally long
#![allow(clippy::struct_excessive_bools)] // Config structs can have multiple bool fields
#![allow(clippy::cast_possible_truncation)] // We're careful with our casts
#![allow(clippy::cast_sign_loss)] // Timestamp conversions are safe
#![allow(clippy::redundant_closure_for_method_calls)] // Sometimes closures are clearer
#![allow(clippy::if_not_else)] // Negative conditions can be clearer for early returns
#![allow(clippy::match_same_arms)] // Explicit arms are clearer than combined patterns
#![allow(clippy::single_match_else)] // match with else is fine for Result handling
#![allow(clippy::manual_let_else)] // if-let is clearer for multi-line error handling
#![allow(clippy::items_after_statements)] // Helper closures can be defined inline
#![allow(clippy::option_if_let_else)] // if-let is more readable for Option handling
#![allow(clippy::unnecessary_wraps)] // Some functions return Result for consistency
#![allow(clippy::needless_pass_by_value)] // PathBuf by value is fine for config loading
#![allow(clippy::trivially_copy_pass_by_ref)] // &self on Copy types follows Rust conventions

//! kd - observer dashboards for KD multi-persona agent workflows
//!
//! Every command reads the same append-only event log
//! (`.kracked/runtime/events.jsonl`) through one shared engine:
//! - `kd observe`: live terminal dashboard
//! - `kd web`: HTTP dashboard with a JSON API and lifecycle feed
//! - `kd snapshot`: one fold of the log, printed once
//! - `kd emit`: append one event from scripts and hooks
//!
//! Usage:
//!   kd observe --interval 500
//!   kd web --port 4892 --open

mod app;
mod cli;
mod config;
mod engine;
mod errors;
mod event;
mod notify;
mod tui;
mod ui;
mod web;

use app::{App, ObserveSettings};
use clap::Parser;
use cli::{to_usize, Cli, Commands, EmitArgs, ObserveArgs, WebArgs};
use color_eyre::Result;
use config::{KdConfig, ProjectPaths};
use engine::{Engine, EngineOptions, Snapshot, TickGuard};
use event::{store, Event, EventRecord, PollOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Get the log directory path
fn get_log_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("/tmp/kd-observer/logs"),
        |dirs| dirs.cache_dir().join("kd-observer").join("logs"),
    )
}

/// Install the tracing subscriber
///
/// The terminal observer owns the screen, so it logs to a daily file;
/// everything else logs to stderr. `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str, to_file: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kd_observer={level}")));

    if to_file {
        let log_dir = get_log_dir();
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&log_dir, "kd-observer.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
        tracing::info!("Log directory: {:?}", log_dir);
        return Ok(Some(guard));
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
    Ok(None)
}

/// Engine for the project's log, roster and inference tables
fn build_engine(paths: &ProjectPaths, config: &KdConfig, options: EngineOptions) -> Engine {
    Engine::new(paths.events(), options)
        .with_roster_path(paths.roster())
        .with_tables(config.inference.tables())
}

/// Create the log up front so a fresh project reads as empty, not missing
fn touch_events(paths: &ProjectPaths) {
    if let Err(e) = store::ensure_exists(paths.events()) {
        tracing::warn!(error = %e, "Could not create event log");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        cli::print_completions(shell);
        return Ok(());
    }

    // Initialize error handling
    color_eyre::install()?;

    let _log_guard = init_logging(&cli.log_level, matches!(cli.command, Commands::Observe(_)))?;

    let root = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let paths = ProjectPaths::new(root).with_events(cli.events);
    let config = KdConfig::load(&paths);
    tracing::debug!(
        root = %paths.root().display(),
        events = %paths.events().display(),
        "Resolved project paths"
    );

    match cli.command {
        Commands::Observe(args) => run_observe(&paths, &config, args).await,
        Commands::Web(args) => run_web(&paths, &config, args).await,
        Commands::Snapshot {
            json,
            max_history,
            max_events,
        } => {
            let options = config
                .observer
                .engine_options()
                .with_overrides(max_history.map(to_usize), max_events.map(to_usize));
            let snapshot = build_engine(&paths, &config, options).snapshot()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_table(&snapshot);
            }
            Ok(())
        }
        Commands::Emit(args) => emit(&paths, args),
        Commands::Completions { .. } => Ok(()),
    }
}

/// Merge `kd observe` flags over `[observer]` and run the dashboard
async fn run_observe(paths: &ProjectPaths, config: &KdConfig, args: ObserveArgs) -> Result<()> {
    let file = &config.observer;
    let options = file
        .engine_options()
        .with_overrides(args.max_history.map(to_usize), args.max_events.map(to_usize));
    let settings = ObserveSettings {
        events_path: paths.events().to_path_buf(),
        interval_ms: args.interval.unwrap_or(file.interval_ms).max(1),
        max_events: options.max_events,
        max_history: options.max_history,
        notify: args.notify || file.notify,
    };
    let engine = build_engine(paths, config, options);
    touch_events(paths);

    tracing::info!(
        "Starting kd observe v{}: {}ms refresh",
        env!("CARGO_PKG_VERSION"),
        settings.interval_ms
    );
    run_tui(engine, settings).await
}

/// Spawn one snapshot job unless the previous one is still running
fn spawn_poll(engine: &Engine, guard: &TickGuard, tx: &mpsc::Sender<Event>) {
    let Some(permit) = guard.try_begin() else {
        tracing::debug!("Previous snapshot still running, skipping tick");
        return;
    };

    let engine = engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let _permit = permit;
        let outcome = match tokio::task::spawn_blocking(move || engine.snapshot()).await {
            Ok(Ok(snapshot)) => PollOutcome::Ok(snapshot),
            Ok(Err(e)) => PollOutcome::Failed(e.to_string()),
            Err(e) => PollOutcome::Failed(format!("snapshot task failed: {e}")),
        };
        // Receiver gone means the app is shutting down
        let _ = tx.send(Event::Snapshot(Box::new(outcome))).await;
    });
}

/// Run the TUI event loop
async fn run_tui(engine: Engine, settings: ObserveSettings) -> Result<()> {
    let interval_ms = settings.interval_ms;

    // Create event channel
    let (event_tx, mut event_rx) = mpsc::channel(100);

    // Initialize terminal (raw mode, alternate screen)
    let mut terminal = tui::init()?;

    // RAII guard ensures terminal is restored on panic or early return
    let _guard = tui::TerminalGuard;

    let mut app = App::new(settings);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn input event handler with cancellation support
    let input_tx = event_tx.clone();
    let input_cancel = cancel.clone();
    let input_handle = tokio::spawn(async move {
        event::input::listen(input_tx, input_cancel).await;
    });

    let tick_guard = TickGuard::new();
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Main loop
    loop {
        // Only redraw when something changed
        if app.needs_render {
            terminal.draw(|f| ui::render(f, &app))?;
            app.rendered();
        }

        tokio::select! {
            Some(event) = event_rx.recv() => {
                app.handle_event(event);
            }
            _ = interval.tick() => {
                spawn_poll(&engine, &tick_guard, &event_tx);
            }
        }

        if app.take_refresh_request() {
            spawn_poll(&engine, &tick_guard, &event_tx);
        }

        if app.should_quit {
            break;
        }
    }

    // Graceful shutdown: signal input listener to stop
    tracing::debug!("Shutting down input listener");
    cancel.cancel();
    input_handle.abort();

    // Restore terminal (guard will also restore on drop, but explicit is cleaner)
    tui::restore()?;
    terminal.show_cursor()?;

    Ok(())
}

/// Merge `kd web` flags over `[web]` and serve
async fn run_web(paths: &ProjectPaths, config: &KdConfig, args: WebArgs) -> Result<()> {
    let file = &config.web;
    let options = file
        .engine_options()
        .with_overrides(args.max_history.map(to_usize), args.max_events.map(to_usize));
    touch_events(paths);

    web::serve(web::WebSettings {
        engine: build_engine(paths, config, options),
        state_file: paths.state_file(),
        port: args.port.unwrap_or(file.port),
        port_retries: args.port_retries.unwrap_or(file.port_retries),
        interval_ms: args.interval.unwrap_or(file.interval_ms).max(1),
        notification_buffer: file.notification_buffer,
        open: args.open || file.open,
    })
    .await?;
    Ok(())
}

/// Plain-text rendering for `kd snapshot`
fn print_table(snapshot: &Snapshot) {
    println!(
        "{:<24} {:<20} {:<12} {:<8} {:>6}  LAST",
        "AGENT", "ROLE", "ACTION", "STATUS", "TOTAL"
    );
    println!("{}", "-".repeat(90));
    for agent in &snapshot.agents {
        let name = if agent.inferred {
            format!("{} *", agent.agent_name)
        } else {
            agent.agent_name.clone()
        };
        println!(
            "{:<24} {:<20} {:<12} {:<8} {:>6}  {}",
            name,
            agent.role,
            agent.last_action.as_deref().unwrap_or("-"),
            agent.status.label(),
            agent.total,
            agent.last_ts.as_deref().unwrap_or("-"),
        );
    }
    println!();
    println!("events: {}  agents: {}", snapshot.total_events, snapshot.agents.len());
    for event in &snapshot.recent {
        println!(
            "{}  {:<20} {:<10} {}",
            event.ts.as_deref().unwrap_or("-"),
            event.agent_name(),
            event.action().unwrap_or("-"),
            event.message().unwrap_or("-"),
        );
    }
}

/// Append one event for `kd emit`
fn emit(paths: &ProjectPaths, args: EmitArgs) -> Result<()> {
    let mut record = EventRecord::now(
        &args.agent_id,
        &args.agent_name,
        &args.role,
        &args.action,
        &args.source,
    );
    record.target_agent_id = args.target_agent_id;
    record.task = args.task;
    record.message = args.message;

    store::append(paths.events(), &record)?;
    tracing::debug!(agent = %args.agent_id, action = %args.action, "Event appended");
    Ok(())
}
