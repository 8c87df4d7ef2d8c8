//! callhomed daemon
//!
//! Reads the call-home configuration, brings up one connection worker per
//! application, and keeps the running set reconciled against the
//! configuration: SIGHUP reloads, SIGINT/SIGTERM shuts down.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callhome_core::config::{self, ConfigDocument, FileConfigSource};
use callhomed::controller::Controller;
use callhomed::persist::StateStore;
use callhomed::reconcile::TaskSpawner;
use callhomed::session::SubprocessSessionHandler;
use callhomed::worker::WorkerContext;

#[derive(Parser)]
#[command(name = "callhomed")]
#[command(about = "NETCONF call-home connection daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for persisted per-application state (overrides config)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("callhomed starting...");

    // Daemon settings come from the initial document and are fixed for the
    // process lifetime; only the application set is re-fetched on reload.
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let doc: ConfigDocument = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let mut settings = doc.daemon;
    if let Some(state_dir) = args.state_dir {
        settings.state_dir = state_dir;
    }

    // The state store must come up before any worker can
    let store = StateStore::open(&settings.state_dir)
        .with_context(|| format!("Failed to open state store at {:?}", settings.state_dir))?;
    tracing::info!(dir = %store.dir().display(), "state store ready");

    let handler = SubprocessSessionHandler::new(
        &settings.sshd_path,
        &settings.netconf_subsystem,
        &settings.state_dir,
    );
    let ctx = Arc::new(WorkerContext {
        store: Arc::new(store),
        handler: Arc::new(handler),
        connect_timeout: settings.connect_timeout,
    });

    let source = Arc::new(FileConfigSource::new(config_path));
    let spawner = Arc::new(TaskSpawner::new(ctx));

    // Shutdown on Ctrl+C / SIGTERM
    let shutdown = CancellationToken::new();
    let cancel_clone = shutdown.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    // Reload on SIGHUP; bursts coalesce in the capacity-1 channel
    let (reload_tx, reload_rx) = mpsc::channel(1);
    #[cfg(unix)]
    tokio::spawn(async move {
        let mut hangup =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::error!("Failed to install SIGHUP handler: {}", e);
                    return;
                }
            };
        while hangup.recv().await.is_some() {
            tracing::info!("Received SIGHUP, scheduling reload");
            let _ = reload_tx.try_send(());
        }
    });
    #[cfg(not(unix))]
    drop(reload_tx);

    Controller::new(source, spawner, settings.reload_backoff)
        .run(reload_rx, shutdown)
        .await
        .context("Daemon failed")?;

    tracing::info!("callhomed shutdown complete");
    Ok(())
}
