//! Connection worker
//!
//! One worker task per active application, running independently of all
//! others. The worker walks the reconnect state machine: pick a starting
//! server per the policy, dial with retry/failover until something accepts,
//! record the success in the state store, hand the socket to the session
//! handler, and re-enter server selection when the session ends. It runs
//! until cancelled by the reconciler; every blocking point is raced against
//! the cancellation token so termination is prompt.

mod failover;

pub use failover::{FailoverSchedule, FailoverStep};

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use callhome_core::types::{Application, ServerEndpoint, StartWith};

use crate::persist::StateStore;
use crate::session::SessionHandler;

/// Dependencies shared by every worker
pub struct WorkerContext {
    /// Last-connected record store
    pub store: Arc<StateStore>,
    /// Session handler receiving established connections
    pub handler: Arc<dyn SessionHandler>,
    /// Timeout applied to each TCP connect attempt
    pub connect_timeout: Duration,
}

/// Run the worker for one application until cancelled
pub async fn run(app: Application, ctx: Arc<WorkerContext>, cancel: CancellationToken) {
    tracing::info!(app = %app.name, servers = app.servers.len(), "worker started");

    loop {
        let start_idx = select_start_index(&app, &ctx.store);
        let mut schedule = FailoverSchedule::new(
            start_idx,
            app.servers.len(),
            app.reconnect.max_retries,
        );

        // dial until a server accepts, then run one session to completion
        loop {
            let server = &app.servers[schedule.current()];
            tracing::debug!(app = %app.name, server = %server, "dialing");

            let connected = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(app = %app.name, "worker cancelled");
                    return;
                }
                result = dial(server, ctx.connect_timeout) => result,
            };

            match connected {
                Ok(stream) => {
                    tracing::info!(app = %app.name, server = %server, "connected");

                    // best-effort: a persistence failure never blocks the handoff
                    if let Err(e) = ctx.store.put(&app.name, server) {
                        tracing::warn!(
                            app = %app.name,
                            server = %server,
                            error = %e,
                            "failed to persist last-connected server"
                        );
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!(app = %app.name, "worker cancelled during session");
                            return;
                        }
                        result = ctx.handler.run_session(&app, stream) => match result {
                            Ok(()) => {
                                tracing::info!(app = %app.name, server = %server, "session ended")
                            }
                            Err(e) => {
                                tracing::warn!(
                                    app = %app.name,
                                    server = %server,
                                    error = %e,
                                    "session failed"
                                )
                            }
                        }
                    }

                    // session over, re-evaluate the start preference
                    break;
                }
                Err(e) => {
                    tracing::debug!(app = %app.name, server = %server, error = %e, "connect failed");

                    match schedule.on_failure() {
                        FailoverStep::Retry => {
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    tracing::info!(app = %app.name, "worker cancelled");
                                    return;
                                }
                                _ = tokio::time::sleep(app.reconnect.interval) => {}
                            }
                        }
                        FailoverStep::Advance => {
                            tracing::info!(
                                app = %app.name,
                                server = %server,
                                next = %app.servers[schedule.current()],
                                "server exhausted, failing over"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Pick the server index to start dialing from.
///
/// `last-connected` consults the state store; a missing record, a recorded
/// server no longer in the list, or a store read failure all fall back to
/// the first listed server.
fn select_start_index(app: &Application, store: &StateStore) -> usize {
    match app.reconnect.start_with {
        StartWith::FirstListed => 0,
        StartWith::LastConnected => match store.get(&app.name) {
            Ok(Some(last)) => app
                .servers
                .iter()
                .position(|server| *server == last)
                .unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(app = %app.name, error = %e, "failed to read persisted state");
                0
            }
        },
    }
}

async fn dial(server: &ServerEndpoint, timeout: Duration) -> io::Result<TcpStream> {
    match tokio::time::timeout(
        timeout,
        TcpStream::connect((server.address.as_str(), server.port)),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out", server),
        )),
    }
}
