//! Process-wide orchestration
//!
//! The controller owns the ActiveSet and serializes every reconcile on its
//! own task. Startup is strict: a fetch, validation, or reconcile failure
//! is fatal and surfaces as a non-zero exit. Reloads are forgiving: the
//! same failures are logged and the cycle retried after a fixed backoff,
//! leaving the running workers untouched until a good snapshot arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use callhome_core::config::{validate, ConfigSource};
use callhome_core::error::CallHomeError;

use crate::reconcile::{self, ActiveSet, ReconcileSummary, WorkerSpawner};

/// Orchestrates the daemon lifecycle: initial load, reloads, shutdown
pub struct Controller {
    source: Arc<dyn ConfigSource>,
    spawner: Arc<dyn WorkerSpawner>,
    active: ActiveSet,
    reload_backoff: Duration,
}

impl Controller {
    /// Create a controller with an empty active set
    pub fn new(
        source: Arc<dyn ConfigSource>,
        spawner: Arc<dyn WorkerSpawner>,
        reload_backoff: Duration,
    ) -> Self {
        Self {
            source,
            spawner,
            active: ActiveSet::new(),
            reload_backoff,
        }
    }

    /// Run until shutdown is requested.
    ///
    /// `reload` delivers edge-triggered reload requests (SIGHUP); `shutdown`
    /// is the process-wide cancellation token (SIGINT/SIGTERM). The initial
    /// configuration load happens before the wait loop and its failure is
    /// returned to the caller.
    pub async fn run(
        mut self,
        mut reload: mpsc::Receiver<()>,
        shutdown: CancellationToken,
    ) -> Result<(), CallHomeError> {
        let summary = self.apply_config().await?;
        tracing::info!(started = summary.started, "initial configuration applied");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = reload.recv() => match received {
                    Some(()) => self.reload(&mut reload, &shutdown).await,
                    None => {
                        // trigger source gone; only shutdown can happen now
                        tracing::warn!("reload trigger closed, reloads disabled");
                        shutdown.cancelled().await;
                        break;
                    }
                },
            }
        }

        tracing::info!(workers = self.active.len(), "shutting down");
        self.active.terminate_all();
        Ok(())
    }

    /// One fetch → validate → reconcile pass
    async fn apply_config(&mut self) -> Result<ReconcileSummary, CallHomeError> {
        let incoming = self.source.fetch().await?;
        validate(&incoming)?;
        let summary = reconcile::reconcile(&mut self.active, incoming, self.spawner.as_ref())?;
        Ok(summary)
    }

    /// Reload until one cycle succeeds or shutdown is requested.
    ///
    /// Triggers that arrive while a cycle is in flight collapse into the
    /// next fetch rather than queueing a cycle each.
    async fn reload(&mut self, reload: &mut mpsc::Receiver<()>, shutdown: &CancellationToken) {
        loop {
            while reload.try_recv().is_ok() {}

            match self.apply_config().await {
                Ok(summary) => {
                    tracing::info!(
                        started = summary.started,
                        stopped = summary.stopped,
                        kept = summary.kept,
                        "reload complete"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        backoff_secs = self.reload_backoff.as_secs(),
                        "reload failed, will retry"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(self.reload_backoff) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::WorkerHandle;
    use async_trait::async_trait;
    use callhome_core::error::{ConfigError, ReconcileError};
    use callhome_core::types::{
        Application, ConnectionMode, ReconnectPolicy, ServerEndpoint, TransportSpec,
    };
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn make_app(name: &str) -> Application {
        Application {
            name: name.to_string(),
            servers: vec![ServerEndpoint {
                address: "192.0.2.1".to_string(),
                port: 4334,
            }],
            transport: TransportSpec::Ssh { host_keys: vec![] },
            connection: ConnectionMode::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Switchable config source: fails the next `fail_times` fetches, then
    /// serves the current application set.
    struct MockSource {
        current: Mutex<Vec<Application>>,
        fail_times: AtomicUsize,
    }

    impl MockSource {
        fn new(apps: Vec<Application>) -> Self {
            Self {
                current: Mutex::new(apps),
                fail_times: AtomicUsize::new(0),
            }
        }

        fn set(&self, apps: Vec<Application>) {
            *self.current.lock().unwrap() = apps;
        }
    }

    #[async_trait]
    impl ConfigSource for MockSource {
        async fn fetch(&self) -> Result<Vec<Application>, ConfigError> {
            if self
                .fail_times
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ConfigError::NotFound(PathBuf::from("/mock/config.toml")));
            }
            Ok(self.current.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct MockSpawner {
        spawned: Mutex<Vec<String>>,
    }

    impl MockSpawner {
        fn spawned(&self) -> Vec<String> {
            self.spawned.lock().unwrap().clone()
        }
    }

    impl WorkerSpawner for MockSpawner {
        fn spawn(&self, app: &Application) -> Result<WorkerHandle, ReconcileError> {
            self.spawned.lock().unwrap().push(app.name.clone());
            Ok(WorkerHandle::new(
                CancellationToken::new(),
                tokio::spawn(std::future::pending::<()>()),
            ))
        }
    }

    fn controller(
        source: &Arc<MockSource>,
        spawner: &Arc<MockSpawner>,
    ) -> Controller {
        let source: Arc<dyn ConfigSource> = source.clone();
        let spawner: Arc<dyn WorkerSpawner> = spawner.clone();
        Controller::new(source, spawner, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_startup_failure_is_fatal() {
        let source = Arc::new(MockSource::new(vec![make_app("a")]));
        source.fail_times.store(1, Ordering::SeqCst);
        let spawner = Arc::new(MockSpawner::default());

        let (_reload_tx, reload_rx) = mpsc::channel(1);
        let result = controller(&source, &spawner)
            .run(reload_rx, CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CallHomeError::Config(_))));
        assert!(spawner.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_startup_applies_config_and_shutdown_is_clean() {
        let source = Arc::new(MockSource::new(vec![make_app("a"), make_app("b")]));
        let spawner = Arc::new(MockSpawner::default());

        let (_reload_tx, reload_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(controller(&source, &spawner).run(reload_rx, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        task.await.unwrap().unwrap();

        let mut spawned = spawner.spawned();
        spawned.sort();
        assert_eq!(spawned, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_reload_applies_new_set() {
        let source = Arc::new(MockSource::new(vec![make_app("a")]));
        let spawner = Arc::new(MockSpawner::default());

        let (reload_tx, reload_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(controller(&source, &spawner).run(reload_rx, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        source.set(vec![make_app("a"), make_app("c")]);
        reload_tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert!(spawner.spawned().contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn test_reload_failure_retries_until_success() {
        let source = Arc::new(MockSource::new(vec![make_app("a")]));
        let spawner = Arc::new(MockSpawner::default());

        let (reload_tx, reload_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(controller(&source, &spawner).run(reload_rx, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;

        // two failing fetches, then the new set appears
        source.set(vec![make_app("a"), make_app("d")]);
        source.fail_times.store(2, Ordering::SeqCst);
        reload_tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert!(spawner.spawned().contains(&"d".to_string()));
    }
}
