//! Configuration reconciliation
//!
//! Diffs the desired application set against the running one and converges
//! by starting and stopping workers. An application is "the same" only when
//! every configured field matches; any difference means the old worker is
//! killed and a fresh one started. Matching applications keep their running
//! worker untouched, so reconciling an unchanged configuration is a no-op.
//!
//! The ActiveSet has a single writer (the controller task); workers hold no
//! reference into it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use callhome_core::error::ReconcileError;
use callhome_core::types::Application;

use crate::worker::{self, WorkerContext};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a running worker
pub struct WorkerHandle {
    id: u64,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Wrap a spawned worker task; assigns a process-unique id
    pub fn new(cancel: CancellationToken, join: JoinHandle<()>) -> Self {
        Self {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            cancel,
            join,
        }
    }

    /// Process-unique worker id, used in logs
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Forcefully terminate the worker.
    ///
    /// Unconditional: the token stops the worker at its next blocking point
    /// and the abort tears down anything still in flight. Persisted-state
    /// writes are atomic per key, so termination cannot tear a record.
    pub fn terminate(self) {
        self.cancel.cancel();
        self.join.abort();
    }
}

/// Starts a worker for an application
///
/// The seam between the reconciler and the worker runtime; tests substitute
/// a recording implementation.
pub trait WorkerSpawner: Send + Sync {
    /// Spawn a worker for `app`
    fn spawn(&self, app: &Application) -> Result<WorkerHandle, ReconcileError>;
}

/// Spawns real worker tasks on the tokio runtime
pub struct TaskSpawner {
    ctx: Arc<WorkerContext>,
}

impl TaskSpawner {
    /// Create a spawner sharing `ctx` across all workers
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }
}

impl WorkerSpawner for TaskSpawner {
    fn spawn(&self, app: &Application) -> Result<WorkerHandle, ReconcileError> {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(worker::run(
            app.clone(),
            Arc::clone(&self.ctx),
            cancel.clone(),
        ));
        Ok(WorkerHandle::new(cancel, join))
    }
}

struct ActiveEntry {
    app: Application,
    handle: WorkerHandle,
}

/// The running application set: name → (definition, worker handle)
#[derive(Default)]
pub struct ActiveSet {
    entries: HashMap<String, ActiveEntry>,
}

impl ActiveSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of running applications
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no applications are running
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an application with this name is running
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The worker id attached to `name`, if running
    pub fn worker_id(&self, name: &str) -> Option<u64> {
        self.entries.get(name).map(|entry| entry.handle.id())
    }

    /// Remove and return the handle for `app` only if the stored definition
    /// matches in every field.
    fn take_matching(&mut self, app: &Application) -> Option<WorkerHandle> {
        let matches = self
            .entries
            .get(&app.name)
            .is_some_and(|entry| entry.app == *app);
        if matches {
            self.entries.remove(&app.name).map(|entry| entry.handle)
        } else {
            None
        }
    }

    /// Terminate every running worker and empty the set
    pub fn terminate_all(&mut self) {
        for (name, entry) in self.entries.drain() {
            tracing::info!(app = %name, worker = entry.handle.id(), "stopping worker");
            entry.handle.terminate();
        }
    }
}

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Workers freshly started
    pub started: usize,
    /// Workers terminated
    pub stopped: usize,
    /// Workers carried over untouched
    pub kept: usize,
}

/// Converge the running set onto `incoming`.
///
/// Matching applications inherit their running worker; stale workers are
/// terminated before any new ones start. On a spawn failure the entries
/// converged so far stay installed (so a retried reconcile picks up where
/// this one failed) and the error propagates to the caller.
///
/// `incoming` must already be validated: names unique, sets well-formed.
pub fn reconcile(
    active: &mut ActiveSet,
    incoming: Vec<Application>,
    spawner: &dyn WorkerSpawner,
) -> Result<ReconcileSummary, ReconcileError> {
    let mut summary = ReconcileSummary::default();
    let mut next: HashMap<String, ActiveEntry> = HashMap::with_capacity(incoming.len());
    let mut pending: Vec<Application> = Vec::new();

    // carry over workers whose definition is unchanged
    for app in incoming {
        debug_assert!(!next.contains_key(&app.name), "names unique post-validation");
        match active.take_matching(&app) {
            Some(handle) => {
                summary.kept += 1;
                next.insert(app.name.clone(), ActiveEntry { app, handle });
            }
            None => pending.push(app),
        }
    }

    // anything left in the old set is gone or redefined
    for (name, entry) in active.entries.drain() {
        tracing::info!(app = %name, worker = entry.handle.id(), "stopping worker");
        entry.handle.terminate();
        summary.stopped += 1;
    }

    // start workers for new and redefined applications
    let mut spawn_result = Ok(());
    for app in pending {
        match spawner.spawn(&app) {
            Ok(handle) => {
                tracing::info!(app = %app.name, worker = handle.id(), "started worker");
                summary.started += 1;
                next.insert(app.name.clone(), ActiveEntry { app, handle });
            }
            Err(e) => {
                spawn_result = Err(e);
                break;
            }
        }
    }

    active.entries = next;
    spawn_result.map(|()| summary)
}
