//! callhomed: NETCONF call-home connection daemon
//!
//! The daemon reads a declarative list of remote management applications
//! and maintains an outbound connection to each of them. One worker task
//! per application dials servers under the configured reconnect policy and
//! hands every established connection to a session handler; the controller
//! reconciles the running worker set against the configuration on startup
//! and on every reload.

pub mod controller;
pub mod persist;
pub mod reconcile;
pub mod session;
pub mod worker;

pub use controller::Controller;
pub use persist::StateStore;
pub use reconcile::{ActiveSet, TaskSpawner, WorkerHandle, WorkerSpawner};
