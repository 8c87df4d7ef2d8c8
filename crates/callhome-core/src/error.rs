//! Error taxonomy for the callhomed daemon
//!
//! Per-area error enums, aggregated by [`CallHomeError`] for the fatal
//! startup path. Connect failures to individual servers are plain
//! `std::io::Error`s absorbed inside the worker's retry machine and never
//! appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for the callhomed daemon
///
/// Only the controller's startup path surfaces this; during reload the same
/// failures are logged and retried instead.
#[derive(Error, Debug)]
pub enum CallHomeError {
    /// Configuration fetch or validation error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reconciliation error
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Persisted-state error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Configuration fetch and validation errors
///
/// `Unsupported` is a distinct condition from the malformed-input variants:
/// the document parsed fine, but names a feature this daemon recognizes and
/// refuses to run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Application with an empty name
    #[error("Application with empty name")]
    EmptyName,

    /// Application name contains a path separator (names double as file stems)
    #[error("Application name {0:?} contains a path separator")]
    InvalidName(String),

    /// Duplicate application name within one snapshot
    #[error("Duplicate application name: {0}")]
    DuplicateName(String),

    /// Application without any servers
    #[error("Application {0:?} has no servers")]
    NoServers(String),

    /// Referenced host-key file does not exist
    #[error("Application {app:?}: host key file not found: {path}")]
    HostKeyMissing { app: String, path: PathBuf },

    /// Recognized but unsupported transport or connection mode
    #[error("Application {app:?}: {feature} is not supported")]
    Unsupported { app: String, feature: &'static str },
}

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A worker could not be started for an application
    #[error("Failed to start worker for {app:?}: {reason}")]
    SpawnFailed { app: String, reason: String },
}

/// Persisted-state errors (best-effort: logged by callers, never fatal on
/// the connection path)
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O error against the state directory
    #[error("State store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("State record error: {0}")]
    Record(#[from] serde_json::Error),
}

/// Session-handler errors, absorbed by the worker loop
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session subprocess could not be spawned
    #[error("Failed to spawn session handler: {0}")]
    Spawn(#[source] std::io::Error),

    /// The session config file could not be written
    #[error("Failed to write session config {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the handed-off connection
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The handler exited reporting a failure
    #[error("Session handler failed: {0}")]
    Failed(String),
}
