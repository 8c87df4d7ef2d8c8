//! Domain types for call-home applications
//!
//! These records describe the *desired* state of the daemon: which NMS
//! applications to maintain connections to and under which policies. They
//! all carry field-by-field value equality — the reconciler decides whether
//! a running worker may be kept by comparing whole records, so any changed
//! field makes an application a different application.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::serde_utils::{duration_mins, duration_secs};

/// A remote management server to dial: hostname or literal address, plus port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Hostname or literal v4/v6 address
    pub address: String,
    /// TCP port
    pub port: u16,
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Which server a worker starts with when (re)entering server selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartWith {
    /// Always start from the first server in the configured list
    FirstListed,
    /// Resume at the last successfully connected server, if still configured
    LastConnected,
}

/// Per-application reconnect/failover policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReconnectPolicy {
    /// Starting-server preference
    pub start_with: StartWith,

    /// Wait between retries against the same server
    #[serde(rename = "interval-secs", with = "duration_secs")]
    pub interval: Duration,

    /// Retries per server beyond the initial attempt, before failing over
    #[serde(rename = "count-max")]
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            start_with: StartWith::FirstListed,
            interval: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

/// Keep-alive probing policy, consumed by the session handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KeepAlivePolicy {
    /// Probe interval
    #[serde(rename = "interval-secs", with = "duration_secs")]
    pub interval: Duration,

    /// Missed probes before the session is considered dead
    pub count_max: u32,
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            count_max: 3,
        }
    }
}

/// Secured-transport variant for the session handed off by a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportSpec {
    /// NETCONF over SSH; host keys are file references handed to the
    /// session subprocess
    Ssh {
        #[serde(rename = "host-keys")]
        host_keys: Vec<PathBuf>,
    },
    /// Recognized but rejected at validation time
    Tls,
}

/// How long a connection is expected to live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Hold the connection open indefinitely, probing per the keep-alive policy
    Persistent {
        #[serde(rename = "keep-alives", default)]
        keep_alives: KeepAlivePolicy,
    },
    /// Recognized but rejected at validation time
    Periodic {
        #[serde(
            rename = "timeout-mins",
            with = "duration_mins",
            default = "default_periodic_timeout"
        )]
        timeout: Duration,
        #[serde(
            rename = "linger-secs",
            with = "duration_secs",
            default = "default_periodic_linger"
        )]
        linger: Duration,
    },
}

fn default_periodic_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_periodic_linger() -> Duration {
    Duration::from_secs(30)
}

impl Default for ConnectionMode {
    fn default() -> Self {
        Self::Persistent {
            keep_alives: KeepAlivePolicy::default(),
        }
    }
}

/// One call-home application: a named NMS peer set and the policies for
/// maintaining a connection to it.
///
/// Immutable once reconciled into the active set. The worker's runtime
/// handle is deliberately *not* part of this record, so derived equality is
/// exactly the diffing contract the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Unique name, also used as the key for persisted state
    pub name: String,

    /// Ordered, non-empty list of servers to dial
    #[serde(default)]
    pub servers: Vec<ServerEndpoint>,

    /// Secured-transport variant
    pub transport: TransportSpec,

    /// Connection lifetime mode
    #[serde(default)]
    pub connection: ConnectionMode,

    /// Reconnect/failover policy
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl Application {
    /// Keep-alive policy, when the connection mode carries one
    pub fn keep_alives(&self) -> Option<&KeepAlivePolicy> {
        match &self.connection {
            ConnectionMode::Persistent { keep_alives } => Some(keep_alives),
            ConnectionMode::Periodic { .. } => None,
        }
    }

    /// Host-key file references, when the transport carries them
    pub fn host_keys(&self) -> &[PathBuf] {
        match &self.transport {
            TransportSpec::Ssh { host_keys } => host_keys,
            TransportSpec::Tls => &[],
        }
    }
}
