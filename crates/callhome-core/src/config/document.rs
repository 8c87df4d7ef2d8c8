//! The on-disk configuration document
//!
//! A TOML file with one `[[application]]` table per NMS peer and an
//! optional `[daemon]` table for process-wide settings:
//!
//! ```toml
//! [daemon]
//! connect-timeout-secs = 30
//!
//! [[application]]
//! name = "noc-primary"
//!
//! [[application.servers]]
//! address = "nms1.example.net"
//! port = 4334
//!
//! [application.transport.ssh]
//! host-keys = ["ssh_host_rsa_key"]
//!
//! [application.reconnect]
//! start-with = "last-connected"
//! interval-secs = 5
//! count-max = 3
//! ```
//!
//! Omitted policy tables fall back to the defaults of the call-home YANG
//! module: a persistent connection starting at the first listed server,
//! retried every 5 seconds, with 15-second keep-alive probes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::types::Application;

/// The full configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// Process-wide daemon settings; fixed at startup, not reloaded on SIGHUP
    pub daemon: DaemonSettings,

    /// Desired application set
    #[serde(rename = "application")]
    pub applications: Vec<Application>,
}

/// Process-wide daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DaemonSettings {
    /// Directory for persisted per-application state
    pub state_dir: PathBuf,

    /// Path to the sshd binary spawned for each established connection
    pub sshd_path: PathBuf,

    /// Path to the NETCONF subsystem binary written into the sshd config
    pub netconf_subsystem: PathBuf,

    /// Timeout applied to each TCP connect attempt
    #[serde(rename = "connect-timeout-secs", with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Wait between retries when a reload cycle fails
    #[serde(rename = "reload-backoff-secs", with = "duration_secs")]
    pub reload_backoff: Duration,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            state_dir: super::default_state_dir(),
            sshd_path: PathBuf::from("/usr/sbin/sshd"),
            netconf_subsystem: PathBuf::from("/usr/libexec/netconfd"),
            connect_timeout: Duration::from_secs(30),
            reload_backoff: Duration::from_secs(5),
        }
    }
}
