//! sshd subprocess session handler
//!
//! The production handler: each established connection becomes an
//! `sshd -i` child with the socket bound to its stdio, driven by a
//! per-application config file carrying the keep-alive policy, the host
//! keys, and the NETCONF subsystem line. The child is killed when the
//! worker drops the session future.

use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;

use callhome_core::error::SessionError;
use callhome_core::types::Application;

use super::SessionHandler;

/// Spawns an sshd child per established connection
pub struct SubprocessSessionHandler {
    sshd_path: PathBuf,
    netconf_subsystem: PathBuf,
    config_dir: PathBuf,
}

impl SubprocessSessionHandler {
    /// Create a handler writing per-application config files into `config_dir`
    pub fn new(
        sshd_path: impl Into<PathBuf>,
        netconf_subsystem: impl Into<PathBuf>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sshd_path: sshd_path.into(),
            netconf_subsystem: netconf_subsystem.into(),
            config_dir: config_dir.into(),
        }
    }

    /// Write the sshd config file for `app`, returning its path
    fn write_sshd_config(&self, app: &Application) -> Result<PathBuf, SessionError> {
        let mut contents = String::new();
        if let Some(ka) = app.keep_alives() {
            contents.push_str(&format!("ClientAliveInterval {}\n", ka.interval.as_secs()));
            contents.push_str(&format!("ClientAliveCountMax {}\n", ka.count_max));
        }
        contents.push_str(&format!(
            "Subsystem netconf {}\n",
            self.netconf_subsystem.display()
        ));
        for key in app.host_keys() {
            contents.push_str(&format!("HostKey {}\n", key.display()));
        }

        let path = self.config_dir.join(format!("{}.sshd_config", app.name));
        std::fs::write(&path, contents).map_err(|e| SessionError::ConfigWrite {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

#[async_trait]
impl SessionHandler for SubprocessSessionHandler {
    async fn run_session(&self, app: &Application, stream: TcpStream) -> Result<(), SessionError> {
        let config_path = self.write_sshd_config(app)?;

        // hand the socket to the child as stdin/stdout/stderr
        let std_stream = stream.into_std()?;
        std_stream.set_nonblocking(false)?;
        let fd: OwnedFd = std_stream.into();
        let stdin = fd.try_clone()?;
        let stdout = fd.try_clone()?;

        let mut child = Command::new(&self.sshd_path)
            .arg("-i")
            .arg("-f")
            .arg(&config_path)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(fd))
            .kill_on_drop(true)
            .spawn()
            .map_err(SessionError::Spawn)?;

        tracing::debug!(app = %app.name, pid = child.id(), "session subprocess started");

        let status = child.wait().await?;
        if !status.success() {
            return Err(SessionError::Failed(status.to_string()));
        }
        Ok(())
    }
}
