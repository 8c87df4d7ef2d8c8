//! Pre-reconciliation validation of an incoming application set
//!
//! Runs before every reconcile, on startup and reload alike. A rejected
//! snapshot leaves the running set untouched.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::types::{Application, ConnectionMode, TransportSpec};

/// Validate an incoming application set.
///
/// Enforced rules:
/// - application names are non-empty, contain no path separator (the name
///   doubles as the state-store file stem), and are unique within the set
/// - every application lists at least one server
/// - SSH transport: every referenced host-key file exists on disk
/// - TLS transport and PERIODIC connection mode are rejected as unsupported,
///   a condition distinct from malformed input
pub fn validate(apps: &[Application]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for app in apps {
        if app.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if app.name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidName(app.name.clone()));
        }
        if !seen.insert(app.name.as_str()) {
            return Err(ConfigError::DuplicateName(app.name.clone()));
        }
        if app.servers.is_empty() {
            return Err(ConfigError::NoServers(app.name.clone()));
        }

        match &app.transport {
            TransportSpec::Ssh { host_keys } => {
                for key in host_keys {
                    if !key.exists() {
                        return Err(ConfigError::HostKeyMissing {
                            app: app.name.clone(),
                            path: key.clone(),
                        });
                    }
                }
            }
            TransportSpec::Tls => {
                return Err(ConfigError::Unsupported {
                    app: app.name.clone(),
                    feature: "TLS transport",
                });
            }
        }

        if let ConnectionMode::Periodic { .. } = app.connection {
            return Err(ConfigError::Unsupported {
                app: app.name.clone(),
                feature: "periodic connection mode",
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeepAlivePolicy, ReconnectPolicy, ServerEndpoint};
    use std::path::PathBuf;
    use std::time::Duration;

    fn ssh_app(name: &str, host_keys: Vec<PathBuf>) -> Application {
        Application {
            name: name.to_string(),
            servers: vec![ServerEndpoint {
                address: "192.0.2.1".to_string(),
                port: 4334,
            }],
            transport: TransportSpec::Ssh { host_keys },
            connection: ConnectionMode::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    #[test]
    fn test_accepts_valid_set() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("hostkey");
        std::fs::write(&key, "key material").unwrap();

        let apps = vec![ssh_app("a", vec![key.clone()]), ssh_app("b", vec![key])];
        assert!(validate(&apps).is_ok());
    }

    #[test]
    fn test_rejects_missing_host_key() {
        let apps = vec![ssh_app("a", vec![PathBuf::from("/nonexistent/hostkey")])];
        let err = validate(&apps).unwrap_err();
        assert!(matches!(err, ConfigError::HostKeyMissing { .. }));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("hostkey");
        std::fs::write(&key, "key material").unwrap();

        let apps = vec![ssh_app("a", vec![key.clone()]), ssh_app("a", vec![key])];
        let err = validate(&apps).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn test_rejects_empty_server_list() {
        let mut app = ssh_app("a", vec![]);
        app.servers.clear();
        let err = validate(&[app]).unwrap_err();
        assert!(matches!(err, ConfigError::NoServers(_)));
    }

    #[test]
    fn test_rejects_name_with_separator() {
        let app = ssh_app("../escape", vec![]);
        let err = validate(&[app]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidName(_)));
    }

    #[test]
    fn test_unsupported_is_distinct_from_malformed() {
        let mut tls = ssh_app("tls-peer", vec![]);
        tls.transport = TransportSpec::Tls;
        let err = validate(&[tls]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Unsupported { feature: "TLS transport", .. }
        ));

        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("hostkey");
        std::fs::write(&key, "key material").unwrap();

        let mut periodic = ssh_app("periodic-peer", vec![key]);
        periodic.connection = ConnectionMode::Periodic {
            timeout: Duration::from_secs(600),
            linger: Duration::from_secs(30),
        };
        let err = validate(&[periodic]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Unsupported { feature: "periodic connection mode", .. }
        ));

        // keep-alive details never affect validity, only diffing identity
        let mut ka = ssh_app("ka-peer", vec![]);
        ka.connection = ConnectionMode::Persistent {
            keep_alives: KeepAlivePolicy {
                interval: Duration::from_secs(1),
                count_max: 100,
            },
        };
        assert!(validate(&[ka]).is_ok());
    }
}
