//! Desired-configuration source
//!
//! The controller never reads files itself; it fetches the desired
//! application set through this seam, once at startup and again on every
//! reload trigger.

use std::path::PathBuf;

use async_trait::async_trait;

use super::ConfigDocument;
use crate::error::ConfigError;
use crate::types::Application;

/// Supplies the desired-state snapshot of applications
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the current desired application set
    async fn fetch(&self) -> Result<Vec<Application>, ConfigError>;
}

/// Reads the desired set from the TOML config document on disk
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Create a source backed by the given config file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The config file this source reads
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self) -> Result<Vec<Application>, ConfigError> {
        let doc: ConfigDocument = super::load_config(&self.path)?;
        Ok(doc.applications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetch_reads_applications() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[application]]
            name = "noc"
            transport = "tls"

            [[application.servers]]
            address = "192.0.2.1"
            port = 4334
            "#
        )
        .unwrap();

        let source = FileConfigSource::new(file.path());
        let apps = source.fetch().await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "noc");
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let source = FileConfigSource::new("/nonexistent/callhomed.toml");
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
