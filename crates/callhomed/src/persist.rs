//! Persisted per-application state
//!
//! One durable record per application name: the server most recently
//! connected to. This is what makes the `last-connected` start preference
//! sticky across daemon restarts.
//!
//! Records are whole-file overwrites, written to a temp file and renamed
//! into place, so a worker cancelled mid-write can never leave a torn
//! record behind. Workers only ever touch the record matching their own
//! application name, so concurrent use is conflict-free by construction.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use callhome_core::error::PersistenceError;
use callhome_core::types::ServerEndpoint;

/// On-disk record format: `<state_dir>/<app_name>.json`
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    last_connected: ServerEndpoint,
}

/// Durable store of last-successfully-connected servers
#[derive(Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The directory records are kept in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Look up the last server successfully connected to for `name`.
    ///
    /// An application that has never connected yields `Ok(None)`.
    pub fn get(&self, name: &str) -> Result<Option<ServerEndpoint>, PersistenceError> {
        let path = self.record_path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: PersistedRecord = serde_json::from_str(&content)?;
        Ok(Some(record.last_connected))
    }

    /// Record `endpoint` as the last server successfully connected to for
    /// `name`, overwriting any previous record.
    pub fn put(&self, name: &str, endpoint: &ServerEndpoint) -> Result<(), PersistenceError> {
        let record = PersistedRecord {
            last_connected: endpoint.clone(),
        };
        let content = serde_json::to_string(&record)?;

        // write-then-rename keeps the record atomic per key
        let path = self.record_path(name);
        let tmp = self.dir.join(format!(".{}.json.tmp", name));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
