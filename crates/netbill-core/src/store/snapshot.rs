// ── JSON snapshot persistence ──

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Bill, Package, Payment, RouterConfig, Subscriber};

use super::MemoryStore;

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable copy of every table. Router secrets are not included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub bills: Vec<Bill>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub routers: Vec<RouterConfig>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            subscribers: Vec::new(),
            packages: Vec::new(),
            bills: Vec::new(),
            payments: Vec::new(),
            routers: Vec::new(),
        }
    }
}

impl MemoryStore {
    /// Load a store from `path`. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "data file missing, starting empty");
            return Ok(Self::new());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::store(format!("cannot read {}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| CoreError::store(format!("cannot parse {}: {e}", path.display())))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(CoreError::store(format!(
                "{} was written by a newer version (format {})",
                path.display(),
                snapshot.version
            )));
        }

        debug!(
            path = %path.display(),
            subscribers = snapshot.subscribers.len(),
            bills = snapshot.bills.len(),
            "data file loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the store to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::store(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| CoreError::store(format!("cannot serialize store: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| CoreError::store(format!("cannot write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| CoreError::store(format!("cannot replace {}: {e}", path.display())))?;

        debug!(path = %path.display(), "data file saved");
        Ok(())
    }
}
