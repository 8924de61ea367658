//! Persistence adapters for the license record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{LicenseError, Result};
use crate::models::LicenseState;

/// Storage keys
pub mod keys {
    pub const LICENSE_STATE: &str = "nero-license";
}

/// Where the license record lives between runs.
///
/// Implementations swallow their own I/O failures (after logging them): a
/// broken disk must not make activation or refresh fail.
pub trait Persistence: Send + Sync {
    /// Returns the saved record, or None if nothing usable is stored.
    fn load(&self) -> Option<LicenseState>;

    fn save(&self, state: &LicenseState);

    fn clear(&self);
}

impl<P: Persistence + ?Sized> Persistence for Arc<P> {
    fn load(&self) -> Option<LicenseState> {
        (**self).load()
    }

    fn save(&self, state: &LicenseState) {
        (**self).save(state)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-memory persistence
///
/// Keeps the serialized record, so what comes back from `load` went through
/// the same serde path as the file adapter.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    record: RwLock<Option<String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts out holding `state`.
    pub fn with_state(state: &LicenseState) -> Self {
        let persistence = Self::new();
        persistence.save(state);
        persistence
    }

    /// The serialized record, if any.
    pub fn raw(&self) -> Option<String> {
        self.record.read().ok()?.clone()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Option<LicenseState> {
        let raw = self.raw()?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Discarding unreadable license record: {}", e);
                None
            }
        }
    }

    fn save(&self, state: &LicenseState) {
        let raw = match serde_json::to_string(state) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize license record: {}", e);
                return;
            }
        };
        if let Ok(mut record) = self.record.write() {
            *record = Some(raw);
        }
    }

    fn clear(&self) {
        if let Ok(mut record) = self.record.write() {
            *record = None;
        }
    }
}

/// File-based persistence
///
/// Stores a JSON object keyed by record name (see [`keys`]). Writes go to a
/// sibling temp file first and are renamed into place.
pub struct FilePersistence {
    path: PathBuf,
    cache: RwLock<HashMap<String, serde_json::Value>>,
}

impl FilePersistence {
    /// Opens (or prepares) the state file at `path`, creating parent
    /// directories as needed. A corrupt file is treated as empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| LicenseError::Storage(format!("{}: {}", parent.display(), e)))?;
        }

        let cache = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| LicenseError::Storage(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt state file {}: {}", path.display(), e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) {
        let contents = match self.cache.read() {
            Ok(cache) => match serde_json::to_string_pretty(&*cache) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!("Failed to serialize state file: {}", e);
                    return;
                }
            },
            Err(_) => return,
        };

        let tmp = self.path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, contents).and_then(|_| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            tracing::warn!("Failed to write state file {}: {}", self.path.display(), e);
        }
    }
}

impl Persistence for FilePersistence {
    fn load(&self) -> Option<LicenseState> {
        let value = self.cache.read().ok()?.get(keys::LICENSE_STATE).cloned()?;
        match serde_json::from_value(value) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Discarding unreadable license record: {}", e);
                None
            }
        }
    }

    fn save(&self, state: &LicenseState) {
        let value = match serde_json::to_value(state) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to serialize license record: {}", e);
                return;
            }
        };
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(keys::LICENSE_STATE.to_string(), value);
        }
        self.flush();
    }

    fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(keys::LICENSE_STATE);
        }
        self.flush();
    }
}

impl std::fmt::Debug for FilePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePersistence")
            .field("path", &self.path)
            .finish()
    }
}
