use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    error::{KonspektError, Result},
    types::{HistoryEntry, StudyMaterials},
};

pub const HISTORY_KEY: &str = "konspekt.history";

/// Minimal persisted key-value mechanism backing the history.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// One JSON file per key inside a data directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .values
            .lock()
            .expect("MemoryStore poisoned")
            .insert(key.to_string(), value.to_string());
        store
    }

    /// Make every following `set` fail, for exercising write-failure paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(KonspektError::Persistence {
                reason: "read rejected".to_string(),
            });
        }
        Ok(self
            .values
            .lock()
            .expect("MemoryStore poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(KonspektError::Persistence {
                reason: "write rejected".to_string(),
            });
        }
        self.values
            .lock()
            .expect("MemoryStore poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Completed runs, most recent first.
///
/// The persisted collection is the source of truth: every mutation re-reads
/// it, applies the change and writes it back whole. The cached copy is only
/// replaced once the write has succeeded.
pub struct HistoryStore {
    store: Box<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let entries = read_entries(store.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read history, starting empty");
            Vec::new()
        });
        tracing::debug!(entries = entries.len(), "history loaded");
        Self { store, entries }
    }

    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn append(&mut self, filename: &str, materials: StudyMaterials) -> Result<HistoryEntry> {
        let mut entries = read_entries(self.store.as_ref())?;

        let latest = entries.iter().map(|entry| entry.id).max().unwrap_or(0);
        let entry = HistoryEntry {
            id: now_millis().max(latest + 1),
            filename: filename.to_string(),
            materials,
        };
        entries.insert(0, entry.clone());

        self.write(entries)?;
        tracing::info!(id = entry.id, filename, "history entry saved");
        Ok(entry)
    }

    /// Returns `false` when no entry has the given id.
    pub fn remove(&mut self, id: u64) -> Result<bool> {
        let mut entries = read_entries(self.store.as_ref())?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            self.entries = entries;
            return Ok(false);
        }

        self.write(entries)?;
        tracing::info!(id, "history entry removed");
        Ok(true)
    }

    fn write(&mut self, entries: Vec<HistoryEntry>) -> Result<()> {
        let json = serde_json::to_string(&entries)?;
        self.store
            .set(HISTORY_KEY, &json)
            .map_err(|e| KonspektError::Persistence {
                reason: e.to_string(),
            })?;
        self.entries = entries;
        Ok(())
    }
}

/// Read the persisted collection. Corrupt JSON counts as empty; a failed
/// read is an error so callers never write over data they could not see.
fn read_entries(store: &dyn KeyValueStore) -> Result<Vec<HistoryEntry>> {
    let raw = match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ok(Vec::new()),
        Err(e) => {
            return Err(KonspektError::Persistence {
                reason: e.to_string(),
            });
        }
    };

    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "discarding corrupt history");
        Vec::new()
    }))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
