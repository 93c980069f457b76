//! JSON-file backed keyed store.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Version written into every store file.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors raised by the durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported storage schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    records: &'a BTreeMap<String, T>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    records: BTreeMap<String, T>,
}

/// A concurrent keyed map mirrored to a JSON file on every mutation.
pub struct JsonStore<T> {
    inner: Arc<DashMap<String, T>>,
    path: Option<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl<T> Clone for JsonStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            path: self.path.clone(),
            write_lock: self.write_lock.clone(),
        }
    }
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Create a store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            path: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open a store backed by `path`, loading existing records if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let store = Self {
            inner: Arc::new(DashMap::new()),
            path: Some(path.clone()),
            write_lock: Arc::new(Mutex::new(())),
        };

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let envelope: Envelope<T> = serde_json::from_reader(reader)?;
            if envelope.version != SCHEMA_VERSION {
                return Err(StorageError::UnsupportedVersion {
                    found: envelope.version,
                    expected: SCHEMA_VERSION,
                });
            }
            for (key, value) in envelope.records {
                store.inner.insert(key, value);
            }
            tracing::info!(path = %path.display(), records = store.inner.len(), "Loaded store");
        }

        Ok(store)
    }

    /// Get a copy of the record stored under `key`.
    pub fn get(&self, key: &str) -> Option<T> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// Insert or replace a record and flush.
    pub fn put(&self, key: &str, value: T) -> Result<(), StorageError> {
        self.inner.insert(key.to_string(), value);
        self.flush()
    }

    /// Atomically inspect the current record and decide whether to replace it.
    ///
    /// `decide` runs while the key is locked; returning `Some(record)` stores it.
    pub fn upsert_with<R>(
        &self,
        key: &str,
        decide: impl FnOnce(Option<&T>) -> (Option<T>, R),
    ) -> Result<R, StorageError> {
        let (changed, result) = match self.inner.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let (replacement, result) = decide(Some(occupied.get()));
                let changed = replacement.is_some();
                if let Some(value) = replacement {
                    occupied.insert(value);
                }
                (changed, result)
            }
            Entry::Vacant(vacant) => {
                let (replacement, result) = decide(None);
                let changed = replacement.is_some();
                if let Some(value) = replacement {
                    vacant.insert(value);
                }
                (changed, result)
            }
        };

        if changed {
            self.flush()?;
        }
        Ok(result)
    }

    /// Snapshot of every record.
    pub fn entries(&self) -> Vec<(String, T)> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn flush(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Snapshot inside the lock so the last writer always persists the newest state.
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let records: BTreeMap<String, T> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(
                &mut writer,
                &EnvelopeRef {
                    version: SCHEMA_VERSION,
                    records: &records,
                },
            )?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;

        tracing::trace!(path = %path.display(), records = records.len(), "Store flushed");
        Ok(())
    }
}
