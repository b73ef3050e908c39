//! Persistent embedding store.
//!
//! Embeddings live in a sharded concurrent map and are mirrored to a JSON file
//! after every write. The file is replaced atomically: the snapshot is written
//! to a temporary file in the same directory, synced, then renamed over the
//! previous version, so readers never observe a partial file.

use crate::SymbolId;
use crate::error::{StoreError, StoreResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const STORE_VERSION: u32 = 1;

/// Unset dimension marker
const NO_DIMENSION: usize = 0;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    dimension: Option<usize>,
    embeddings: BTreeMap<SymbolId, Vec<f32>>,
}

#[derive(Debug)]
pub struct EmbeddingStore {
    path: Option<PathBuf>,
    embeddings: DashMap<SymbolId, Arc<[f32]>>,
    /// Fixed by the first stored vector
    dimension: AtomicUsize,
    flush_lock: Mutex<()>,
}

impl EmbeddingStore {
    /// Open the store backed by `path`. A missing file yields an empty store;
    /// the file is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let store = Self {
            path: Some(path.clone()),
            embeddings: DashMap::new(),
            dimension: AtomicUsize::new(NO_DIMENSION),
            flush_lock: Mutex::new(()),
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No embedding store at {}, starting empty", path.display());
                return Ok(store);
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let file: StoreFile =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupted {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if file.version > STORE_VERSION {
            return Err(StoreError::Corrupted {
                path,
                reason: format!(
                    "version {} is newer than supported version {STORE_VERSION}",
                    file.version
                ),
            });
        }

        let dimension = file
            .dimension
            .or_else(|| file.embeddings.values().next().map(Vec::len));
        for (id, embedding) in file.embeddings {
            if embedding.is_empty() || Some(embedding.len()) != dimension {
                return Err(StoreError::Corrupted {
                    path,
                    reason: format!(
                        "embedding for '{id}' has dimension {}, expected {}",
                        embedding.len(),
                        dimension.unwrap_or(0)
                    ),
                });
            }
            store.embeddings.insert(id, embedding.into());
        }
        if let Some(dimension) = dimension {
            store.dimension.store(dimension, Ordering::SeqCst);
        }

        tracing::info!(
            "Loaded {} embeddings from {}",
            store.embeddings.len(),
            path.display()
        );
        Ok(store)
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            embeddings: DashMap::new(),
            dimension: AtomicUsize::new(NO_DIMENSION),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn dimension(&self) -> Option<usize> {
        match self.dimension.load(Ordering::SeqCst) {
            NO_DIMENSION => None,
            d => Some(d),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<[f32]>> {
        self.embeddings.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.embeddings.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Stored ids in ascending order.
    pub fn ids(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.embeddings.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Store `embedding` for `id`, replacing any previous vector, and flush.
    pub fn put(&self, id: SymbolId, embedding: Vec<f32>) -> StoreResult<()> {
        self.insert(id, embedding)?;
        self.flush()
    }

    /// Like [`put`](Self::put) but leaves the file untouched until the next
    /// [`flush`](Self::flush). Used for batches.
    pub(crate) fn insert(&self, id: SymbolId, embedding: Vec<f32>) -> StoreResult<()> {
        if embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding { id });
        }
        self.check_dimension(embedding.len())?;

        self.embeddings.insert(id, embedding.into());
        Ok(())
    }

    /// Remove the vector for `id`. Returns whether one was stored.
    pub fn remove(&self, id: &str) -> StoreResult<bool> {
        let removed = self.embeddings.remove(id).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    fn check_dimension(&self, actual: usize) -> StoreResult<()> {
        match self.dimension.compare_exchange(
            NO_DIMENSION,
            actual,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(expected) if expected == actual => Ok(()),
            Err(expected) => Err(StoreError::DimensionMismatch { expected, actual }),
        }
    }

    /// Write the current contents to disk. No-op for in-memory stores.
    pub fn flush(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.flush_lock.lock();

        let snapshot = StoreFile {
            version: STORE_VERSION,
            dimension: self.dimension(),
            embeddings: self
                .embeddings
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().to_vec()))
                .collect(),
        };
        let content = serde_json::to_vec(&snapshot).map_err(|e| StoreError::Write {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;

        write_atomic(path, &content).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            "Flushed {} embeddings to {}",
            snapshot.embeddings.len(),
            path.display()
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
