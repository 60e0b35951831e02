//! Append-only audit trail kept in a single blob.
//!
//! The backing store only offers whole-blob `get` and `put`, so every append
//! is a read-modify-write with no compare-and-swap. [`AuditLogger`] holds an
//! async mutex across that sequence, which makes it safe for any number of
//! callers sharing one logger. Two loggers (or two processes) pointed at the
//! same key can still lose each other's entries.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::path::PathBuf;
#[cfg(any(test, feature = "test-utils"))]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Result, SprinklerError};
use crate::types::LogEntry;

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// Whole-object key/value storage.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Read an entire blob. Returns `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Overwrite an entire blob.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;
}

fn store_err(op: &'static str, key: &str, message: impl Into<String>) -> SprinklerError {
    SprinklerError::Store {
        op,
        key: key.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    #[cfg(any(test, feature = "test-utils"))]
    failing: AtomicBool,
    #[cfg(any(test, feature = "test-utils"))]
    puts: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(any(test, feature = "test-utils"))]
    fn check(&self, op: &'static str, key: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_err(op, key, "injected failure"));
        }
        Ok(())
    }

    #[cfg(not(any(test, feature = "test-utils")))]
    fn check(&self, _op: &'static str, _key: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryBlobStore {
    /// Make every subsequent `get` and `put` fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Raw contents of `key`, if present.
    pub fn bytes(&self, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    /// Contents of `key` as text, or an empty string if absent.
    pub fn text(&self, key: &str) -> String {
        self.bytes(key)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.check("get", key)?;
        let objects = self
            .objects
            .lock()
            .map_err(|_| store_err("get", key, "lock poisoned"))?;
        Ok(objects.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.check("put", key)?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| store_err("put", key, "lock poisoned"))?;
        objects.insert(key.to_string(), data);
        #[cfg(any(test, feature = "test-utils"))]
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FsBlobStore
// ---------------------------------------------------------------------------

/// Blob store backed by a local directory, one file per key.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, op: &'static str, key: &str) -> Result<PathBuf> {
        let bad = key.is_empty()
            || key
                .split(['/', '\\'])
                .any(|part| part.is_empty() || part == "." || part == "..");
        if bad {
            return Err(store_err(op, key, "invalid blob key"));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for("get", key)?;
        let data = tokio::task::spawn_blocking(move || crate::io::read_if_exists(&path))
            .await
            .map_err(|e| store_err("get", key, e.to_string()))?
            .map_err(|e| store_err("get", key, e.to_string()))?;
        Ok(data.map(Bytes::from))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_for("put", key)?;
        tokio::task::spawn_blocking(move || crate::io::atomic_write(&path, &data))
            .await
            .map_err(|e| store_err("put", key, e.to_string()))?
            .map_err(|e| store_err("put", key, e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AuditLogger
// ---------------------------------------------------------------------------

pub struct AuditLogger {
    store: Arc<dyn BlobStore>,
    key: String,
    append_lock: AsyncMutex<()>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            append_lock: AsyncMutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append one `Time/Status` line to the blob.
    ///
    /// Not retried on failure; the caller decides what to do with the error.
    pub async fn append(&self, timestamp_millis: i64, status: bool) -> Result<()> {
        let entry = LogEntry::new(timestamp_millis, status);
        let _guard = self.append_lock.lock().await;

        let existing = self.store.get(&self.key).await?.unwrap_or_default();
        let line = entry.to_string();
        let mut blob = BytesMut::with_capacity(existing.len() + line.len());
        blob.extend_from_slice(&existing);
        blob.extend_from_slice(line.as_bytes());

        self.store.put(&self.key, blob.freeze()).await?;
        tracing::info!(key = %self.key, "appended audit entry");
        Ok(())
    }
}
