//! Remote document plumbing: snapshots in, `isOn=false` mirrored back out.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::pin::Pin;
#[cfg(any(test, feature = "test-utils"))]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::error::{Result, SprinklerError};
use crate::types::ActuatorState;

// ---------------------------------------------------------------------------
// StateMirror
// ---------------------------------------------------------------------------

/// Write-back side of the document, used after the relay switches itself off.
#[async_trait]
pub trait StateMirror: Send + Sync + 'static {
    async fn mark_off(&self) -> Result<()>;
}

#[cfg(any(test, feature = "test-utils"))]
/// Counts `mark_off` calls; optionally fails them.
#[derive(Debug, Default)]
pub struct RecordingMirror {
    calls: AtomicUsize,
    failing: AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl StateMirror for RecordingMirror {
    async fn mark_off(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SprinklerError::Io(std::io::Error::other(
                "injected mirror failure",
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DocumentSource
// ---------------------------------------------------------------------------

/// A JSON document on disk standing in for the remote one.
///
/// Changes are picked up by polling, so the first snapshot arrives on the
/// first poll and a rapid rewrite may be coalesced with the next one.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    path: PathBuf,
    poll_interval: Duration,
}

impl DocumentSource {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start watching the document. Dropping the returned subscription stops
    /// the watcher.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(16);
        let path = self.path.clone();
        let interval = self.poll_interval;
        let task = tokio::spawn(watch(path, interval, tx));
        Subscription {
            stream: ReceiverStream::new(rx),
            task,
        }
    }
}

async fn watch(path: PathBuf, interval: Duration, tx: mpsc::Sender<Result<ActuatorState>>) {
    let mut last_seen: Option<(SystemTime, Vec<u8>)> = None;
    loop {
        match read_document(&path).await {
            Ok(Some(current)) => {
                if last_seen.as_ref() != Some(&current) {
                    let snapshot = ActuatorState::from_json(&current.1);
                    tracing::debug!(path = %path.display(), "document changed");
                    last_seen = Some(current);
                    if tx.send(snapshot).await.is_err() {
                        break;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), "failed to read document: {e}"),
        }
        if tx.is_closed() {
            break;
        }
        tokio::time::sleep(interval).await;
    }
}

async fn read_document(path: &Path) -> std::io::Result<Option<(SystemTime, Vec<u8>)>> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mtime = meta.modified()?;
    let data = tokio::fs::read(path).await?;
    Ok(Some((mtime, data)))
}

#[async_trait]
impl StateMirror for DocumentSource {
    async fn mark_off(&self) -> Result<()> {
        let data = serde_json::to_vec(&ActuatorState::off())?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || crate::io::atomic_write(&path, &data))
            .await
            .map_err(|e| SprinklerError::Io(std::io::Error::other(e)))??;
        tracing::info!(path = %self.path.display(), "document updated: isOn set to false");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Ordered stream of decoded snapshots from a running watcher.
pub struct Subscription {
    stream: ReceiverStream<Result<ActuatorState>>,
    task: JoinHandle<()>,
}

impl Stream for Subscription {
    type Item = Result<ActuatorState>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
