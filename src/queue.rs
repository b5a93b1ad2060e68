//! Durable FIFO queue of submissions that could not be sent.
//!
//! The queue is persisted as a whole ordered list after every mutation, so a crash
//! right after [`PendingQueue::enqueue`] or [`PendingQueue::remove`] loses nothing.
//! [`FileQueueStore`] keeps the list in a JSON file under a fixed key and replaces
//! the file through an atomic rename.

use crate::error::{InstapaperError, Result};
use crate::traits::QueueStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Key under which the ordered list is stored in the queue file.
pub const QUEUE_STORAGE_KEY: &str = "instapaper.queued_urls";

/// A URL save attempt deferred for a later retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    /// Stable identity used to remove exactly this entry
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    #[serde(default = "Utc::now")]
    pub enqueued_at: DateTime<Utc>,
}

impl PendingSubmission {
    /// Creates a submission. Blank title or selection are treated as absent.
    pub fn new(url: impl Into<String>, title: Option<&str>, selection: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            title: crate::utils::non_blank(title),
            selection: crate::utils::non_blank(selection),
            enqueued_at: Utc::now(),
        }
    }
}

/// Ordered queue of pending submissions backed by a [`QueueStore`].
///
/// All access goes through one async mutex, so persisted state and the in-memory
/// copy never diverge.
#[derive(Clone)]
pub struct PendingQueue {
    store: Arc<dyn QueueStore>,
    entries: Arc<Mutex<Option<Vec<PendingSubmission>>>>,
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue").finish_non_exhaustive()
    }
}

impl PendingQueue {
    /// Creates a queue over the given store. Nothing is read until first use.
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            entries: Arc::new(Mutex::new(None)),
        }
    }

    /// Appends a submission at the tail and persists the list.
    pub async fn enqueue(&self, submission: PendingSubmission) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let mut entries = self.loaded(&mut guard).await?.clone();
        debug!(url = %submission.url, position = entries.len(), "Queueing submission");
        entries.push(submission);
        self.store.store(&entries).await?;
        *guard = Some(entries);
        Ok(())
    }

    /// Returns every queued submission, oldest first.
    pub async fn peek_all(&self) -> Result<Vec<PendingSubmission>> {
        let mut guard = self.entries.lock().await;
        Ok(self.loaded(&mut guard).await?.clone())
    }

    /// Removes one submission by id and persists the list.
    ///
    /// Returns `false` when the entry was no longer queued.
    pub async fn remove(&self, submission: &PendingSubmission) -> Result<bool> {
        let mut guard = self.entries.lock().await;
        let mut entries = self.loaded(&mut guard).await?.clone();
        let Some(index) = entries.iter().position(|e| e.id == submission.id) else {
            return Ok(false);
        };
        entries.remove(index);
        self.store.store(&entries).await?;
        *guard = Some(entries);
        Ok(true)
    }

    /// Empties the queue.
    pub async fn clear(&self) -> Result<()> {
        let mut guard = self.entries.lock().await;
        self.store.store(&[]).await?;
        *guard = Some(Vec::new());
        Ok(())
    }

    pub async fn len(&self) -> Result<usize> {
        let mut guard = self.entries.lock().await;
        Ok(self.loaded(&mut guard).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn loaded<'a>(
        &self,
        slot: &'a mut Option<Vec<PendingSubmission>>,
    ) -> Result<&'a Vec<PendingSubmission>> {
        if slot.is_none() {
            let entries = self.store.load().await?;
            debug!(count = entries.len(), "Loaded pending queue");
            *slot = Some(entries);
        }
        Ok(slot.get_or_insert_with(Vec::new))
    }
}

/// Queue store persisting to a JSON file.
///
/// The file holds a JSON object whose [`QUEUE_STORAGE_KEY`] entry is the ordered list
/// of `{id, url, title, selection, enqueued_at}` records.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_document(&self) -> Result<HashMap<String, serde_json::Value>> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                InstapaperError::storage_error(format!(
                    "Failed to parse {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(InstapaperError::storage_error(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load(&self) -> Result<Vec<PendingSubmission>> {
        let mut document = self.read_document().await?;
        match document.remove(QUEUE_STORAGE_KEY) {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                InstapaperError::storage_error(format!("Queued submissions are corrupt: {e}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn store(&self, entries: &[PendingSubmission]) -> Result<()> {
        let storage_err = |e: std::io::Error| {
            InstapaperError::storage_error(format!("Failed to write {}: {e}", self.path.display()))
        };

        // Unrelated keys in the same file are preserved.
        let mut document = match self.read_document().await {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Overwriting unreadable queue file");
                HashMap::new()
            }
        };
        let list = serde_json::to_value(entries)
            .map_err(|e| InstapaperError::storage_error(format!("Failed to encode queue: {e}")))?;
        document.insert(QUEUE_STORAGE_KEY.to_string(), list);
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| InstapaperError::storage_error(format!("Failed to encode queue: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(storage_err)?;
        }

        let tmp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let mut file = fs::File::create(&tmp_path).await.map_err(storage_err)?;
        file.write_all(&bytes).await.map_err(storage_err)?;
        file.sync_all().await.map_err(storage_err)?;
        drop(file);
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(storage_err(e));
        }

        debug!(path = %self.path.display(), count = entries.len(), "Persisted pending queue");
        Ok(())
    }
}

/// Non-durable queue store, for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    entries: Mutex<Vec<PendingSubmission>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<PendingSubmission>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn store(&self, entries: &[PendingSubmission]) -> Result<()> {
        *self.entries.lock().await = entries.to_vec();
        Ok(())
    }
}
