//! The upload pipeline: preview staging, destination normalization and the
//! FIFO transfer queue with its single in-flight slot.
//!
//! An item moves through four distinct shapes instead of one struct with
//! optional fields: selected file, preview, queued, in progress, completed.
//! Each transition drops what the next stage no longer needs (completed
//! items carry no bytes).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::gallery::SourceId;
use crate::UPLOAD_BASE;

/// Identifies one selected file across its whole lifecycle.
/// `{file_name}|{modified_at_ms}|{selected_at_ms}` so re-selecting the same
/// file later yields a distinct key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn derive(file_name: &str, modified_at_ms: u64, selected_at_ms: u64) -> Self {
        Self(format!("{file_name}|{modified_at_ms}|{selected_at_ms}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw file contents. Debug never prints the bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBody(#[serde(with = "serde_bytes")] Vec<u8>);

impl FileBody {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for FileBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileBody({} bytes)", self.0.len())
    }
}

/// Upload destination directory. Construction normalizes to exactly one
/// leading and one trailing slash; empty input means the source root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPath(String);

impl DestinationPath {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut path = if raw.starts_with('/') {
            raw
        } else {
            format!("/{raw}")
        };
        if !path.ends_with('/') {
            path.push('/');
        }
        Self(path)
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the shell hands over when the user picks files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub modified_at_ms: u64,
    pub data: FileBody,
}

/// Staged for upload, destination not yet chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewItem {
    pub key: ItemKey,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub file: FileBody,
}

/// Confirmed and waiting for the transfer slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedItem {
    pub key: ItemKey,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub source_id: SourceId,
    pub destination: DestinationPath,
    pub file: FileBody,
}

/// Occupying the single transfer slot. Bytes already left with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InProgressItem {
    pub key: ItemKey,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub source_id: SourceId,
    pub destination: DestinationPath,
    pub started_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub status: Option<u16>,
    pub message: String,
}

/// Terminal record, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedItem {
    pub key: ItemKey,
    pub full_path: String,
    pub size: u64,
    pub started_at_ms: u64,
    pub error: Option<UploadFailure>,
}

impl CompletedItem {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything the driver needs to put the dequeued item on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedUpload {
    pub key: ItemKey,
    pub content_type: String,
    pub body: FileBody,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadQueue {
    preview: Vec<PreviewItem>,
    queued: VecDeque<QueuedItem>,
    in_flight: Option<InProgressItem>,
    completed: Vec<CompletedItem>,
}

impl UploadQueue {
    pub fn preview(&self) -> &[PreviewItem] {
        &self.preview
    }

    pub fn queued(&self) -> impl Iterator<Item = &QueuedItem> {
        self.queued.iter()
    }

    pub fn in_flight(&self) -> Option<&InProgressItem> {
        self.in_flight.as_ref()
    }

    pub fn completed(&self) -> &[CompletedItem] {
        &self.completed
    }

    /// Queued items not yet started. The in-flight item is reported
    /// separately.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queued.len()
    }

    pub fn has_preview(&self) -> bool {
        !self.preview.is_empty()
    }

    /// Stage newly selected files. Selection order is preserved and becomes
    /// upload order.
    pub fn add_files(&mut self, files: Vec<SelectedFile>, selected_at_ms: u64) {
        for file in files {
            let key = ItemKey::derive(&file.name, file.modified_at_ms, selected_at_ms);
            self.preview.push(PreviewItem {
                key,
                file_name: file.name,
                content_type: file.content_type,
                size: file.data.len() as u64,
                file: file.data,
            });
        }
    }

    pub fn cancel_preview(&mut self) {
        self.preview.clear();
    }

    /// Move the whole preview batch to the tail of the queue in one step,
    /// stamping each item with the destination and the source it will be
    /// sent to.
    pub fn confirm(&mut self, source_id: SourceId, destination: DestinationPath) {
        for item in self.preview.drain(..) {
            self.queued.push_back(QueuedItem {
                key: item.key,
                file_name: item.file_name,
                content_type: item.content_type,
                size: item.size,
                source_id: source_id.clone(),
                destination: destination.clone(),
                file: item.file,
            });
        }
    }

    /// Claim the transfer slot for the queue head, if the slot is free.
    pub fn start_next(&mut self, now_ms: u64) -> Option<StartedUpload> {
        if self.in_flight.is_some() {
            return None;
        }
        let item = self.queued.pop_front()?;
        let url = format!(
            "{}/{}{}{}",
            UPLOAD_BASE, item.source_id, item.destination, item.file_name
        );
        self.in_flight = Some(InProgressItem {
            key: item.key.clone(),
            file_name: item.file_name,
            content_type: item.content_type.clone(),
            size: item.size,
            source_id: item.source_id,
            destination: item.destination,
            started_at_ms: now_ms,
        });
        Some(StartedUpload {
            key: item.key,
            content_type: item.content_type,
            body: item.file,
            url,
        })
    }

    /// Settle the in-flight item. Returns false when the key does not match
    /// the slot (a completion for an item that is no longer current).
    pub fn complete(&mut self, key: &ItemKey, error: Option<UploadFailure>) -> bool {
        match &self.in_flight {
            Some(current) if current.key == *key => {}
            _ => return false,
        }
        let item = match self.in_flight.take() {
            Some(item) => item,
            None => return false,
        };
        self.completed.push(CompletedItem {
            key: item.key,
            full_path: format!("{}{}", item.destination, item.file_name),
            size: item.size,
            started_at_ms: item.started_at_ms,
            error,
        });
        true
    }
}
