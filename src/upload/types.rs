use std::path::PathBuf;

use uuid::Uuid;

/// Fixed tag shown for the known name-conflict failure; every other failure
/// is surfaced as a bare error state.
pub const FILE_EXISTS_MESSAGE: &str = "file exists";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    /// Failed; the message is set only for recognized causes.
    Error(Option<String>),
}

impl UploadStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, UploadStatus::Success | UploadStatus::Error(_))
    }

    /// Eligible for (re-)inclusion in the next upload run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadStatus::Pending | UploadStatus::Error(_))
    }
}

/// What we know about a selected file before any byte is read.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: Uuid,
    pub payload: FilePayload,
    pub status: UploadStatus,
}

impl UploadItem {
    /// Diagnostic tag, present only on recognized failures.
    pub fn message(&self) -> Option<&str> {
        match &self.status {
            UploadStatus::Error(message) => message.as_deref(),
            _ => None,
        }
    }
}

/// Snapshot of one item handed to the batch driver for a run.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: Uuid,
    pub payload: FilePayload,
}

/// Events the batch driver emits while a run is in flight. The UI thread
/// applies them to the queue; the driver never touches queue state itself.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The item's request is about to be issued.
    Started(Uuid),
    /// Percentage of the item's bytes handed to the transport so far.
    Progress(Uuid, u8),
    /// The item reached `Success` or `Error` for this attempt.
    Settled(Uuid, UploadStatus),
}
