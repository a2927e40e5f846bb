mod batch;
mod queue;
mod types;

pub use batch::run_all;
pub use queue::{QueueStats, UploadQueue};
pub use types::{FilePayload, UploadEvent, UploadItem, UploadJob, UploadStatus};
