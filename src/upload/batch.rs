//! Batch driver for upload runs.
//!
//! A run takes a snapshot of retryable jobs and pushes them through the
//! upload endpoint in consecutive waves of at most [`BATCH_SIZE`]: every
//! upload in a wave is issued concurrently, and the next wave is admitted
//! only once all of them have settled. A failed upload settles its own item
//! and nothing else; the run as a whole cannot fail.

use std::future::Future;
use std::sync::mpsc::Sender;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::upload::types::{UploadEvent, UploadJob, UploadStatus, FILE_EXISTS_MESSAGE};

/// Uploads in flight at once; the run's only admission-control knob.
pub const BATCH_SIZE: usize = 3;

/// Server message substring identifying the name-conflict failure.
const FILE_EXISTS_TOKEN: &str = "file already exists";

/// Why a single transfer failed. Contained per item; never escapes a run.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Run the full set of jobs against the server.
pub async fn run_all(api: &ApiClient, jobs: &[UploadJob], events: &Sender<UploadEvent>) {
    run(jobs, events, |job| {
        let events = events.clone();
        async move { transfer(api, &job, &events).await }
    })
    .await;
}

/// Drive jobs through `transfer` in sequential waves of [`BATCH_SIZE`],
/// emitting `Started`/`Settled` around each attempt. Generic over the
/// transfer future so the admission behavior is testable without a server.
pub async fn run<F, Fut>(jobs: &[UploadJob], events: &Sender<UploadEvent>, transfer: F)
where
    F: Fn(UploadJob) -> Fut,
    Fut: Future<Output = Result<(), TransferError>>,
{
    if jobs.is_empty() {
        return;
    }

    info!(count = jobs.len(), "starting upload run");

    for batch in jobs.chunks(BATCH_SIZE) {
        let wave = batch.iter().map(|job| {
            let events = events.clone();
            let job = job.clone();
            let transfer = &transfer;
            async move {
                let id = job.id;
                let name = job.payload.name.clone();
                let _ = events.send(UploadEvent::Started(id));

                let status = match transfer(job).await {
                    Ok(()) => UploadStatus::Success,
                    Err(err) => {
                        warn!(file = %name, error = %err, "upload failed");
                        UploadStatus::Error(failure_message(&err))
                    }
                };
                let _ = events.send(UploadEvent::Settled(id, status));
            }
        });
        join_all(wave).await;
    }

    info!("upload run settled");
}

/// Read the payload from disk and stream it out, forwarding byte progress
/// as events keyed by the job's id.
pub async fn transfer(
    api: &ApiClient,
    job: &UploadJob,
    events: &Sender<UploadEvent>,
) -> Result<(), TransferError> {
    let bytes = tokio::fs::read(&job.payload.path).await?;

    let id = job.id;
    let progress = events.clone();
    api.upload_file(
        &job.payload.name,
        &job.payload.content_type,
        bytes,
        move |percent| {
            let _ = progress.send(UploadEvent::Progress(id, percent));
        },
    )
    .await?;

    Ok(())
}

/// Only the known name-conflict cause gets a user-facing tag; everything
/// else surfaces as a bare error state.
fn failure_message(err: &TransferError) -> Option<String> {
    match err {
        TransferError::Api(api_err)
            if api_err
                .server_message()
                .is_some_and(|message| message.contains(FILE_EXISTS_TOKEN)) =>
        {
            Some(FILE_EXISTS_MESSAGE.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::queue::{QueueStats, UploadQueue};
    use crate::upload::types::FilePayload;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::Arc;

    use reqwest::StatusCode;
    use uuid::Uuid;

    fn payload(name: &str) -> FilePayload {
        FilePayload {
            name: name.to_string(),
            path: format!("/tmp/{name}").into(),
            size: 64,
            content_type: "image/png".to_string(),
        }
    }

    fn queue_of(n: usize) -> UploadQueue {
        let mut queue = UploadQueue::default();
        queue.add_files((0..n).map(|i| payload(&format!("file{i}.png"))));
        queue
    }

    fn drain(rx: &Receiver<UploadEvent>) -> Vec<UploadEvent> {
        rx.try_iter().collect()
    }

    fn server_error(message: &str) -> TransferError {
        TransferError::Api(ApiError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        })
    }

    fn event_position(events: &[UploadEvent], id: Uuid, started: bool) -> usize {
        events
            .iter()
            .position(|event| match event {
                UploadEvent::Started(event_id) if started => *event_id == id,
                UploadEvent::Settled(event_id, _) if !started => *event_id == id,
                _ => false,
            })
            .expect("event missing")
    }

    #[tokio::test]
    async fn admits_at_most_three_and_waits_for_each_batch() {
        let queue = queue_of(7);
        let jobs = queue.retryable_jobs();
        let (tx, rx) = channel();

        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        run(&jobs, &tx, |_job| {
            let active = active.clone();
            let high_water = high_water.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(high_water.load(Ordering::SeqCst), 3);

        let events = drain(&rx);
        assert_eq!(events.len(), 14); // 7 started + 7 settled

        // Every settle of batch k precedes every start of batch k+1.
        for boundary in [3, 6] {
            let last_settle = jobs[boundary - 3..boundary]
                .iter()
                .map(|job| event_position(&events, job.id, false))
                .max()
                .unwrap();
            let first_start = jobs[boundary..]
                .iter()
                .map(|job| event_position(&events, job.id, true))
                .min()
                .unwrap();
            assert!(last_settle < first_start);
        }
    }

    #[tokio::test]
    async fn seven_successes_reach_complete_stats() {
        let mut queue = queue_of(7);
        let jobs = queue.retryable_jobs();
        let (tx, rx) = channel();

        run(&jobs, &tx, |_job| async { Ok(()) }).await;

        for event in drain(&rx) {
            queue.apply(event);
        }

        let stats = queue.stats();
        assert_eq!(
            stats,
            QueueStats {
                total: 7,
                succeeded: 7,
                failed: 0,
                in_flight: 0,
            }
        );
        assert!(stats.all_complete());
    }

    #[tokio::test]
    async fn failures_settle_independently_of_siblings() {
        let mut queue = queue_of(2);
        let jobs = queue.retryable_jobs();
        let bad = jobs[1].id;
        let (tx, rx) = channel();

        run(&jobs, &tx, |job| async move {
            if job.id == bad {
                Err(server_error("connection reset"))
            } else {
                Ok(())
            }
        })
        .await;

        for event in drain(&rx) {
            queue.apply(event);
        }

        let stats = queue.stats();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        // generic failures carry no message tag
        assert_eq!(queue.items()[1].message(), None);
    }

    #[tokio::test]
    async fn name_conflict_gets_the_fixed_tag_and_stays_retryable() {
        let mut queue = queue_of(1);
        let jobs = queue.retryable_jobs();
        let (tx, rx) = channel();

        run(&jobs, &tx, |_job| async {
            Err(server_error("failed to upload file: file already exists"))
        })
        .await;

        for event in drain(&rx) {
            queue.apply(event);
        }

        assert_eq!(queue.items()[0].message(), Some(FILE_EXISTS_MESSAGE));
        assert_eq!(queue.retryable_jobs().len(), 1);
    }

    #[tokio::test]
    async fn second_run_reincludes_only_the_failed_item() {
        let mut queue = queue_of(2);
        let jobs = queue.retryable_jobs();
        let bad = jobs[1].id;
        let (tx, rx) = channel();

        run(&jobs, &tx, |job| async move {
            if job.id == bad {
                Err(server_error("boom"))
            } else {
                Ok(())
            }
        })
        .await;
        for event in drain(&rx) {
            queue.apply(event);
        }

        let retry_jobs = queue.retryable_jobs();
        assert_eq!(retry_jobs.len(), 1);
        assert_eq!(retry_jobs[0].id, bad);

        run(&retry_jobs, &tx, |_job| async { Ok(()) }).await;
        for event in drain(&rx) {
            queue.apply(event);
        }

        let stats = queue.stats();
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn empty_run_emits_no_events() {
        let (tx, rx) = channel();
        run(&[], &tx, |_job| async { Ok(()) }).await;
        assert!(drain(&rx).is_empty());
    }

    #[tokio::test]
    async fn transfer_surfaces_read_failures_without_touching_the_network() {
        let api = ApiClient::new("http://localhost:1");
        let (tx, _rx) = channel();
        let job = UploadJob {
            id: Uuid::new_v4(),
            payload: FilePayload {
                name: "gone.png".to_string(),
                path: "/definitely/not/here/gone.png".into(),
                size: 1,
                content_type: "image/png".to_string(),
            },
        };

        let err = transfer(&api, &job, &tx).await.unwrap_err();
        assert!(matches!(err, TransferError::Read(_)));
        assert_eq!(failure_message(&err), None);
    }
}
