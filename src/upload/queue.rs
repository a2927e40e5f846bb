//! The session's working set of upload items.
//!
//! All state lives here and changes only through explicit methods: user
//! actions (`add_files`, `remove`, `clear`) and driver events (`apply`).
//! Network work happens elsewhere; this type stays synchronous and
//! deterministic so every transition is directly testable.

use std::collections::HashMap;

use uuid::Uuid;

use crate::upload::types::{FilePayload, UploadEvent, UploadItem, UploadJob, UploadStatus};

#[derive(Default)]
pub struct UploadQueue {
    items: Vec<UploadItem>,
    /// Percent sent per item, present only while that item is uploading.
    progress: HashMap<Uuid, u8>,
}

/// Counts derived from the working set; recomputed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub in_flight: usize,
}

impl QueueStats {
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn all_complete(&self) -> bool {
        self.total > 0 && self.settled() == self.total
    }
}

impl UploadQueue {
    /// Append one pending item per payload, preserving selection order.
    /// Duplicate names are allowed; ids are what identify items.
    pub fn add_files(&mut self, selection: impl IntoIterator<Item = FilePayload>) {
        for payload in selection {
            self.items.push(UploadItem {
                id: Uuid::new_v4(),
                payload,
                status: UploadStatus::Pending,
            });
        }
    }

    /// Remove an item and its progress entry. Refused (returns `false`)
    /// while the item is mid-transfer; removing an absent id is a no-op.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(idx) = self.items.iter().position(|item| item.id == id) else {
            return true;
        };

        if self.items[idx].status == UploadStatus::Uploading {
            return false;
        }

        self.items.remove(idx);
        self.progress.remove(&id);
        true
    }

    /// Drop the whole working set. Refused while any item is in flight.
    pub fn clear(&mut self) -> bool {
        if self
            .items
            .iter()
            .any(|item| item.status == UploadStatus::Uploading)
        {
            return false;
        }

        self.items.clear();
        self.progress.clear();
        true
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn progress(&self, id: Uuid) -> Option<u8> {
        self.progress.get(&id).copied()
    }

    pub fn retryable_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status.is_retryable())
            .count()
    }

    /// Snapshot of every `pending` or `error` item, in working-set order.
    /// Items already succeeded or currently uploading are skipped.
    pub fn retryable_jobs(&self) -> Vec<UploadJob> {
        self.items
            .iter()
            .filter(|item| item.status.is_retryable())
            .map(|item| UploadJob {
                id: item.id,
                payload: item.payload.clone(),
            })
            .collect()
    }

    /// Apply one driver event. Events that would produce an illegal
    /// transition (stale ids, duplicate settles) are dropped.
    pub fn apply(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Started(id) => {
                if let Some(item) = self.item_mut(id) {
                    if item.status.is_retryable() {
                        item.status = UploadStatus::Uploading;
                        self.progress.insert(id, 0);
                    }
                }
            }
            UploadEvent::Progress(id, percent) => {
                let uploading = self
                    .items
                    .iter()
                    .any(|item| item.id == id && item.status == UploadStatus::Uploading);
                if uploading {
                    let entry = self.progress.entry(id).or_insert(0);
                    // Monotone per item, capped at 100.
                    *entry = (*entry).max(percent.min(100));
                }
            }
            UploadEvent::Settled(id, status) => {
                debug_assert!(status.is_settled());
                if let Some(item) = self.item_mut(id) {
                    if item.status == UploadStatus::Uploading {
                        item.status = status;
                    }
                }
                self.progress.remove(&id);
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.items.len(),
            ..QueueStats::default()
        };
        for item in &self.items {
            match item.status {
                UploadStatus::Success => stats.succeeded += 1,
                UploadStatus::Error(_) => stats.failed += 1,
                UploadStatus::Uploading => stats.in_flight += 1,
                UploadStatus::Pending => {}
            }
        }
        stats
    }

    fn item_mut(&mut self, id: Uuid) -> Option<&mut UploadItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::types::FILE_EXISTS_MESSAGE;

    fn payload(name: &str) -> FilePayload {
        FilePayload {
            name: name.to_string(),
            path: format!("/tmp/{name}").into(),
            size: 1024,
            content_type: "image/png".to_string(),
        }
    }

    fn queue_with(names: &[&str]) -> UploadQueue {
        let mut queue = UploadQueue::default();
        queue.add_files(names.iter().map(|name| payload(name)));
        queue
    }

    #[test]
    fn added_items_keep_order_and_unique_ids() {
        let mut queue = UploadQueue::default();
        queue.add_files([payload("a.png"), payload("b.png")]);
        queue.add_files([payload("a.png")]); // same name is fine

        let items = queue.items();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].payload.name, "a.png");
        assert_eq!(items[1].payload.name, "b.png");
        assert_eq!(items[2].payload.name, "a.png");
        assert!(items.iter().all(|item| item.status == UploadStatus::Pending));

        let mut ids: Vec<_> = items.iter().map(|item| item.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn remove_is_refused_while_uploading() {
        let mut queue = queue_with(&["a.png"]);
        let id = queue.items()[0].id;

        queue.apply(UploadEvent::Started(id));
        assert!(!queue.remove(id));
        assert_eq!(queue.items().len(), 1);

        queue.apply(UploadEvent::Settled(id, UploadStatus::Success));
        assert!(queue.remove(id));
        assert!(queue.is_empty());
        assert_eq!(queue.stats(), QueueStats::default());
    }

    #[test]
    fn remove_of_absent_id_is_a_noop() {
        let mut queue = queue_with(&["a.png"]);
        assert!(queue.remove(Uuid::new_v4()));
        assert_eq!(queue.items().len(), 1);
    }

    #[test]
    fn clear_is_refused_while_any_item_uploads() {
        let mut queue = queue_with(&["a.png", "b.png"]);
        let id = queue.items()[0].id;

        queue.apply(UploadEvent::Started(id));
        assert!(!queue.clear());

        queue.apply(UploadEvent::Settled(id, UploadStatus::Error(None)));
        assert!(queue.clear());
        assert!(queue.is_empty());
    }

    #[test]
    fn transitions_are_confined() {
        let mut queue = queue_with(&["a.png"]);
        let id = queue.items()[0].id;

        // pending -> uploading -> success
        queue.apply(UploadEvent::Started(id));
        assert_eq!(queue.items()[0].status, UploadStatus::Uploading);
        queue.apply(UploadEvent::Settled(id, UploadStatus::Success));
        assert_eq!(queue.items()[0].status, UploadStatus::Success);

        // success never leaves success
        queue.apply(UploadEvent::Started(id));
        assert_eq!(queue.items()[0].status, UploadStatus::Success);
        queue.apply(UploadEvent::Settled(id, UploadStatus::Error(None)));
        assert_eq!(queue.items()[0].status, UploadStatus::Success);
    }

    #[test]
    fn error_items_can_reenter_uploading() {
        let mut queue = queue_with(&["a.png"]);
        let id = queue.items()[0].id;

        queue.apply(UploadEvent::Started(id));
        queue.apply(UploadEvent::Settled(
            id,
            UploadStatus::Error(Some(FILE_EXISTS_MESSAGE.to_string())),
        ));
        assert_eq!(queue.items()[0].message(), Some(FILE_EXISTS_MESSAGE));
        assert_eq!(queue.retryable_jobs().len(), 1);

        queue.apply(UploadEvent::Started(id));
        assert_eq!(queue.items()[0].status, UploadStatus::Uploading);
        // the message is gone once the retry begins
        assert_eq!(queue.items()[0].message(), None);
    }

    #[test]
    fn progress_entry_exists_iff_uploading() {
        let mut queue = queue_with(&["a.png", "b.png"]);
        let first = queue.items()[0].id;
        let second = queue.items()[1].id;

        assert_eq!(queue.progress(first), None);

        // progress for a pending item is dropped
        queue.apply(UploadEvent::Progress(first, 40));
        assert_eq!(queue.progress(first), None);

        queue.apply(UploadEvent::Started(first));
        assert_eq!(queue.progress(first), Some(0));
        queue.apply(UploadEvent::Progress(first, 40));
        assert_eq!(queue.progress(first), Some(40));

        // monotone: a stale lower percentage never shows
        queue.apply(UploadEvent::Progress(first, 30));
        assert_eq!(queue.progress(first), Some(40));
        queue.apply(UploadEvent::Progress(first, 100));
        assert_eq!(queue.progress(first), Some(100));

        // settling removes the entry either way
        queue.apply(UploadEvent::Settled(first, UploadStatus::Success));
        assert_eq!(queue.progress(first), None);

        queue.apply(UploadEvent::Started(second));
        queue.apply(UploadEvent::Progress(second, 10));
        queue.apply(UploadEvent::Settled(second, UploadStatus::Error(None)));
        assert_eq!(queue.progress(second), None);
    }

    #[test]
    fn retry_selection_skips_succeeded_and_uploading() {
        let mut queue = queue_with(&["a.png", "b.png", "c.png", "d.png"]);
        let ids: Vec<_> = queue.items().iter().map(|item| item.id).collect();

        queue.apply(UploadEvent::Started(ids[0]));
        queue.apply(UploadEvent::Settled(ids[0], UploadStatus::Success));
        queue.apply(UploadEvent::Started(ids[1]));
        queue.apply(UploadEvent::Settled(ids[1], UploadStatus::Error(None)));
        queue.apply(UploadEvent::Started(ids[2]));

        let jobs = queue.retryable_jobs();
        let job_ids: Vec<_> = jobs.iter().map(|job| job.id).collect();
        assert_eq!(job_ids, vec![ids[1], ids[3]]);
    }

    #[test]
    fn stats_track_every_state() {
        let mut queue = queue_with(&["a.png", "b.png", "c.png"]);
        let ids: Vec<_> = queue.items().iter().map(|item| item.id).collect();

        queue.apply(UploadEvent::Started(ids[0]));
        queue.apply(UploadEvent::Settled(ids[0], UploadStatus::Success));
        queue.apply(UploadEvent::Started(ids[1]));

        let stats = queue.stats();
        assert_eq!(
            stats,
            QueueStats {
                total: 3,
                succeeded: 1,
                failed: 0,
                in_flight: 1,
            }
        );
        assert!(!stats.all_complete());

        queue.apply(UploadEvent::Settled(ids[1], UploadStatus::Error(None)));
        queue.apply(UploadEvent::Started(ids[2]));
        queue.apply(UploadEvent::Settled(ids[2], UploadStatus::Success));

        let stats = queue.stats();
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert!(stats.all_complete());
    }

    #[test]
    fn empty_queue_is_never_complete() {
        let queue = UploadQueue::default();
        assert!(!queue.stats().all_complete());
    }
}
