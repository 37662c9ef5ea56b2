//! §4.9 Priority queue: storage, admission control, and cancellation.

use crate::error::{QueueError, Result};
use crate::item::{ItemContext, Priority, QueueItem, QueueItemStatus};
use crate::stats::{self, QueueStats};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

pub struct ValidationQueue {
    items: Mutex<Vec<QueueItem>>,
    max_size: usize,
    default_max_attempts: u32,
    notify: Notify,
}

impl ValidationQueue {
    pub fn new(max_size: usize, default_max_attempts: u32) -> Self {
        Self { items: Mutex::new(Vec::new()), max_size, default_max_attempts, notify: Notify::new() }
    }

    /// Resolves once the dispatcher may have new work to look at. Best-effort: a
    /// spurious wake is harmless since the dispatcher just rescans.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub async fn enqueue(
        &self,
        priority: Priority,
        item_type: String,
        request: serde_json::Value,
        context: ItemContext,
    ) -> Result<String> {
        let mut guard = self.items.lock().await;
        let active = guard
            .iter()
            .filter(|i| matches!(i.status, QueueItemStatus::Queued | QueueItemStatus::Processing | QueueItemStatus::Retrying))
            .count();
        if active >= self.max_size {
            return Err(QueueError::AtCapacity { max_size: self.max_size });
        }
        let id = Uuid::new_v4().to_string();
        let item = QueueItem::new(id.clone(), priority, item_type, request, context, self.default_max_attempts);
        guard.push(item);
        drop(guard);
        self.notify.notify_one();
        Ok(id)
    }

    pub async fn cancel(&self, id: &str) -> Result<()> {
        let mut guard = self.items.lock().await;
        let item = guard.iter_mut().find(|i| i.id == id).ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if matches!(item.status, QueueItemStatus::Completed | QueueItemStatus::Failed | QueueItemStatus::Cancelled) {
            return Err(QueueError::AlreadyTerminal(id.to_string()));
        }
        item.status = QueueItemStatus::Cancelled;
        item.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Cancels every id it can; non-existent or already-terminal ids are reported
    /// back rather than aborting the whole batch.
    pub async fn cancel_batch(&self, ids: &[String]) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push((id.clone(), self.cancel(id).await));
        }
        results
    }

    pub async fn get_stats(&self) -> QueueStats {
        let guard = self.items.lock().await;
        stats::compute(&guard)
    }

    pub async fn get(&self, id: &str) -> Option<QueueItem> {
        let guard = self.items.lock().await;
        guard.iter().find(|i| i.id == id).cloned()
    }

    pub(crate) async fn snapshot_items(&self) -> Vec<QueueItem> {
        self.items.lock().await.clone()
    }

    /// All items regardless of status, newest-created last. Backs `GET
    /// /api/validation/queue/items`.
    pub async fn list_items(&self) -> Vec<QueueItem> {
        self.items.lock().await.clone()
    }

    /// Items currently occupying an execution slot. Backs `GET
    /// /api/validation/queue/processing`.
    pub async fn list_processing(&self) -> Vec<QueueItem> {
        self.items
            .lock()
            .await
            .iter()
            .filter(|i| i.status == QueueItemStatus::Processing)
            .cloned()
            .collect()
    }

    /// Removes every terminal item (`completed`, `failed`, `cancelled`) from the
    /// in-memory log. Used by the `queue/clear` API action; queued and processing
    /// items are left untouched.
    pub async fn clear_terminal(&self) -> usize {
        let mut guard = self.items.lock().await;
        let before = guard.len();
        guard.retain(|i| {
            !matches!(
                i.status,
                QueueItemStatus::Completed | QueueItemStatus::Failed | QueueItemStatus::Cancelled
            )
        });
        before - guard.len()
    }

    pub(crate) async fn with_items_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Vec<QueueItem>) -> R,
    {
        let mut guard = self.items.lock().await;
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn queue() -> ValidationQueue {
        ValidationQueue::new(10, 3)
    }

    #[tokio::test]
    async fn enqueue_then_stats_reflects_one_queued_item() {
        let q = queue();
        q.enqueue(Priority::Normal, "validate".into(), json!({}), ItemContext::default()).await.unwrap();
        let stats = q.get_stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.queued, 1);
    }

    #[tokio::test]
    async fn enqueue_past_capacity_is_rejected() {
        let q = ValidationQueue::new(1, 3);
        q.enqueue(Priority::Normal, "validate".into(), json!({}), ItemContext::default()).await.unwrap();
        let second = q.enqueue(Priority::Normal, "validate".into(), json!({}), ItemContext::default()).await;
        assert!(matches!(second, Err(QueueError::AtCapacity { .. })));
    }

    #[tokio::test]
    async fn cancel_moves_item_to_cancelled() {
        let q = queue();
        let id = q.enqueue(Priority::Low, "validate".into(), json!({}), ItemContext::default()).await.unwrap();
        q.cancel(&id).await.unwrap();
        let item = q.get(&id).await.unwrap();
        assert_eq!(item.status, QueueItemStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_unknown_id_errors() {
        let q = queue();
        assert!(matches!(q.cancel("missing").await, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn cancel_batch_reports_per_item_outcome() {
        let q = queue();
        let id = q.enqueue(Priority::Normal, "validate".into(), json!({}), ItemContext::default()).await.unwrap();
        let results = q.cancel_batch(&[id.clone(), "missing".to_string()]).await;
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }
}
