use crate::item::{Priority, QueueItem, QueueItemStatus};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub retrying: usize,
    pub by_priority: HashMap<String, usize>,
}

pub fn compute(items: &[QueueItem]) -> QueueStats {
    let mut stats = QueueStats::default();
    stats.total = items.len();
    for item in items {
        match item.status {
            QueueItemStatus::Queued => stats.queued += 1,
            QueueItemStatus::Processing => stats.processing += 1,
            QueueItemStatus::Completed => stats.completed += 1,
            QueueItemStatus::Failed => stats.failed += 1,
            QueueItemStatus::Cancelled => stats.cancelled += 1,
            QueueItemStatus::Retrying => stats.retrying += 1,
        }
        if matches!(item.status, QueueItemStatus::Queued | QueueItemStatus::Retrying) {
            let key = match item.priority {
                Priority::Low => "LOW",
                Priority::Normal => "NORMAL",
                Priority::High => "HIGH",
                Priority::Urgent => "URGENT",
            };
            *stats.by_priority.entry(key.to_string()).or_insert(0) += 1;
        }
    }
    stats
}
