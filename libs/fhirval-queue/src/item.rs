//! §3 `QueueItem` and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Retrying,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemContext {
    pub requested_by: String,
    pub request_id: String,
    pub batch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub priority: Priority,
    pub item_type: String,
    pub request: Value,
    pub context: ItemContext,
    pub status: QueueItemStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub result: Option<Value>,
}

impl QueueItem {
    pub fn new(
        id: String,
        priority: Priority,
        item_type: String,
        request: Value,
        context: ItemContext,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            priority,
            item_type,
            request,
            context,
            status: QueueItemStatus::Queued,
            attempts: 0,
            max_attempts,
            created_at: now,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            last_error: None,
            result: None,
        }
    }
}

/// Ordering used by the dispatcher's scheduling tick: strictly greater priority
/// first, ties broken by `created_at` ascending (§3, §8).
pub fn dispatch_order(a: &QueueItem, b: &QueueItem) -> std::cmp::Ordering {
    b.priority.cmp(&a.priority).then_with(|| a.created_at.cmp(&b.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(priority: Priority, created_at: DateTime<Utc>) -> QueueItem {
        let mut i = QueueItem::new("id".into(), priority, "validate".into(), json!({}), ItemContext::default(), 3);
        i.created_at = created_at;
        i
    }

    #[test]
    fn higher_priority_sorts_first() {
        let now = Utc::now();
        let low = item(Priority::Low, now);
        let urgent = item(Priority::Urgent, now);
        assert_eq!(dispatch_order(&urgent, &low), std::cmp::Ordering::Less);
    }

    #[test]
    fn ties_break_on_created_at_ascending() {
        let earlier = item(Priority::Normal, Utc::now() - chrono::Duration::seconds(10));
        let later = item(Priority::Normal, Utc::now());
        assert_eq!(dispatch_order(&earlier, &later), std::cmp::Ordering::Less);
    }
}
