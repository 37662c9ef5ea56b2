//! §4.9 Dispatcher: pulls eligible items off the queue, respects a concurrency
//! cap, and retries failures with backoff before giving up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use crate::backoff::BackoffPolicy;
use crate::item::{dispatch_order, QueueItemStatus};
use crate::processor::ItemProcessor;
use crate::queue::ValidationQueue;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_concurrent_validations: usize,
    pub processing_interval: Duration,
    pub enable_priority_processing: bool,
    pub enable_retry_mechanism: bool,
    pub backoff: BackoffPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: 4,
            processing_interval: Duration::from_millis(250),
            enable_priority_processing: true,
            enable_retry_mechanism: true,
            backoff: BackoffPolicy::default(),
        }
    }
}

pub struct Dispatcher {
    queue: Arc<ValidationQueue>,
    processor: Arc<dyn ItemProcessor>,
    config: DispatcherConfig,
    semaphore: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(queue: Arc<ValidationQueue>, processor: Arc<dyn ItemProcessor>, config: DispatcherConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_validations.max(1)));
        Self { queue, processor, config, semaphore }
    }

    /// Runs until `shutdown` reports `true`. Each tick claims every eligible item
    /// it can get a permit for and spawns its processing independently, so a slow
    /// item never blocks scheduling of the rest of its tier.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.processing_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dispatcher shutdown requested, stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.dispatch_ready_items().await;
                }
                _ = self.queue.notified() => {
                    self.dispatch_ready_items().await;
                }
            }
        }
    }

    async fn dispatch_ready_items(&self) {
        let now = Utc::now();
        // Reserve a permit (synchronously, via `try_acquire_owned`) for every item
        // claimed here so a slot is never handed to an item before one actually
        // exists — claiming more items than there are free permits would strand
        // the excess in `Processing` forever (§4.9 concurrency contract).
        let claimed = self
            .queue
            .with_items_mut(|items| {
                if self.config.enable_priority_processing {
                    items.sort_by(dispatch_order);
                }
                let mut claimed = Vec::new();
                for item in items.iter_mut() {
                    let eligible = matches!(item.status, QueueItemStatus::Queued | QueueItemStatus::Retrying)
                        && item.scheduled_at <= now;
                    if !eligible {
                        continue;
                    }
                    let Ok(permit) = self.semaphore.clone().try_acquire_owned() else { break };
                    item.status = QueueItemStatus::Processing;
                    item.started_at = Some(now);
                    item.attempts += 1;
                    claimed.push((item.clone(), permit));
                }
                claimed
            })
            .await;

        for (item, permit) in claimed {
            let queue = self.queue.clone();
            let processor = self.processor.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let outcome = processor.process(&item.item_type, &item.request, &item.context).await;
                match outcome {
                    Ok(result) => {
                        queue
                            .with_items_mut(|items| {
                                if let Some(found) = items.iter_mut().find(|i| i.id == item.id) {
                                    found.status = QueueItemStatus::Completed;
                                    found.result = Some(result);
                                    found.completed_at = Some(Utc::now());
                                }
                            })
                            .await;
                    }
                    Err(err) => {
                        handle_failure(&queue, &item.id, item.attempts, item.max_attempts, &err, &config).await;
                    }
                }
            });
        }
    }
}

async fn handle_failure(
    queue: &ValidationQueue,
    id: &str,
    attempts: u32,
    max_attempts: u32,
    error: &str,
    config: &DispatcherConfig,
) {
    let retry = config.enable_retry_mechanism && attempts < max_attempts;
    if retry {
        let delay = config.backoff.delay_for_attempt(attempts);
        warn!(item_id = id, attempts, %error, ?delay, "item failed, scheduling retry");
        let retry_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        queue
            .with_items_mut(|items| {
                if let Some(found) = items.iter_mut().find(|i| i.id == id) {
                    found.status = QueueItemStatus::Retrying;
                    found.last_error = Some(error.to_string());
                    found.scheduled_at = retry_at;
                }
            })
            .await;
    } else {
        warn!(item_id = id, attempts, %error, "item failed permanently");
        queue
            .with_items_mut(|items| {
                if let Some(found) = items.iter_mut().find(|i| i.id == id) {
                    found.status = QueueItemStatus::Failed;
                    found.last_error = Some(error.to_string());
                    found.completed_at = Some(Utc::now());
                }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemContext;
    use crate::queue::ValidationQueue;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    struct CountingProcessor {
        calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait]
    impl ItemProcessor for CountingProcessor {
        async fn process(&self, _item_type: &str, _request: &Value, _context: &ItemContext) -> Result<Value, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_until {
                Err("transient".to_string())
            } else {
                Ok(json!({"ok": true}))
            }
        }
    }

    #[tokio::test]
    async fn successful_item_reaches_completed() {
        let queue = Arc::new(ValidationQueue::new(10, 3));
        let id = queue
            .enqueue(crate::item::Priority::Normal, "validate".into(), json!({}), ItemContext::default())
            .await
            .unwrap();
        let processor = Arc::new(CountingProcessor { calls: AtomicUsize::new(0), fail_until: 0 });
        let dispatcher = Dispatcher::new(
            queue.clone(),
            processor,
            DispatcherConfig { processing_interval: StdDuration::from_millis(10), ..Default::default() },
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { dispatcher.run(rx).await });

        let completed = timeout(StdDuration::from_secs(2), async {
            loop {
                if let Some(item) = queue.get(&id).await {
                    if item.status == QueueItemStatus::Completed {
                        return item;
                    }
                }
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        })
        .await
        .expect("item should complete");

        assert!(completed.result.is_some());
        let _ = tx.send(true);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn more_eligible_items_than_permits_never_strands_one_in_processing() {
        let queue = Arc::new(ValidationQueue::new(10, 1));
        let mut ids = Vec::new();
        for _ in 0..5 {
            let id = queue
                .enqueue(crate::item::Priority::Normal, "validate".into(), json!({}), ItemContext::default())
                .await
                .unwrap();
            ids.push(id);
        }
        let processor = Arc::new(CountingProcessor { calls: AtomicUsize::new(0), fail_until: 0 });
        let dispatcher = Dispatcher::new(
            queue.clone(),
            processor,
            DispatcherConfig {
                max_concurrent_validations: 2,
                processing_interval: StdDuration::from_millis(10),
                ..Default::default()
            },
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { dispatcher.run(rx).await });

        timeout(StdDuration::from_secs(2), async {
            loop {
                let stats = queue.get_stats().await;
                if stats.completed == ids.len() {
                    return;
                }
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        })
        .await
        .expect("every item should eventually complete, none stranded in processing");

        for id in &ids {
            let item = queue.get(id).await.unwrap();
            assert_eq!(item.status, QueueItemStatus::Completed);
        }
        let _ = tx.send(true);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn exhausted_retries_mark_item_failed() {
        let queue = Arc::new(ValidationQueue::new(10, 2));
        let id = queue
            .enqueue(crate::item::Priority::High, "validate".into(), json!({}), ItemContext::default())
            .await
            .unwrap();
        let processor = Arc::new(CountingProcessor { calls: AtomicUsize::new(0), fail_until: 100 });
        let dispatcher = Dispatcher::new(
            queue.clone(),
            processor,
            DispatcherConfig {
                processing_interval: StdDuration::from_millis(10),
                backoff: BackoffPolicy { base_delay: StdDuration::from_millis(1), max_delay: StdDuration::from_millis(5), jitter_ratio: 0.0 },
                ..Default::default()
            },
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { dispatcher.run(rx).await });

        let failed = timeout(StdDuration::from_secs(2), async {
            loop {
                if let Some(item) = queue.get(&id).await {
                    if item.status == QueueItemStatus::Failed {
                        return item;
                    }
                }
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        })
        .await
        .expect("item should eventually fail permanently");

        assert_eq!(failed.attempts, 2);
        let _ = tx.send(true);
        let _ = handle.await;
    }
}
