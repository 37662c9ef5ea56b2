use async_trait::async_trait;
use serde_json::Value;

use crate::item::ItemContext;

/// Executes the work behind a single queue item. Implemented by the
/// orchestrator's pipeline; kept generic so this crate stays ignorant of
/// validation semantics.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item_type: &str, request: &Value, context: &ItemContext) -> Result<Value, String>;
}
