//! Cooperative cancellation for in-flight pipeline requests (§4.7, §5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct CancellationRegistry {
    flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request_id: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.lock().unwrap().insert(request_id.to_string(), flag.clone());
        flag
    }

    /// Marks the request for cancellation; idempotent, per §5's double-cancel rule.
    pub fn cancel(&self, request_id: &str) -> bool {
        match self.flags.lock().unwrap().get(request_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self, request_id: &str) -> bool {
        self.flags
            .lock()
            .unwrap()
            .get(request_id)
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn unregister(&self, request_id: &str) {
        self.flags.lock().unwrap().remove(request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_observable() {
        let registry = CancellationRegistry::new();
        registry.register("r1");
        assert!(!registry.is_cancelled("r1"));
        assert!(registry.cancel("r1"));
        assert!(registry.cancel("r1"));
        assert!(registry.is_cancelled("r1"));
    }

    #[test]
    fn cancel_unknown_request_is_a_no_op() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel("missing"));
    }
}
