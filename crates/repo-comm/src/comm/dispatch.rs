//! Correlation-ID dispatch table: pending one-shot response handlers.
//!
//! The table is the only shared mutable state in the comm core. It is
//! written from caller tasks (insert at request-send time) and from the
//! listener task (remove at response time), so it sits behind a mutex.
//! Handlers are `FnOnce`: taking an entry removes it, which is what makes
//! at-most-once invocation structural rather than a convention.

use crate::message::Message;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// One-shot handler invoked with the matched response message.
pub type ResponseHandler = Box<dyn FnOnce(Message) + Send + 'static>;

/// Generate a fresh opaque correlation ID.
///
/// Always produced fresh, never derived from message content.
pub fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Map from correlation ID to the callback awaiting that response.
#[derive(Default)]
pub struct DispatchTable {
    entries: Mutex<HashMap<String, ResponseHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `id`. At most one live entry per ID;
    /// registering the same ID again replaces the previous handler.
    pub fn register(&self, id: impl Into<String>, handler: ResponseHandler) {
        self.lock().insert(id.into(), handler);
    }

    /// Remove and return the handler for `id`, if one is pending. Invoke
    /// the returned handler only after this call, so the entry is gone
    /// from the table before the callback runs.
    pub fn take(&self, id: &str) -> Option<ResponseHandler> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ResponseHandler>> {
        // A poisoned table would only mean a handler panicked mid-insert;
        // the map itself is still coherent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_correlation_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(correlation_id()));
        }
    }

    #[test]
    fn test_take_removes_entry() {
        let table = DispatchTable::new();
        table.register("id-1", Box::new(|_| {}));
        assert!(table.contains("id-1"));

        assert!(table.take("id-1").is_some());
        assert!(!table.contains("id-1"));
        assert!(table.take("id-1").is_none());
    }

    #[test]
    fn test_handler_runs_at_most_once() {
        let table = DispatchTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        table.register(
            "id-1",
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        if let Some(handler) = table.take("id-1") {
            handler(Message::new());
        }
        // Second delivery for the same ID finds nothing.
        assert!(table.take("id-1").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_replaces_existing_entry() {
        let table = DispatchTable::new();
        table.register("id-1", Box::new(|_| panic!("replaced handler ran")));
        table.register("id-1", Box::new(|_| {}));
        assert_eq!(table.len(), 1);

        if let Some(handler) = table.take("id-1") {
            handler(Message::new());
        }
    }
}
