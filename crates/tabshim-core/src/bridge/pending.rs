//! Pending-request table and correlation ids.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;

use super::wire::RETURN_ID_PREFIX;
use crate::error::TabsError;

static NEXT_RETURN_ID: AtomicU64 = AtomicU64::new(1);

/// Issue a correlation id unique for the lifetime of the process.
pub fn next_return_id() -> String {
    format!(
        "{RETURN_ID_PREFIX}{}",
        NEXT_RETURN_ID.fetch_add(1, Ordering::Relaxed)
    )
}

type Completion = oneshot::Sender<Result<Value, TabsError>>;

/// Outstanding requests, keyed by correlation id.
///
/// An entry leaves the table on its one terminal transition. Anything
/// arriving for an id that is not in the table is stale and ignored.
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<String, Completion>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and get the receiving end of its completion.
    pub fn register(&self, return_id: &str) -> oneshot::Receiver<Result<Value, TabsError>> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(return_id.to_string(), tx);
        }
        rx
    }

    /// Complete the request registered under `return_id`.
    ///
    /// Returns `false` when no such request is pending (already completed,
    /// or never issued); the outcome is dropped in that case.
    pub fn complete(&self, return_id: &str, outcome: Result<Value, TabsError>) -> bool {
        let Some(tx) = self.take(return_id) else {
            return false;
        };
        // The caller may have stopped waiting; that is not our failure.
        let _ = tx.send(outcome);
        true
    }

    /// Forget a request without completing it.
    pub fn cancel(&self, return_id: &str) -> bool {
        self.take(return_id).is_some()
    }

    /// Drop every pending request; their receivers observe closure.
    pub fn close_all(&self) -> usize {
        self.entries
            .lock()
            .map(|mut entries| entries.drain().count())
            .unwrap_or(0)
    }

    pub fn contains(&self, return_id: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(return_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self, return_id: &str) -> Option<Completion> {
        self.entries
            .lock()
            .ok()
            .and_then(|mut entries| entries.remove(return_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_return_ids_never_collide() {
        let ids: HashSet<String> = (0..5000).map(|_| next_return_id()).collect();
        assert_eq!(ids.len(), 5000);
        assert!(ids.iter().all(|id| id.starts_with("return-")));
    }

    #[test]
    fn test_return_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| next_return_id()).collect::<Vec<_>>()))
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 2000);
    }

    #[tokio::test]
    async fn test_complete_resolves_once() {
        let table = PendingTable::new();
        let rx = table.register("return-a");
        assert!(table.contains("return-a"));

        assert!(table.complete("return-a", Ok(Value::from(1))));
        assert!(!table.complete("return-a", Ok(Value::from(2))));
        assert!(table.is_empty());

        assert_eq!(rx.await.unwrap().unwrap(), Value::from(1));
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let table = PendingTable::new();
        assert!(!table.complete("return-never", Ok(Value::Null)));
        assert!(!table.cancel("return-never"));
    }

    #[tokio::test]
    async fn test_close_all_drops_senders() {
        let table = PendingTable::new();
        let a = table.register("return-x");
        let b = table.register("return-y");
        assert_eq!(table.close_all(), 2);
        assert!(a.await.is_err());
        assert!(b.await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_order_completion() {
        let table = PendingTable::new();
        let first = table.register("return-1st");
        let second = table.register("return-2nd");

        table.complete("return-2nd", Ok(Value::from("b")));
        table.complete("return-1st", Ok(Value::from("a")));

        assert_eq!(first.await.unwrap().unwrap(), Value::from("a"));
        assert_eq!(second.await.unwrap().unwrap(), Value::from("b"));
    }
}
