//! Pending request table for the stream channel
//!
//! Every entry is removed exactly once: by the listener on a matching frame,
//! by its own deadline, by the waiting caller going away, or by disconnect.
//! All removals go through the same lock, so whichever comes first wins and
//! the others are no-ops.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    sync::oneshot,
    time::{sleep_until, Instant},
};

use crate::protocol::error::{A2AError, A2AResult};

type Completion = oneshot::Sender<A2AResult<Bytes>>;

/// Correlation table keyed by message id
#[derive(Clone, Default)]
pub(crate) struct PendingRequests {
    entries: Arc<Mutex<HashMap<String, Completion>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Completion>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id` with a deadline `timeout` from now
    ///
    /// Fails if `id` is already pending.
    pub fn register(&self, id: &str, timeout: Duration) -> A2AResult<PendingHandle> {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;

        let mut entries = self.lock();
        if entries.contains_key(id) {
            return Err(A2AError::Protocol(format!(
                "message id {id} is already pending"
            )));
        }
        entries.insert(id.to_string(), tx);
        drop(entries);

        Ok(PendingHandle {
            id: id.to_string(),
            table: self.clone(),
            rx: Some(rx),
            deadline,
            timeout,
        })
    }

    /// Remove and complete `id`; false when it was no longer pending
    pub fn fulfill(&self, id: &str, result: A2AResult<Bytes>) -> bool {
        let entry = self.lock().remove(id);
        match entry {
            // The waiter may have just given up; the entry is gone either way
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Remove `id` because its deadline passed; false when already removed
    pub fn expire(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Fail every pending entry, returning how many there were
    pub fn fail_all(&self, error: impl Fn() -> A2AError) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(error()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }
}

/// Caller side of a pending entry
///
/// Dropping the handle removes the entry.
pub(crate) struct PendingHandle {
    id: String,
    table: PendingRequests,
    rx: Option<oneshot::Receiver<A2AResult<Bytes>>>,
    deadline: Instant,
    timeout: Duration,
}

impl PendingHandle {
    /// Wait for the correlated reply or the deadline, whichever comes first
    pub async fn wait(mut self) -> A2AResult<Bytes> {
        let Some(mut rx) = self.rx.take() else {
            return Err(A2AError::Cancelled(format!("request {} already awaited", self.id)));
        };

        tokio::select! {
            completion = &mut rx => self.completed(completion),
            _ = sleep_until(self.deadline) => {
                if self.table.expire(&self.id) {
                    Err(A2AError::Timeout {
                        message_id: self.id.clone(),
                        after: self.timeout,
                    })
                } else {
                    // The listener removed the entry first; its value is on the way
                    let completion = rx.await;
                    self.completed(completion)
                }
            }
        }
    }

    fn completed(
        &self,
        completion: Result<A2AResult<Bytes>, oneshot::error::RecvError>,
    ) -> A2AResult<Bytes> {
        completion.unwrap_or_else(|_| {
            Err(A2AError::Cancelled(format!(
                "pending request {} was dropped",
                self.id
            )))
        })
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        self.table.expire(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn test_fulfill_wins_over_expiry() {
        let table = PendingRequests::new();
        let handle = table.register("m1", Duration::from_secs(5)).unwrap();

        assert!(table.fulfill("m1", Ok(Bytes::from_static(b"{}"))));
        assert!(!table.expire("m1"));
        assert!(!table.fulfill("m1", Ok(Bytes::new())));

        let body = assert_ok!(handle.wait().await);
        assert_eq!(&body[..], b"{}");
        assert_eq!(table.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_wins_over_late_fulfill() {
        let table = PendingRequests::new();
        let handle = table.register("m1", Duration::from_secs(2)).unwrap();

        let err = assert_err!(handle.wait().await);
        assert!(matches!(err, A2AError::Timeout { ref message_id, .. } if message_id == "m1"));

        assert!(!table.fulfill("m1", Ok(Bytes::new())));
        assert!(!table.contains("m1"));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let table = PendingRequests::new();
        let _first = table.register("m1", Duration::from_secs(5)).unwrap();
        assert!(table.register("m1", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_drop_removes_entry() {
        let table = PendingRequests::new();
        let handle = table.register("m1", Duration::from_secs(5)).unwrap();
        assert!(table.contains("m1"));

        drop(handle);
        assert!(!table.contains("m1"));
    }

    #[tokio::test]
    async fn test_fail_all_reaches_every_waiter() {
        let table = PendingRequests::new();
        let first = table.register("m1", Duration::from_secs(5)).unwrap();
        let second = table.register("m2", Duration::from_secs(5)).unwrap();

        assert_eq!(
            table.fail_all(|| A2AError::Cancelled("client disconnected".into())),
            2
        );

        assert!(matches!(first.wait().await, Err(A2AError::Cancelled(_))));
        assert!(matches!(second.wait().await, Err(A2AError::Cancelled(_))));
    }
}
