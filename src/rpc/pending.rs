//! Request id -> completion handle map.
//!
//! Every in-flight call owns exactly one entry. An entry leaves the map in
//! one of two ways: the reader resolves it with a response, or the caller
//! cancels it (timeout, write failure, or the call future being dropped).
//! Whichever happens first wins; the other finds nothing and becomes a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::error;

use crate::models::Response;
use crate::rpc::error::RpcError;

/// Concurrent registry of calls awaiting a response.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
}

impl PendingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a completion handle for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::DuplicateId`] if `id` is already pending. This only
    /// happens if the id allocator hands out the same id twice.
    pub fn register(self: &Arc<Self>, id: u64) -> Result<PendingHandle, RpcError> {
        let (tx, rx) = oneshot::channel();

        {
            let mut entries = self.lock();
            if entries.contains_key(&id) {
                error!("Request id {} is already pending; id allocator is broken", id);
                return Err(RpcError::DuplicateId(id));
            }
            entries.insert(id, tx);
        }

        Ok(PendingHandle {
            id,
            rx,
            registry: Arc::clone(self),
        })
    }

    /// Remove the entry for `id` and complete it with `response`.
    ///
    /// Returns `false` if nothing was waiting for `id`, including the case
    /// where the waiter went away between removal and delivery.
    pub fn resolve(&self, id: u64, response: Response) -> bool {
        let sender = self.lock().remove(&id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Remove the entry for `id` without completing it.
    ///
    /// Returns `true` if an entry was removed.
    pub fn cancel(&self, id: u64) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Whether a call with `id` is still waiting.
    pub fn contains(&self, id: u64) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of calls currently waiting.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no call is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Response>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Single-shot receiving side of a registry entry.
///
/// Dropping the handle cancels its entry, so an abandoned call never leaves
/// anything behind in the registry.
#[derive(Debug)]
pub struct PendingHandle {
    id: u64,
    rx: oneshot::Receiver<Response>,
    registry: Arc<PendingRegistry>,
}

impl PendingHandle {
    /// Id of the call this handle waits for.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the reader to resolve this entry.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Cancelled`] if the entry was removed without a
    /// response.
    pub async fn recv(&mut self) -> Result<Response, RpcError> {
        (&mut self.rx)
            .await
            .map_err(|_| RpcError::Cancelled { id: self.id })
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        self.registry.cancel(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(id: u64, result: serde_json::Value) -> Response {
        Response {
            jsonrpc: "2.0".to_string(),
            result,
            error: None,
            id,
        }
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = Arc::new(PendingRegistry::new());
        let mut handle = registry.register(1).unwrap();
        assert_eq!(handle.id(), 1);
        assert!(registry.contains(1));

        assert!(registry.resolve(1, response(1, json!("pong"))));
        assert!(!registry.contains(1));

        let received = handle.recv().await.unwrap();
        assert_eq!(received.result, json!("pong"));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let registry = Arc::new(PendingRegistry::new());
        let _first = registry.register(7).unwrap();

        let second = registry.register(7);
        assert!(matches!(second, Err(RpcError::DuplicateId(7))));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_returns_false() {
        let registry = Arc::new(PendingRegistry::new());
        let _handle = registry.register(1).unwrap();

        assert!(!registry.resolve(99, response(99, json!(null))));
        assert!(registry.contains(1));
    }

    #[tokio::test]
    async fn test_resolve_is_single_shot() {
        let registry = Arc::new(PendingRegistry::new());
        let _handle = registry.register(3).unwrap();

        assert!(registry.resolve(3, response(3, json!(1))));
        assert!(!registry.resolve(3, response(3, json!(2))));
    }

    #[tokio::test]
    async fn test_cancel_then_late_resolve_is_unmatched() {
        let registry = Arc::new(PendingRegistry::new());
        let mut handle = registry.register(5).unwrap();

        assert!(registry.cancel(5));
        assert!(!registry.resolve(5, response(5, json!(null))));
        assert!(matches!(handle.recv().await, Err(RpcError::Cancelled { id: 5 })));
    }

    #[tokio::test]
    async fn test_resolve_isolated_between_entries() {
        let registry = Arc::new(PendingRegistry::new());
        let mut first = registry.register(1).unwrap();
        let _second = registry.register(2).unwrap();

        assert!(registry.resolve(1, response(1, json!("one"))));
        assert_eq!(first.recv().await.unwrap().result, json!("one"));
        assert!(registry.contains(2));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_removes_entry() {
        let registry = Arc::new(PendingRegistry::new());
        let handle = registry.register(11).unwrap();
        assert_eq!(registry.len(), 1);

        drop(handle);
        assert!(registry.is_empty());
        assert!(!registry.resolve(11, response(11, json!(null))));
    }
}
