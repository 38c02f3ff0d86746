//! The in-flight request table (spec §4.4, §8).
//!
//! Every outbound command gets a `request_id` that identifies its reply.
//! Ids are handed out from a counter that wraps at [`crate::config::ID_WRAP`]
//! rather than at `u16::MAX`, matching the device firmware's own generator.
//! A wrapped id that collides with a still-pending request bumps past it
//! rather than silently clobbering the older request's completion channel.

use crate::config::ID_WRAP;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// What a pending request is waiting to hear back.
pub struct Waiter {
    pub method: String,
    pub reply: oneshot::Sender<serde_json::Value>,
    /// Set for requests sent with `security`, so a 301 reply can be
    /// decrypted with the same key the request announced.
    pub nonce: Option<[u8; 16]>,
}

/// Table of outstanding requests, keyed by `request_id`.
pub struct PendingTable {
    next_id: u16,
    waiters: HashMap<u16, Waiter>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self { next_id: 0, waiters: HashMap::new() }
    }

    /// Reserve the next free id and register its waiter, returning the id
    /// to embed in the outgoing envelope and the receiver half to await.
    pub fn register(&mut self, method: &str) -> (u16, oneshot::Receiver<serde_json::Value>) {
        self.register_with_nonce(method, None)
    }

    /// Like [`register`](Self::register), but remembers the AES key
    /// announced in the request's `security.nonce` so a later 301 reply can
    /// be decrypted.
    pub fn register_with_nonce(&mut self, method: &str, nonce: Option<[u8; 16]>) -> (u16, oneshot::Receiver<serde_json::Value>) {
        let (tx, rx) = oneshot::channel();
        let id = self.next_free_id();
        self.waiters.insert(id, Waiter { method: method.to_string(), reply: tx, nonce });
        (id, rx)
    }

    /// The nonce stashed for `id` by [`register_with_nonce`](Self::register_with_nonce), if any.
    pub fn nonce_of(&self, id: u16) -> Option<[u8; 16]> {
        self.waiters.get(&id).and_then(|w| w.nonce)
    }

    fn next_free_id(&mut self) -> u16 {
        loop {
            let id = self.next_id;
            self.next_id = (self.next_id + 1) % ID_WRAP;
            if !self.waiters.contains_key(&id) {
                return id;
            }
        }
    }

    /// Complete and remove a pending request. Returns `false` if `id` was
    /// not (or no longer) outstanding — e.g. it already timed out.
    pub fn complete(&mut self, id: u16, body: serde_json::Value) -> bool {
        match self.waiters.remove(&id) {
            Some(waiter) => waiter.reply.send(body).is_ok(),
            None => false,
        }
    }

    /// Drop `id` from the table without completing it — used once a
    /// request's timeout has fired so a late reply is ignored rather than
    /// matched to a waiter that no longer exists.
    pub fn abandon(&mut self, id: u16) {
        self.waiters.remove(&id);
    }

    /// Drain every pending waiter, dropping their sender halves so awaiting
    /// callers observe a closed channel — used on disconnect.
    pub fn fail_all(&mut self) {
        self.waiters.clear();
    }

    pub fn method_of(&self, id: u16) -> Option<&str> {
        self.waiters.get(&id).map(|w| w.method.as_str())
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }
}

impl Default for PendingTable {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increment_and_wrap_at_id_wrap() {
        let mut table = PendingTable::new();
        table.next_id = ID_WRAP - 1;
        let (id, _rx) = table.register("app_start");
        assert_eq!(id, ID_WRAP - 1);
        let (next, _rx2) = table.register("app_start");
        assert_eq!(next, 0);
    }

    #[test]
    fn wrapped_id_skips_a_still_pending_request() {
        let mut table = PendingTable::new();
        table.next_id = ID_WRAP - 1;
        let (first, _rx1) = table.register("get_status");
        assert_eq!(first, ID_WRAP - 1);
        // id 0 is about to be reused; pre-occupy it to force a skip.
        let (tx, _rx_unused) = oneshot::channel();
        table.waiters.insert(0, Waiter { method: "busy".into(), reply: tx, nonce: None });
        let (third, _rx3) = table.register("get_clean_summary");
        assert_eq!(third, 1);
    }

    #[tokio::test]
    async fn complete_delivers_body_to_registered_receiver() {
        let mut table = PendingTable::new();
        let (id, rx) = table.register("get_status");
        assert!(table.complete(id, serde_json::json!({"result": [{"battery": 100}]})));
        let body = rx.await.unwrap();
        assert_eq!(body["result"][0]["battery"], 100);
    }

    #[test]
    fn complete_on_unknown_id_is_a_noop() {
        let mut table = PendingTable::new();
        assert!(!table.complete(999, serde_json::json!(null)));
    }

    #[test]
    fn fail_all_empties_the_table() {
        let mut table = PendingTable::new();
        table.register("app_start");
        table.register("get_status");
        assert_eq!(table.len(), 2);
        table.fail_all();
        assert_eq!(table.len(), 0);
    }
}
