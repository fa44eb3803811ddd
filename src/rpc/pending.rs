//! Correlation table for outstanding calls.
//!
//! Each call gets the next id (starting at 1, never reused within a
//! connection) and a oneshot slot. The read loop resolves slots by id;
//! responses with unknown ids find nothing and are discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{EdgeError, Result};

/// An outstanding call waiting for its response.
#[derive(Debug)]
pub struct PendingRequest {
    /// Method that was called.
    pub method: String,
    /// When the call was registered.
    pub created: Instant,
    tx: oneshot::Sender<Result<Value>>,
}

/// Table of outstanding calls keyed by id.
#[derive(Debug)]
pub struct PendingCalls {
    next_id: AtomicU64,
    calls: Mutex<HashMap<u64, PendingRequest>>,
}

impl PendingCalls {
    /// Create an empty table; the first id handed out is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate an id and register a waiter for it.
    pub fn register(&self, method: &str) -> (u64, oneshot::Receiver<Result<Value>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut calls = self.calls.lock();
        calls.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                created: Instant::now(),
                tx,
            },
        );
        tracing::debug!(id, method, pending = calls.len(), "registered pending call");

        (id, rx)
    }

    /// Deliver an outcome to the waiter for `id`.
    ///
    /// Returns false when no call with that id is outstanding.
    pub fn resolve(&self, id: u64, outcome: Result<Value>) -> bool {
        let Some(request) = self.calls.lock().remove(&id) else {
            return false;
        };
        tracing::debug!(
            id,
            method = %request.method,
            elapsed_ms = request.created.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "resolved pending call"
        );
        // Receiver may already be gone if the caller gave up.
        let _ = request.tx.send(outcome);
        true
    }

    /// Drop the entry for `id` without resolving it.
    pub fn remove(&self, id: u64) -> Option<PendingRequest> {
        self.calls.lock().remove(&id)
    }

    /// Reject every outstanding call with the error produced by `make_err`.
    pub fn fail_all(&self, make_err: impl Fn() -> EdgeError) -> usize {
        let drained: Vec<_> = self.calls.lock().drain().collect();
        let count = drained.len();
        for (_, request) in drained {
            let _ = request.tx.send(Err(make_err()));
        }
        count
    }

    /// Ids of outstanding calls, ascending.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.calls.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Check whether no calls are outstanding.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}
