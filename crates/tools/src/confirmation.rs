//! Confirmation Handlers
//!
//! The executor asks a `ConfirmationHandler` before running a command that
//! is not plainly safe. The call may suspend for as long as a human takes
//! to answer; the executor races it against the session's cancellation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use devpilot_core::StreamEvent;

use crate::safety::SafetyTier;

/// What is being approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub session_id: String,
    pub tool_name: String,
    /// Human-readable description, usually the raw command
    pub description: String,
    pub tier: SafetyTier,
}

/// Approval callback. Returns `true` to allow execution.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool;
}

/// Approves everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmationHandler for AutoConfirm {
    async fn confirm(&self, _request: &ConfirmationRequest) -> bool {
        true
    }
}

/// Declines everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

#[async_trait]
impl ConfirmationHandler for DenyAll {
    async fn confirm(&self, _request: &ConfirmationRequest) -> bool {
        false
    }
}

/// Interactive approval over the caller's event stream.
///
/// Each request is announced as a `StreamEvent::ConfirmationRequest` and
/// parked on a oneshot channel until `resolve()` is called with its id.
/// A closed event channel or a dropped request counts as a decline.
pub struct ChannelConfirmation {
    event_tx: mpsc::Sender<StreamEvent>,
    /// Key: request_id, Value: oneshot sender to unblock the waiting future.
    pending: Mutex<PendingMap>,
}

type PendingMap = HashMap<String, oneshot::Sender<bool>>;

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forgets a request once its waiter is gone, including a waiter dropped
/// mid-wait by a cancelled session.
struct PendingEntry<'a> {
    pending: &'a Mutex<PendingMap>,
    request_id: String,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.request_id);
    }
}

impl ChannelConfirmation {
    pub fn new(event_tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            event_tx,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Answer a pending request. Unknown ids are ignored.
    pub fn resolve(&self, request_id: &str, approved: bool) {
        let sender = lock(&self.pending).remove(request_id);
        if let Some(tx) = sender {
            // The waiter may already be gone (cancelled session)
            let _ = tx.send(approved);
        }
    }

    /// Decline every pending request.
    pub fn cancel_pending(&self) {
        // Dropping the senders wakes each waiter with a RecvError
        lock(&self.pending).clear();
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

#[async_trait]
impl ConfirmationHandler for ChannelConfirmation {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        let request_id = Uuid::new_v4().to_string();
        let (resp_tx, resp_rx) = oneshot::channel::<bool>();

        lock(&self.pending).insert(request_id.clone(), resp_tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            request_id: request_id.clone(),
        };

        let event = StreamEvent::ConfirmationRequest {
            request_id: request_id.clone(),
            session_id: request.session_id.clone(),
            tool_name: request.tool_name.clone(),
            description: request.description.clone(),
            tier: request.tier.as_str().to_string(),
        };

        if self.event_tx.send(event).await.is_err() {
            tracing::warn!(tool = %request.tool_name, "Confirmation channel closed; declining");
            return false;
        }

        match resp_rx.await {
            Ok(approved) => approved,
            Err(_) => false,
        }
    }
}
