//! Per-session mutual exclusion and cancellation.
//!
//! Holding a [`SessionGuard`] is what "RUNNING" means: at most one guard
//! exists per session id, and a second `acquire` fails immediately instead of
//! waiting. Each guard carries a cancellation flag that
//! [`SessionRegistry::cancel`] raises; the engine watches it while a step is
//! in flight. Dropping the guard releases the session.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Sessions currently executing in this process.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    active: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id`, or `None` if it is already running.
    pub fn acquire(&self, session_id: &str) -> Option<SessionGuard> {
        let mut active = self.active.lock();
        if active.contains_key(session_id) {
            return None;
        }
        let (tx, rx) = watch::channel(false);
        active.insert(session_id.to_string(), tx);

        Some(SessionGuard {
            session_id: session_id.to_string(),
            registry: self.clone(),
            cancel_rx: rx,
        })
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.active.lock().contains_key(session_id)
    }

    /// Request cancellation of a running session. Returns `false` if it is not running.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.active.lock().get(session_id) {
            Some(tx) => {
                tx.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub fn running(&self) -> usize {
        self.active.lock().len()
    }
}

/// Exclusive claim on a session.
#[derive(Debug)]
pub struct SessionGuard {
    session_id: String,
    registry: SessionRegistry,
    cancel_rx: watch::Receiver<bool>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&mut self) {
        if self.cancel_rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives in the registry for as long as this guard does.
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.active.lock().remove(&self.session_id);
    }
}
