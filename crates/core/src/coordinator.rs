//! Applies auth transitions to the cache
//!
//! The coordinator owns the auth-event subscription for as long as it lives.
//! Dropping it aborts the listening task, which drops the receiver and so
//! unsubscribes, whichever way the owning scope exits.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::CacheControl;
use crate::types::AuthEvent;

/// What an auth transition does to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEffect {
    /// Identity changed: every cached value may belong to someone else.
    InvalidateAll,
    /// Signed out: nothing identity-bound may stay readable.
    Clear,
    Nothing,
}

pub fn effect_of(event: &AuthEvent) -> CacheEffect {
    match event {
        AuthEvent::SignedIn => CacheEffect::InvalidateAll,
        AuthEvent::SignedOut => CacheEffect::Clear,
        _ => CacheEffect::Nothing,
    }
}

fn apply(effect: CacheEffect, control: &dyn CacheControl) {
    match effect {
        CacheEffect::InvalidateAll => control.invalidate_all(),
        CacheEffect::Clear => control.clear(),
        CacheEffect::Nothing => {}
    }
}

/// Scoped subscription of a cache to an auth event stream.
#[must_use = "dropping the coordinator unsubscribes immediately"]
pub struct AuthEventCoordinator {
    task: Option<JoinHandle<()>>,
}

impl AuthEventCoordinator {
    /// Starts applying events from `events` to `control`.
    pub fn spawn(events: broadcast::Receiver<AuthEvent>, control: Arc<dyn CacheControl>) -> Self {
        let task = tokio::spawn(run(events, control));
        Self { task: Some(task) }
    }

    /// Unsubscribes and waits for the listening task to stop.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Waits until the event stream ends on its own (every sender dropped).
    pub async fn closed(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for AuthEventCoordinator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(mut events: broadcast::Receiver<AuthEvent>, control: Arc<dyn CacheControl>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let effect = effect_of(&event);
                debug!(?event, ?effect, "auth event");
                apply(effect, control.as_ref());
            }
            Err(RecvError::Lagged(missed)) => {
                // A missed sign-out must not leave data readable.
                warn!(missed, "auth events dropped; clearing cache");
                control.clear();
            }
            Err(RecvError::Closed) => {
                debug!("auth event stream closed");
                break;
            }
        }
    }
}
