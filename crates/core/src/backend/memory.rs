//! In-process implementations of the backend traits
//!
//! Used for tests and offline runs. Each one counts its calls so callers can
//! assert on how often the network would have been hit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::error::{FunctionError, StoreError, StoreErrorKind};
use crate::types::{AuthEvent, CheckoutRequest, CheckoutResponse, Identity, Subscription};

use super::{AuthProvider, CheckoutFunction, Navigator, SubscriptionStore};

const EVENT_CAPACITY: usize = 16;

/// Auth provider holding a single optional session in memory.
pub struct MemoryAuth {
    identity: RwLock<Option<Identity>>,
    events: broadcast::Sender<AuthEvent>,
    lookups: AtomicUsize,
}

impl MemoryAuth {
    pub fn anonymous() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity: RwLock::new(None),
            events,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        let auth = Self::anonymous();
        *auth.identity.write() = Some(identity);
        auth
    }

    /// Replaces the session and emits `SignedIn`.
    pub fn sign_in(&self, identity: Identity) {
        *self.identity.write() = Some(identity);
        self.emit(AuthEvent::SignedIn);
    }

    /// Drops the session and emits `SignedOut`.
    pub fn sign_out(&self) {
        *self.identity.write() = None;
        self.emit(AuthEvent::SignedOut);
    }

    /// Emits an event without touching the session.
    pub fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Number of `current_identity` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn current_identity(&self) -> Option<Identity> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.identity.read().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Subscription rows keyed by owner, with optional latency and failure
/// injection.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    rows: RwLock<Vec<(String, Subscription)>>,
    failure: RwLock<Option<StoreError>>,
    latency: Option<Duration>,
    queries: AtomicUsize,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every query, keeping it in flight for `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, user_id: &str, subscription: Subscription) {
        self.rows.write().push((user_id.to_string(), subscription));
    }

    /// Replaces every row owned by `user_id`.
    pub fn replace(&self, user_id: &str, subscription: Subscription) {
        let mut rows = self.rows.write();
        rows.retain(|(owner, _)| owner != user_id);
        rows.push((user_id.to_string(), subscription));
    }

    /// Makes every following query fail with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<StoreError>) {
        *self.failure.write() = error;
    }

    /// Number of queries issued so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn find_entitled(
        &self,
        identity: &Identity,
        statuses: &[&str],
    ) -> Result<Subscription, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.failure.read().clone() {
            return Err(err);
        }

        let mut matching: Vec<Subscription> = self
            .rows
            .read()
            .iter()
            .filter(|(owner, sub)| {
                owner == &identity.user_id && statuses.iter().any(|s| *s == sub.status.as_str())
            })
            .map(|(_, sub)| sub.clone())
            .collect();

        match matching.len() {
            0 => Err(StoreError::not_found()),
            1 => Ok(matching.remove(0)),
            n => Err(StoreError::new(
                StoreErrorKind::Other,
                format!("expected at most one entitled subscription, found {n}"),
            )),
        }
    }
}

/// Checkout function answering with a scripted response.
pub struct MemoryCheckout {
    response: RwLock<Result<CheckoutResponse, FunctionError>>,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl MemoryCheckout {
    pub fn responding(response: CheckoutResponse) -> Self {
        Self {
            response: RwLock::new(Ok(response)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A checkout that redirects to `url`.
    pub fn redirecting_to(url: &str) -> Self {
        Self::responding(CheckoutResponse {
            url: Some(url.to_string()),
            error: None,
        })
    }

    pub fn failing(error: FunctionError) -> Self {
        Self {
            response: RwLock::new(Err(error)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CheckoutFunction for MemoryCheckout {
    async fn create_checkout(
        &self,
        _identity: &Identity,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, FunctionError> {
        self.requests.lock().push(request.clone());
        self.response.read().clone()
    }
}

/// Navigator that records target URLs instead of leaving the page.
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.visited.lock().push(url.to_string());
    }
}
