//! External collaborators of the subscription core
//!
//! The core owns none of these systems; it only calls them through the traits
//! below. Implementations:
//! - `memory`: in-process fakes (always available)
//! - `rest`: HTTP adapters for a PostgREST-style hosted backend (behind `http` feature)
//!
//! [`Backend`] bundles one shared instance of each capability and is passed
//! explicitly to every component built from it.

pub mod memory;

#[cfg(feature = "http")]
pub mod rest;

pub use memory::{MemoryAuth, MemoryCheckout, MemorySubscriptionStore, RecordingNavigator};

#[cfg(feature = "http")]
pub use rest::{RestCheckoutFunction, RestClient, RestSubscriptionStore};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::cache::QueryCache;
use crate::checkout::CheckoutInitiator;
use crate::coordinator::AuthEventCoordinator;
use crate::error::{FunctionError, StoreError};
use crate::fetcher::SubscriptionFetcher;
use crate::types::{AuthEvent, CheckoutRequest, CheckoutResponse, Entitlement, Identity, Subscription};

/// Authentication provider: current session plus a stream of transitions.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in identity, or `None` for an anonymous caller.
    async fn current_identity(&self) -> Option<Identity>;

    /// Subscribes to auth transitions. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Subscription rows, filtered by owner and status.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Returns the single row owned by `identity` whose status is in
    /// `statuses`. Zero rows is an error of kind
    /// [`NotFound`](crate::error::StoreErrorKind::NotFound).
    async fn find_entitled(
        &self,
        identity: &Identity,
        statuses: &[&str],
    ) -> Result<Subscription, StoreError>;
}

/// Remote "create checkout" function.
#[async_trait]
pub trait CheckoutFunction: Send + Sync {
    async fn create_checkout(
        &self,
        identity: &Identity,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, FunctionError>;
}

/// Redirects the browsing context. Fire-and-forget.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

#[async_trait]
impl<A: AuthProvider + ?Sized> AuthProvider for Arc<A> {
    async fn current_identity(&self) -> Option<Identity> {
        (**self).current_identity().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        (**self).subscribe()
    }
}

#[async_trait]
impl<S: SubscriptionStore + ?Sized> SubscriptionStore for Arc<S> {
    async fn find_entitled(
        &self,
        identity: &Identity,
        statuses: &[&str],
    ) -> Result<Subscription, StoreError> {
        (**self).find_entitled(identity, statuses).await
    }
}

#[async_trait]
impl<C: CheckoutFunction + ?Sized> CheckoutFunction for Arc<C> {
    async fn create_checkout(
        &self,
        identity: &Identity,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, FunctionError> {
        (**self).create_checkout(identity, request).await
    }
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate(&self, url: &str) {
        (**self).navigate(url)
    }
}

/// The process-wide capability object: one shared instance of each external
/// collaborator and of the entitlement cache.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn SubscriptionStore>,
    pub checkout: Arc<dyn CheckoutFunction>,
    pub navigator: Arc<dyn Navigator>,
    cache: QueryCache<Entitlement>,
}

impl Backend {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn SubscriptionStore>,
        checkout: Arc<dyn CheckoutFunction>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            auth,
            store,
            checkout,
            navigator,
            cache: QueryCache::new(),
        }
    }

    pub fn cache(&self) -> &QueryCache<Entitlement> {
        &self.cache
    }

    pub fn fetcher(&self) -> SubscriptionFetcher {
        SubscriptionFetcher::new(
            Arc::clone(&self.auth),
            Arc::clone(&self.store),
            self.cache.clone(),
        )
    }

    pub fn checkout_initiator(&self) -> CheckoutInitiator {
        CheckoutInitiator::new(
            Arc::clone(&self.auth),
            Arc::clone(&self.checkout),
            Arc::clone(&self.navigator),
            Arc::new(self.cache.clone()),
        )
    }

    /// Subscribes the entitlement cache to the auth provider's events for as
    /// long as the returned coordinator lives.
    pub fn coordinator(&self) -> AuthEventCoordinator {
        AuthEventCoordinator::spawn(self.auth.subscribe(), Arc::new(self.cache.clone()))
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
