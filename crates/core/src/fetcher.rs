//! Current-subscription lookup, cached under a single key

use std::sync::Arc;

use tracing::debug;

use crate::backend::{AuthProvider, SubscriptionStore};
use crate::cache::{Lookup, QueryCache};
use crate::error::Result;
use crate::types::{Entitlement, ENTITLED_STATUSES};

/// Cache key of the caller's subscription.
pub const SUBSCRIPTION_KEY: &str = "subscription";

/// Exposes the caller's subscription as a lazily refreshed value.
///
/// Deduplication of concurrent lookups is left entirely to the cache.
#[derive(Clone)]
pub struct SubscriptionFetcher {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn SubscriptionStore>,
    cache: QueryCache<Entitlement>,
}

impl SubscriptionFetcher {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn SubscriptionStore>,
        cache: QueryCache<Entitlement>,
    ) -> Self {
        Self { auth, store, cache }
    }

    /// Queries the store directly, bypassing the cache.
    ///
    /// Anonymous callers get `None` without a query. A not-found result is
    /// `None` too; every other store error is returned.
    pub async fn fetch_subscription(&self) -> Result<Entitlement> {
        load(Arc::clone(&self.auth), Arc::clone(&self.store)).await
    }

    /// The cached subscription, fetched on first use and after invalidation.
    /// May return the previous value while a refetch is running.
    pub async fn current(&self) -> Result<Entitlement> {
        let auth = Arc::clone(&self.auth);
        let store = Arc::clone(&self.store);
        self.cache
            .read(SUBSCRIPTION_KEY, move || load(auth, store))
            .await
    }

    /// Like [`current`](Self::current), but never returns a value older than
    /// the latest invalidation.
    pub async fn refresh(&self) -> Result<Entitlement> {
        let auth = Arc::clone(&self.auth);
        let store = Arc::clone(&self.store);
        self.cache
            .revalidate(SUBSCRIPTION_KEY, move || load(auth, store))
            .await
    }

    /// What the cache currently holds, without fetching.
    pub fn cached(&self) -> Lookup<Entitlement> {
        self.cache.peek(SUBSCRIPTION_KEY)
    }
}

async fn load(auth: Arc<dyn AuthProvider>, store: Arc<dyn SubscriptionStore>) -> Result<Entitlement> {
    let Some(identity) = auth.current_identity().await else {
        debug!("no session; skipping subscription query");
        return Ok(None);
    };

    match store.find_entitled(&identity, ENTITLED_STATUSES).await {
        Ok(subscription) => Ok(Some(subscription)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
