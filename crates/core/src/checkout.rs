//! Checkout initiation: create a payment session, then leave for it

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{AuthProvider, CheckoutFunction, Navigator};
use crate::cache::CacheControl;
use crate::error::{Error, Result};
use crate::fetcher::SUBSCRIPTION_KEY;
use crate::types::CheckoutRequest;

const GENERIC_FAILURE: &str = "Failed to create checkout session";

/// Lifecycle of one checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutState {
    #[default]
    Idle,
    Requesting,
    /// Navigation to the payment page was issued; the current context is
    /// expected to go away.
    Redirecting,
    Failed,
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutState::Idle => write!(f, "idle"),
            CheckoutState::Requesting => write!(f, "requesting"),
            CheckoutState::Redirecting => write!(f, "redirecting"),
            CheckoutState::Failed => write!(f, "failed"),
        }
    }
}

/// Where a successful checkout sent the browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub url: String,
}

/// One-shot checkout mutation. On success the subscription cache entry is
/// invalidated before navigating, so the next read after returning from the
/// payment provider refetches.
pub struct CheckoutInitiator {
    auth: Arc<dyn AuthProvider>,
    function: Arc<dyn CheckoutFunction>,
    navigator: Arc<dyn Navigator>,
    cache: Arc<dyn CacheControl>,
    state: Mutex<CheckoutState>,
}

impl CheckoutInitiator {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        function: Arc<dyn CheckoutFunction>,
        navigator: Arc<dyn Navigator>,
        cache: Arc<dyn CacheControl>,
    ) -> Self {
        Self {
            auth,
            function,
            navigator,
            cache,
            state: Mutex::new(CheckoutState::Idle),
        }
    }

    pub fn state(&self) -> CheckoutState {
        *self.state.lock()
    }

    /// Creates a checkout session for `price_id` / `plan_tier` and navigates
    /// to it.
    ///
    /// Either both the cache invalidation and the navigation happen, or
    /// neither does and an error is returned.
    pub async fn start_checkout(&self, price_id: &str, plan_tier: &str) -> Result<CheckoutRedirect> {
        let Some(identity) = self.auth.current_identity().await else {
            return self.fail(Error::AuthRequired);
        };

        self.set_state(CheckoutState::Requesting);
        let request = CheckoutRequest {
            price_id: price_id.to_string(),
            plan_tier: plan_tier.to_string(),
        };
        debug!(price_id, plan_tier, "creating checkout session");

        let response = match self.function.create_checkout(&identity, &request).await {
            Ok(response) => response,
            Err(e) => {
                let message = e.message.unwrap_or_else(|| GENERIC_FAILURE.to_string());
                return self.fail(Error::CheckoutCreationFailed(message));
            }
        };

        if let Some(message) = response.error {
            return self.fail(Error::CheckoutCreationFailed(message));
        }

        let Some(url) = response.url.filter(|u| !u.trim().is_empty()) else {
            return self.fail(Error::InvalidCheckoutResponse);
        };

        self.cache.invalidate(SUBSCRIPTION_KEY);
        self.set_state(CheckoutState::Redirecting);
        info!(url = %url, "redirecting to checkout");
        self.navigator.navigate(&url);

        Ok(CheckoutRedirect { url })
    }

    fn set_state(&self, state: CheckoutState) {
        *self.state.lock() = state;
    }

    fn fail<T>(&self, error: Error) -> Result<T> {
        self.set_state(CheckoutState::Failed);
        debug!(error = %error, "checkout failed");
        Err(error)
    }
}

impl fmt::Debug for CheckoutInitiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutInitiator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
