//! Plansync Core - Subscription State Synchronization
//!
//! Keeps a caller's entitlement (subscription) state consistent with:
//! - asynchronous fetches from the subscription store
//! - the auth provider's sign-in / sign-out event stream
//! - a payment checkout that ends in a navigation away from the app
//!
//! The payment provider, the auth provider and storage are external
//! collaborators reached through the traits in [`backend`].

pub mod backend;
pub mod cache;
pub mod checkout;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod types;

pub use backend::{AuthProvider, Backend, CheckoutFunction, Navigator, SubscriptionStore};
pub use cache::{CacheControl, CacheStats, Lookup, QueryCache};
pub use checkout::{CheckoutInitiator, CheckoutRedirect, CheckoutState};
pub use config::{BackendConfig, PlansyncConfig};
pub use coordinator::{effect_of, AuthEventCoordinator, CacheEffect};
pub use error::{Error, FunctionError, Result, StoreError, StoreErrorKind};
pub use fetcher::{SubscriptionFetcher, SUBSCRIPTION_KEY};
pub use types::{
    AuthEvent, CheckoutRequest, CheckoutResponse, Entitlement, Identity, Subscription,
    SubscriptionStatus,
};

/// Plansync version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
