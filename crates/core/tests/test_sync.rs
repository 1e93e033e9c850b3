//! End-to-end tests: fetcher, checkout and auth coordinator sharing one cache

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use plansync_core::backend::{MemoryAuth, MemoryCheckout, MemorySubscriptionStore, RecordingNavigator};
use plansync_core::{
    AuthEvent, Backend, Error, Identity, Lookup, StoreError, StoreErrorKind, Subscription,
    SubscriptionStatus, SUBSCRIPTION_KEY,
};

struct World {
    auth: Arc<MemoryAuth>,
    store: Arc<MemorySubscriptionStore>,
    checkout: Arc<MemoryCheckout>,
    navigator: Arc<RecordingNavigator>,
    backend: Backend,
}

fn world(auth: MemoryAuth, store: MemorySubscriptionStore, checkout: MemoryCheckout) -> World {
    let auth = Arc::new(auth);
    let store = Arc::new(store);
    let checkout = Arc::new(checkout);
    let navigator = Arc::new(RecordingNavigator::new());
    let backend = Backend::new(auth.clone(), store.clone(), checkout.clone(), navigator.clone());
    World {
        auth,
        store,
        checkout,
        navigator,
        backend,
    }
}

fn alice() -> Identity {
    Identity {
        user_id: "alice".to_string(),
        access_token: "alice-token".to_string(),
    }
}

fn bob() -> Identity {
    Identity {
        user_id: "bob".to_string(),
        access_token: "bob-token".to_string(),
    }
}

fn subscription(id: &str, tier: &str, status: SubscriptionStatus) -> Subscription {
    Subscription {
        id: id.to_string(),
        tier: tier.to_string(),
        status,
        trial_end: None,
        current_period_end: Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap(),
        cancel_at_period_end: false,
    }
}

/// Lets spawned tasks (coordinator, background fetches) run.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn anonymous_fetch_is_absent_with_zero_queries() {
    let w = world(
        MemoryAuth::anonymous(),
        MemorySubscriptionStore::new(),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );

    assert_eq!(w.backend.fetcher().fetch_subscription().await.unwrap(), None);
    assert_eq!(w.backend.fetcher().current().await.unwrap(), None);
    assert_eq!(w.store.queries(), 0);
}

#[tokio::test]
async fn trialing_row_flows_through_cache() {
    let store = MemorySubscriptionStore::new();
    let trial = subscription("sub_1", "pro", SubscriptionStatus::Trialing);
    store.insert("alice", trial.clone());
    let w = world(
        MemoryAuth::signed_in(alice()),
        store,
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );

    assert_eq!(w.backend.fetcher().current().await.unwrap(), Some(trial.clone()));
    assert_eq!(
        w.backend.cache().peek(SUBSCRIPTION_KEY),
        Lookup::Fresh(Some(trial))
    );
}

#[tokio::test]
async fn store_error_propagates_unchanged() {
    let w = world(
        MemoryAuth::signed_in(alice()),
        MemorySubscriptionStore::new(),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    let failure = StoreError::new(StoreErrorKind::Unauthorized, "JWT expired");
    w.store.fail_with(Some(failure.clone()));

    let err = w.backend.fetcher().current().await.unwrap_err();
    assert_eq!(err, Error::FetchFailed(failure));
}

#[tokio::test]
async fn concurrent_reads_issue_one_query() {
    let w = world(
        MemoryAuth::signed_in(alice()),
        MemorySubscriptionStore::new().with_latency(Duration::from_millis(20)),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    let fetcher = w.backend.fetcher();

    let (first, second) = tokio::join!(fetcher.current(), fetcher.current());

    assert_eq!(first.unwrap(), None);
    assert_eq!(second.unwrap(), None);
    assert_eq!(w.store.queries(), 1);
}

#[tokio::test]
async fn second_reader_joins_pending_fetch() {
    let w = world(
        MemoryAuth::signed_in(alice()),
        MemorySubscriptionStore::new().with_latency(Duration::from_millis(30)),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );

    let first = {
        let fetcher = w.backend.fetcher();
        tokio::spawn(async move { fetcher.current().await })
    };
    settle().await;
    assert_eq!(w.backend.cache().peek(SUBSCRIPTION_KEY), Lookup::Pending);

    let second = w.backend.fetcher().current().await.unwrap();
    assert_eq!(second, None);
    assert_eq!(first.await.unwrap().unwrap(), None);
    assert_eq!(w.store.queries(), 1);
}

#[tokio::test]
async fn checkout_without_session_makes_no_call() {
    let w = world(
        MemoryAuth::anonymous(),
        MemorySubscriptionStore::new(),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );

    let err = w
        .backend
        .checkout_initiator()
        .start_checkout("price_123", "pro")
        .await
        .unwrap_err();

    assert_eq!(err, Error::AuthRequired);
    assert_eq!(w.auth.lookups(), 1);
    assert!(w.checkout.requests().is_empty());
    assert!(w.navigator.visited().is_empty());
}

#[tokio::test]
async fn checkout_invalidates_subscription_and_navigates() {
    let store = MemorySubscriptionStore::new();
    store.insert("alice", subscription("free_1", "free", SubscriptionStatus::Active));
    let w = world(
        MemoryAuth::signed_in(alice()),
        store,
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    let fetcher = w.backend.fetcher();
    fetcher.current().await.unwrap();

    w.backend
        .checkout_initiator()
        .start_checkout("price_123", "pro")
        .await
        .unwrap();

    assert_eq!(w.navigator.visited(), vec!["https://pay.example/abc".to_string()]);
    assert!(matches!(
        w.backend.cache().peek(SUBSCRIPTION_KEY),
        Lookup::Stale(_)
    ));

    // Back from the payment provider: the upgraded row is fetched, not the stale one.
    let upgraded = subscription("pro_1", "pro", SubscriptionStatus::Active);
    w.store.replace("alice", upgraded.clone());
    assert_eq!(fetcher.refresh().await.unwrap(), Some(upgraded));
    assert_eq!(w.store.queries(), 2);
}

#[tokio::test]
async fn checkout_without_url_touches_nothing() {
    let w = world(
        MemoryAuth::signed_in(alice()),
        MemorySubscriptionStore::new(),
        MemoryCheckout::responding(Default::default()),
    );
    w.backend.fetcher().current().await.unwrap();

    let err = w
        .backend
        .checkout_initiator()
        .start_checkout("price_123", "pro")
        .await
        .unwrap_err();

    assert_eq!(err, Error::InvalidCheckoutResponse);
    assert!(w.navigator.visited().is_empty());
    assert_eq!(
        w.backend.cache().peek(SUBSCRIPTION_KEY),
        Lookup::Fresh(None)
    );
}

#[tokio::test]
async fn sign_out_discards_fetch_that_resolves_later() {
    let w = world(
        MemoryAuth::signed_in(alice()),
        MemorySubscriptionStore::new().with_latency(Duration::from_millis(30)),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    w.store.insert("alice", subscription("sub_1", "pro", SubscriptionStatus::Active));
    let coordinator = w.backend.coordinator();

    let pending = {
        let fetcher = w.backend.fetcher();
        tokio::spawn(async move { fetcher.current().await })
    };
    settle().await;
    assert_eq!(w.backend.cache().peek(SUBSCRIPTION_KEY), Lookup::Pending);

    w.auth.sign_out();
    settle().await;
    assert!(w.backend.cache().is_empty());

    pending.await.unwrap().unwrap();
    assert!(w.backend.cache().is_empty());
    assert_eq!(w.backend.cache().stats().discarded, 1);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn sign_in_forces_refetch_of_every_key() {
    let store = MemorySubscriptionStore::new();
    store.insert("bob", subscription("bob_1", "team", SubscriptionStatus::Active));
    let w = world(
        MemoryAuth::anonymous(),
        store,
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    let coordinator = w.backend.coordinator();
    let cache = w.backend.cache().clone();
    let fetcher = w.backend.fetcher();

    assert_eq!(fetcher.current().await.unwrap(), None);
    cache.read("pricing", || async { Ok(None) }).await.unwrap();

    w.auth.sign_in(bob());
    settle().await;

    assert_eq!(cache.peek(SUBSCRIPTION_KEY), Lookup::Stale(None));
    assert_eq!(cache.peek("pricing"), Lookup::Stale(None));

    let fetches_before = cache.stats().fetches;
    assert_eq!(
        fetcher.refresh().await.unwrap().map(|s| s.id),
        Some("bob_1".to_string())
    );
    cache.revalidate("pricing", || async { Ok(None) }).await.unwrap();
    assert_eq!(cache.stats().fetches, fetches_before + 2);
    assert_eq!(w.store.queries(), 1);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn stale_value_is_served_while_refetching() {
    let store = MemorySubscriptionStore::new().with_latency(Duration::from_millis(10));
    store.insert("alice", subscription("sub_1", "pro", SubscriptionStatus::Active));
    let w = world(
        MemoryAuth::signed_in(alice()),
        store,
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    let fetcher = w.backend.fetcher();
    fetcher.current().await.unwrap();

    w.store.replace("alice", subscription("sub_2", "team", SubscriptionStatus::Active));
    w.backend.cache().invalidate(SUBSCRIPTION_KEY);

    let served = fetcher.current().await.unwrap().unwrap();
    assert_eq!(served.id, "sub_1");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let refreshed = fetcher.current().await.unwrap().unwrap();
    assert_eq!(refreshed.id, "sub_2");
}

#[tokio::test]
async fn token_refresh_leaves_cache_alone() {
    let w = world(
        MemoryAuth::signed_in(alice()),
        MemorySubscriptionStore::new(),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    let coordinator = w.backend.coordinator();
    w.backend.fetcher().current().await.unwrap();

    w.auth.emit(AuthEvent::TokenRefreshed);
    settle().await;

    assert_eq!(
        w.backend.cache().peek(SUBSCRIPTION_KEY),
        Lookup::Fresh(None)
    );
    coordinator.shutdown().await;
}

#[tokio::test]
async fn dropped_coordinator_stops_reacting() {
    let w = world(
        MemoryAuth::signed_in(alice()),
        MemorySubscriptionStore::new(),
        MemoryCheckout::redirecting_to("https://pay.example/abc"),
    );
    w.backend.fetcher().current().await.unwrap();

    {
        let _coordinator = w.backend.coordinator();
        settle().await;
    }
    settle().await;

    w.auth.sign_out();
    settle().await;

    assert_eq!(w.backend.cache().len(), 1);
}
