//! License state store: activation, refresh, reset and the read/subscribe
//! interface.

use std::sync::Arc;

use chrono::TimeDelta;

mod common;
use common::*;

use nero_license::LicensePhase;
use nero_license::error::ACTIVATION_FAILED;
use nero_license::store::MALFORMED_KEY;

#[tokio::test]
async fn test_new_store_starts_empty() {
    let api = FakeApi::new();
    let (store, _) = test_store(&api);

    assert_eq!(store.snapshot(), LicenseState::empty());
    assert_eq!(store.phase(), LicensePhase::Unactivated);
    assert!(!store.is_expired());
    assert_eq!(store.remaining_days(), None);
}

#[tokio::test]
async fn test_activate_success_sets_state() {
    let api = FakeApi::new();
    let (store, persistence) = test_store(&api);
    let expires_at = future_timestamp(30);
    api.push_activation(Ok(ShopRecord {
        id: None,
        name: "Acme".into(),
        types: vec!["gold".into()],
        owner_name: None,
        phone_number: None,
        address: None,
        license_expires_at: Some(expires_at),
        credit: 42,
    }));

    store.activate("abc12345").await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.license_key.as_deref(), Some("ABC12345"));
    assert!(state.is_activated);
    assert_eq!(state.credit, 42);
    assert_eq!(state.shop_name.as_deref(), Some("Acme"));
    assert_eq!(state.shop_types, vec!["gold".to_string()]);
    assert_eq!(state.license_expires_at, Some(expires_at));
    assert!(state.error.is_none());
    assert!(!state.is_loading);
    assert_eq!(store.phase(), LicensePhase::Active);

    // The key reaches the backend uppercased, with this store's fingerprint
    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "ABC12345");
    assert_eq!(calls[0].1.as_deref(), Some(test_fingerprint().as_str()));

    // And the result is persisted
    let saved = persistence.load().expect("state should be persisted");
    assert_eq!(saved, state.persisted());
}

#[tokio::test]
async fn test_activate_failure_preserves_prior_state() {
    let api = FakeApi::new();
    let (store, _) = activated_store(&api, 10).await;
    let before = store.snapshot();

    api.push_activation(Err(LicenseError::activation(Some(
        "License key not found".into(),
    ))));
    let err = store.activate("WRONG123").await.unwrap_err();
    assert_eq!(err.user_message(), "License key not found");

    let after = store.snapshot();
    assert_eq!(after.error.as_deref(), Some("License key not found"));
    assert!(!after.is_loading);
    assert!(after.is_activated);
    assert_eq!(after.credit, 10);
    assert_eq!(
        LicenseState {
            error: None,
            ..after
        },
        before
    );
}

#[tokio::test]
async fn test_activate_network_failure_uses_generic_message() {
    let api = FakeApi::new();
    let (store, persistence) = test_store(&api);

    // Nothing scripted: the fake answers like a dead network
    let err = store.activate("ABC12345").await.unwrap_err();
    assert!(matches!(err, LicenseError::Activation(_)));

    let state = store.snapshot();
    assert_eq!(state.error.as_deref(), Some(ACTIVATION_FAILED));
    assert!(!state.is_activated);
    assert!(persistence.load().is_none(), "failed activation must not persist");
}

#[tokio::test]
async fn test_malformed_key_fails_without_network_call() {
    let api = FakeApi::new();
    let (store, _) = test_store(&api);

    let err = store.activate("abc-123").await.unwrap_err();
    assert_eq!(err.user_message(), MALFORMED_KEY);
    assert_eq!(store.snapshot().error.as_deref(), Some(MALFORMED_KEY));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_activate_clears_previous_error() {
    let api = FakeApi::new();
    let (store, _) = test_store(&api);

    store.activate("ABC12345").await.unwrap_err();
    assert!(store.snapshot().error.is_some());

    api.push_activation(Ok(shop("Acme", 1, None)));
    store.activate("ABC12345").await.unwrap();
    assert!(store.snapshot().error.is_none());
}

#[tokio::test]
async fn test_loading_flag_is_visible_while_activation_in_flight() {
    let api = FakeApi::gated();
    let persistence = Arc::new(MemoryPersistence::new());
    let store = Arc::new(LicenseStore::new(
        api.clone(),
        persistence,
        test_fingerprint(),
    ));
    let mut rx = store.subscribe();
    api.push_activation(Ok(shop("Acme", 5, None)));

    let task = {
        let store = store.clone();
        tokio::spawn(async move { store.activate("ABC12345").await })
    };

    rx.wait_for(|state| state.is_loading).await.unwrap();
    assert!(store.snapshot().is_loading);
    assert!(!store.snapshot().is_activated);

    api.release();
    task.await.unwrap().unwrap();

    let state = rx.borrow_and_update().clone();
    assert!(!state.is_loading);
    assert!(state.is_activated);
}

#[tokio::test]
async fn test_refresh_merges_descriptive_fields() {
    let api = FakeApi::new();
    let (store, persistence) = activated_store(&api, 10).await;
    let new_expiry = future_timestamp(365);

    let mut renewed = shop("Acme Jewelry", 3, Some(new_expiry));
    renewed.types = vec!["gold".into(), "silver".into()];
    api.push_refresh(Ok(renewed));

    store.refresh_license_info().await;

    let state = store.snapshot();
    assert_eq!(state.shop_name.as_deref(), Some("Acme Jewelry"));
    assert_eq!(state.credit, 3);
    assert_eq!(state.license_expires_at, Some(new_expiry));
    assert_eq!(state.shop_types.len(), 2);
    assert_eq!(state.license_key.as_deref(), Some("ABC12345"));
    assert!(state.is_activated);
    assert_eq!(persistence.load().unwrap().credit, 3);
}

#[tokio::test]
async fn test_refresh_failure_is_silent() {
    let api = FakeApi::new();
    let (store, persistence) = activated_store(&api, 10).await;
    let before = store.snapshot();
    let saved_before = persistence.raw();

    api.push_refresh(Err(LicenseError::Refresh("connection reset".into())));
    store.refresh_license_info().await;

    assert_eq!(store.snapshot(), before);
    assert_eq!(persistence.raw(), saved_before);
}

#[tokio::test]
async fn test_refresh_keeps_existing_error() {
    let api = FakeApi::new();
    let (store, _) = activated_store(&api, 10).await;
    store.activate("WRONG123").await.unwrap_err();

    api.push_refresh(Ok(shop("Acme", 11, None)));
    store.refresh_license_info().await;

    let state = store.snapshot();
    assert_eq!(state.credit, 11);
    assert_eq!(state.error.as_deref(), Some(ACTIVATION_FAILED));
}

#[tokio::test]
async fn test_refresh_without_key_is_noop() {
    let api = FakeApi::new();
    let (store, _) = test_store(&api);

    store.refresh_license_info().await;

    assert!(api.calls().is_empty());
    assert_eq!(store.snapshot(), LicenseState::empty());
}

#[tokio::test]
async fn test_refresh_does_not_activate() {
    let api = FakeApi::new();
    // Failed activations never store a key, so start from a persisted
    // record that has a key but was never activated.
    let persistence = Arc::new(MemoryPersistence::with_state(&LicenseState {
        license_key: Some("ABC12345".into()),
        ..LicenseState::empty()
    }));
    let store = LicenseStore::new(api.clone(), persistence, test_fingerprint());

    api.push_refresh(Ok(shop("Acme", 4, None)));
    store.refresh_license_info().await;

    let state = store.snapshot();
    assert_eq!(state.credit, 4);
    assert!(!state.is_activated);
    assert_eq!(store.phase(), LicensePhase::Unactivated);
}

#[tokio::test]
async fn test_refresh_after_reset_is_discarded() {
    let api = FakeApi::gated();
    let persistence = Arc::new(MemoryPersistence::new());
    let store = Arc::new(LicenseStore::new(
        api.clone(),
        persistence.clone(),
        test_fingerprint(),
    ));
    api.push_activation(Ok(shop("Acme", 10, None)));
    api.release();
    store.activate("ABC12345").await.unwrap();

    api.push_refresh(Ok(shop("Acme", 99, None)));
    let task = {
        let store = store.clone();
        tokio::spawn(async move { store.refresh_license_info().await })
    };

    // Let the refresh reach the backend before resetting
    while api.calls().len() < 2 {
        tokio::task::yield_now().await;
    }
    store.reset();
    api.release();
    task.await.unwrap();

    assert_eq!(store.snapshot(), LicenseState::empty());
    assert!(persistence.load().is_none());
}

#[tokio::test]
async fn test_activation_after_reset_is_discarded() {
    let api = FakeApi::gated();
    let persistence = Arc::new(MemoryPersistence::new());
    let store = Arc::new(LicenseStore::new(
        api.clone(),
        persistence.clone(),
        test_fingerprint(),
    ));
    api.push_activation(Ok(shop("Acme", 10, Some(future_timestamp(30)))));

    let task = {
        let store = store.clone();
        tokio::spawn(async move { store.activate("ABC12345").await })
    };

    while api.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(store.snapshot().is_loading);
    store.reset();
    api.release();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(LicenseError::Superseded)));
    assert_eq!(store.snapshot(), LicenseState::empty());
    assert!(persistence.load().is_none());
}

#[tokio::test]
async fn test_failed_activation_after_reset_leaves_no_error() {
    let api = FakeApi::gated();
    let (store, _) = test_store(&api);
    let store = Arc::new(store);
    api.push_activation(Err(LicenseError::activation(Some("Invalid license key".into()))));

    let task = {
        let store = store.clone();
        tokio::spawn(async move { store.activate("ABC12345").await })
    };

    while api.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    store.deactivate();
    api.release();

    assert!(task.await.unwrap().is_err());
    assert_eq!(store.snapshot(), LicenseState::empty());
}

#[tokio::test]
async fn test_activation_after_reset_can_start_again() {
    let api = FakeApi::new();
    let (store, persistence) = test_store(&api);
    store.reset();
    api.push_activation(Ok(shop("Acme", 10, None)));

    store.activate("ABC12345").await.unwrap();

    assert!(store.snapshot().is_activated);
    assert!(persistence.load().unwrap().is_activated);
}

#[tokio::test]
async fn test_reset_is_idempotent() {
    let api = FakeApi::new();
    let (empty_store, _) = test_store(&api);
    let (populated_store, persistence) = activated_store(&api, 10).await;

    empty_store.reset();
    populated_store.reset();
    populated_store.reset();

    assert_eq!(empty_store.snapshot(), populated_store.snapshot());
    let state = populated_store.snapshot();
    assert_eq!(state.license_key, None);
    assert!(!state.is_activated);
    assert_eq!(state.credit, 0);
    assert!(state.shop_name.is_none());
    assert!(state.shop_types.is_empty());
    assert!(persistence.load().is_none());
}

#[tokio::test]
async fn test_deactivate_forgets_device() {
    let api = FakeApi::new();
    let (store, persistence) = activated_store(&api, 10).await;

    store.deactivate();

    assert_eq!(store.snapshot(), LicenseState::empty());
    assert!(persistence.load().is_none());
    // Local only: no extra backend call
    assert_eq!(api.calls().len(), 1);
}

#[tokio::test]
async fn test_clear_error_only_touches_error() {
    let api = FakeApi::new();
    let (store, _) = activated_store(&api, 10).await;
    let before = store.snapshot();
    store.activate("WRONG123").await.unwrap_err();

    store.clear_error();

    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_expired_license_keeps_identity() {
    let api = FakeApi::new();
    let (store, _) = test_store(&api);
    let now = chrono::Utc::now();
    api.push_activation(Ok(shop("Acme", 10, Some(now + TimeDelta::minutes(30)))));
    store.activate("ABC12345").await.unwrap();

    assert!(!store.is_expired_at(now));
    assert_eq!(store.remaining_days_at(now), Some(1));

    let later = now + TimeDelta::hours(1);
    assert!(store.is_expired_at(later));
    assert_eq!(store.remaining_days_at(later), Some(0));

    let state = store.snapshot();
    assert_eq!(state.shop_name.as_deref(), Some("Acme"));
    assert_eq!(state.license_key.as_deref(), Some("ABC12345"));
}

#[tokio::test]
async fn test_renewal_via_refresh_leaves_expired_phase() {
    let api = FakeApi::new();
    let (store, _) = test_store(&api);
    let past = chrono::Utc::now() - TimeDelta::days(1);
    api.push_activation(Ok(shop("Acme", 10, Some(past))));
    store.activate("ABC12345").await.unwrap();
    assert_eq!(store.phase(), LicensePhase::Expired);

    api.push_refresh(Ok(shop("Acme", 10, Some(future_timestamp(30)))));
    store.refresh_license_info().await;
    assert_eq!(store.phase(), LicensePhase::Active);
}

#[tokio::test]
async fn test_credit_gate_uses_cached_balance() {
    let api = FakeApi::new();
    let (store, _) = activated_store(&api, 15).await;

    assert!(store.has_sufficient_credit(15));
    assert!(!store.has_sufficient_credit(16));
    assert!(store.entitlement().can_afford(15));

    // After a paid operation the server balance drops; a refresh picks it up
    api.push_refresh(Ok(shop("Acme", 14, Some(future_timestamp(30)))));
    store.refresh_license_info().await;
    assert!(!store.has_sufficient_credit(15));
}

#[tokio::test]
async fn test_store_restores_persisted_state() {
    let api = FakeApi::new();
    let (store, persistence) = activated_store(&api, 42).await;
    let expected = store.snapshot();
    drop(store);

    let reopened = LicenseStore::new(api.clone(), persistence, test_fingerprint());

    assert_eq!(reopened.snapshot(), expected);
    assert_eq!(reopened.phase(), LicensePhase::Active);
}

#[tokio::test]
async fn test_subscribers_see_reset() {
    let api = FakeApi::new();
    let (store, _) = activated_store(&api, 10).await;
    let mut rx = store.subscribe();
    rx.borrow_and_update();

    store.reset();

    assert!(rx.has_changed().unwrap());
    assert!(!rx.borrow_and_update().is_activated);
}
