//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Notify;

pub use nero_license::dev::{self, DevRegistry};
pub use nero_license::error::{LicenseError, Result};
pub use nero_license::fingerprint::{DeviceFingerprint, EnvironmentSignals};
pub use nero_license::models::{LicenseState, ShopRecord};
pub use nero_license::storage::{MemoryPersistence, Persistence};
pub use nero_license::{LicenseStore, LicensingApi};

/// A shop record the way the backend would return it.
pub fn shop(name: &str, credit: u64, expires_at: Option<DateTime<Utc>>) -> ShopRecord {
    ShopRecord {
        id: Some(format!("shop-{}", name.to_lowercase())),
        name: name.to_string(),
        types: vec!["gold".to_string()],
        owner_name: Some("Reza".to_string()),
        phone_number: Some("+989120000000".to_string()),
        address: Some("Tehran".to_string()),
        license_expires_at: expires_at,
        credit,
    }
}

pub fn future_timestamp(days: i64) -> DateTime<Utc> {
    Utc::now() + TimeDelta::days(days)
}

pub fn test_fingerprint() -> DeviceFingerprint {
    DeviceFingerprint::from_signals(&EnvironmentSignals {
        user_agent: "nero-tests".into(),
        display_resolution: "1280x720".into(),
        color_depth: "24".into(),
        timezone_name: "UTC".into(),
        timezone_offset: "0".into(),
        cpu_count: "4".into(),
        language: "en-US".into(),
    })
}

/// Scripted [`LicensingApi`]. Responses are popped in order; an empty queue
/// answers with a network-style failure. With `gate` enabled every call
/// waits for [`FakeApi::release`] before answering.
#[derive(Default)]
pub struct FakeApi {
    activations: Mutex<VecDeque<Result<ShopRecord>>>,
    refreshes: Mutex<VecDeque<Result<ShopRecord>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    gated: AtomicBool,
    gate: Notify,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> Arc<Self> {
        let api = Self::default();
        api.gated.store(true, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn push_activation(&self, result: Result<ShopRecord>) {
        self.activations.lock().unwrap().push_back(result);
    }

    pub fn push_refresh(&self, result: Result<ShopRecord>) {
        self.refreshes.lock().unwrap().push_back(result);
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// `(license_key, fingerprint)` per call; refreshes carry no fingerprint.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    async fn wait_for_gate(&self) {
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
    }
}

impl LicensingApi for FakeApi {
    async fn activate(&self, license_key: &str, fingerprint: &DeviceFingerprint) -> Result<ShopRecord> {
        self.calls
            .lock()
            .unwrap()
            .push((license_key.to_string(), Some(fingerprint.to_string())));
        self.wait_for_gate().await;
        let next = self.activations.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(LicenseError::activation(None)))
    }

    async fn refresh_info(&self, license_key: &str) -> Result<ShopRecord> {
        self.calls.lock().unwrap().push((license_key.to_string(), None));
        self.wait_for_gate().await;
        let next = self.refreshes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(LicenseError::Refresh("connection refused".into())))
    }
}

pub type TestStore = LicenseStore<Arc<FakeApi>, Arc<MemoryPersistence>>;

pub fn test_store(api: &Arc<FakeApi>) -> (TestStore, Arc<MemoryPersistence>) {
    let persistence = Arc::new(MemoryPersistence::new());
    let store = LicenseStore::new(api.clone(), persistence.clone(), test_fingerprint());
    (store, persistence)
}

/// A store that has already activated "ABC12345" for shop Acme with `credit`.
pub async fn activated_store(
    api: &Arc<FakeApi>,
    credit: u64,
) -> (TestStore, Arc<MemoryPersistence>) {
    let (store, persistence) = test_store(api);
    api.push_activation(Ok(shop("Acme", credit, Some(future_timestamp(30)))));
    store.activate("ABC12345").await.unwrap();
    (store, persistence)
}

/// Runs the dev backend on an ephemeral port. Returns the API base URL.
pub async fn spawn_dev_server(registry: DevRegistry) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        dev::serve(listener, registry).await.unwrap();
    });
    format!("http://{}/api", addr)
}
