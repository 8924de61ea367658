//! The license state store.
//!
//! One store per running client, constructed at startup and shared (usually
//! behind an `Arc`) with whatever needs license state. Every mutation goes
//! through a single `watch::Sender::send_modify`, which also writes the
//! persisted record, so readers and subscribers never see half an update.
//! Persistence writes therefore run under the watch write lock: with
//! [`FilePersistence`](crate::storage::FilePersistence) a `snapshot()` issued
//! during a save waits for the disk write to finish.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::api::LicensingApi;
use crate::entitlement::{self, Entitlement, LicensePhase};
use crate::error::{LicenseError, Result};
use crate::fingerprint::DeviceFingerprint;
use crate::models::{LicenseState, canonicalize_key, is_well_formed_key};
use crate::storage::Persistence;
use crate::sync::BestEffortSync;

pub const MALFORMED_KEY: &str = "License key must be 8 letters or digits";

pub struct LicenseStore<A, P> {
    api: A,
    persistence: P,
    fingerprint: DeviceFingerprint,
    sync: BestEffortSync,
    state: watch::Sender<LicenseState>,
    /// Bumped by every activation start and every reset; an activation only
    /// applies its result while the generation it started is still current.
    generation: AtomicU64,
}

impl<A, P> LicenseStore<A, P>
where
    A: LicensingApi,
    P: Persistence,
{
    /// Restores the persisted record (or starts empty) and binds the store
    /// to `fingerprint` for its whole lifetime.
    pub fn new(api: A, persistence: P, fingerprint: DeviceFingerprint) -> Self {
        let initial = persistence
            .load()
            .map(|state| state.persisted())
            .unwrap_or_default();

        if initial.is_activated {
            tracing::debug!(
                "Restored license {} for shop {}",
                initial.license_key.as_deref().unwrap_or("-"),
                initial.shop_name.as_deref().unwrap_or("-")
            );
        }

        let (state, _) = watch::channel(initial);
        Self {
            api,
            persistence,
            fingerprint,
            sync: BestEffortSync,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Activates `license_key` on this device.
    ///
    /// `is_loading` stays true while the request is in flight; callers use
    /// it to block duplicate submissions. On failure the message lands in
    /// `error` and the same error is returned, with every other field left
    /// as it was.
    ///
    /// A result that arrives after [`reset`](Self::reset) or after a newer
    /// activation started is discarded and reported as
    /// [`LicenseError::Superseded`].
    pub async fn activate(&self, license_key: &str) -> Result<()> {
        let key = canonicalize_key(license_key);

        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.is_loading = true;
            state.error = None;
        });

        let result = if is_well_formed_key(&key) {
            self.api.activate(&key, &self.fingerprint).await
        } else {
            Err(LicenseError::activation(Some(MALFORMED_KEY.to_string())))
        };

        let is_current = || self.generation.load(Ordering::SeqCst) == generation;

        match result {
            Ok(shop) => {
                let shop_name = shop.name.clone();
                let applied = self.state.send_if_modified(|state| {
                    if !is_current() {
                        return false;
                    }
                    state.apply_activation(key.clone(), shop);
                    self.persistence.save(state);
                    true
                });
                if !applied {
                    tracing::debug!("Dropping activation of {}: superseded while pending", key);
                    return Err(LicenseError::Superseded);
                }
                tracing::info!("License {} activated for shop {}", key, shop_name);
                Ok(())
            }
            Err(e) => {
                let message = e.user_message();
                let applied = self.state.send_if_modified(|state| {
                    if !is_current() {
                        return false;
                    }
                    state.is_loading = false;
                    state.error = Some(message.clone());
                    true
                });
                if applied {
                    tracing::warn!("License activation failed: {}", message);
                } else {
                    tracing::debug!("Dropping failed activation of {}: superseded while pending", key);
                }
                Err(e)
            }
        }
    }

    /// Re-syncs expiry, credit and shop details from the backend.
    ///
    /// Does nothing without a stored key. Failures are dropped by
    /// [`BestEffortSync`]; `is_loading` and `error` are never touched. A
    /// response for a key that is no longer stored (reset or re-activated
    /// meanwhile) is discarded.
    pub async fn refresh_license_info(&self) {
        let key = self.state.borrow().license_key.clone();
        let Some(key) = key else {
            return;
        };

        let Some(shop) = self
            .sync
            .run("License refresh", self.api.refresh_info(&key))
            .await
        else {
            return;
        };

        self.state.send_if_modified(|state| {
            if state.license_key.as_deref() != Some(key.as_str()) {
                tracing::debug!("Dropping refresh for {}: key no longer stored", key);
                return false;
            }
            state.apply_refresh(shop);
            self.persistence.save(state);
            true
        });
    }

    /// Forgets everything, in memory and on disk. Safe to call repeatedly.
    /// An activation still in flight will not apply its result.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = LicenseState::empty();
            self.persistence.clear();
        });
    }

    /// "Forget this device". Local only; the backend is not told.
    pub fn deactivate(&self) {
        let key = self.state.borrow().license_key.clone();
        self.reset();
        if let Some(key) = key {
            tracing::info!("License {} deactivated on this device", key);
        }
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        entitlement::is_expired(self.state.borrow().license_expires_at, now)
    }

    pub fn remaining_days(&self) -> Option<i64> {
        self.remaining_days_at(Utc::now())
    }

    pub fn remaining_days_at(&self, now: DateTime<Utc>) -> Option<i64> {
        entitlement::remaining_days(self.state.borrow().license_expires_at, now)
    }

    pub fn phase(&self) -> LicensePhase {
        entitlement::phase(&self.state.borrow(), Utc::now())
    }

    pub fn entitlement(&self) -> Entitlement {
        Entitlement::evaluate(&self.state.borrow(), Utc::now())
    }

    /// Advisory check against the locally cached balance.
    pub fn has_sufficient_credit(&self, required: u64) -> bool {
        entitlement::has_sufficient_credit(self.state.borrow().credit, required)
    }

    pub fn snapshot(&self) -> LicenseState {
        self.state.borrow().clone()
    }

    /// Receives the full state after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<LicenseState> {
        self.state.subscribe()
    }

    pub fn fingerprint(&self) -> &DeviceFingerprint {
        &self.fingerprint
    }
}
