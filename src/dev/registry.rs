use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

use super::error::{AppError, Result};
use crate::entitlement;
use crate::models::{LICENSE_KEY_LEN, ShopRecord, canonicalize_key, is_well_formed_key};

#[derive(Debug, Clone)]
struct DevShop {
    record: ShopRecord,
    /// Fingerprint of the device this key is bound to, set on first activation
    bound_fingerprint: Option<String>,
}

/// In-memory shop registry keyed by (uppercase) license key.
#[derive(Debug, Clone, Default)]
pub struct DevRegistry {
    shops: Arc<RwLock<HashMap<String, DevShop>>>,
}

impl DevRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `record` under `license_key`, or under a fresh random key
    /// when none is given. Returns the key.
    pub fn insert(&self, license_key: Option<&str>, record: ShopRecord) -> Result<String> {
        let mut shops = self
            .shops
            .write()
            .map_err(|_| AppError::Internal("registry lock poisoned".into()))?;

        let key = match license_key {
            Some(key) => {
                let key = canonicalize_key(key);
                if !is_well_formed_key(&key) {
                    return Err(AppError::BadRequest(
                        "License key must be 8 letters or digits".into(),
                    ));
                }
                if shops.contains_key(&key) {
                    return Err(AppError::Conflict("License key already exists".into()));
                }
                key
            }
            None => loop {
                let candidate = generate_key();
                if !shops.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        shops.insert(
            key.clone(),
            DevShop {
                record,
                bound_fingerprint: None,
            },
        );
        Ok(key)
    }

    /// Activates `license_key` for `fingerprint`, binding the key to that
    /// device on first use. Re-activation from the bound device succeeds.
    pub fn activate(
        &self,
        license_key: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<ShopRecord> {
        let mut shops = self
            .shops
            .write()
            .map_err(|_| AppError::Internal("registry lock poisoned".into()))?;

        let shop = shops
            .get_mut(&canonicalize_key(license_key))
            .ok_or_else(|| AppError::NotFound("Invalid license key".into()))?;

        if entitlement::is_expired(shop.record.license_expires_at, now) {
            return Err(AppError::Forbidden("License has expired".into()));
        }

        match &shop.bound_fingerprint {
            Some(bound) if bound != fingerprint => {
                return Err(AppError::Conflict(
                    "License is already activated on another device".into(),
                ));
            }
            Some(_) => {}
            None => shop.bound_fingerprint = Some(fingerprint.to_string()),
        }

        Ok(shop.record.clone())
    }

    pub fn info(&self, license_key: &str) -> Result<ShopRecord> {
        let shops = self
            .shops
            .read()
            .map_err(|_| AppError::Internal("registry lock poisoned".into()))?;

        shops
            .get(&canonicalize_key(license_key))
            .map(|shop| shop.record.clone())
            .ok_or_else(|| AppError::NotFound("Invalid license key".into()))
    }

    /// Deducts `amount` credit the way a paid operation would. Returns the
    /// remaining balance.
    pub fn consume(&self, license_key: &str, amount: u64) -> Result<u64> {
        let mut shops = self
            .shops
            .write()
            .map_err(|_| AppError::Internal("registry lock poisoned".into()))?;

        let shop = shops
            .get_mut(&canonicalize_key(license_key))
            .ok_or_else(|| AppError::NotFound("Invalid license key".into()))?;

        if !entitlement::has_sufficient_credit(shop.record.credit, amount) {
            return Err(AppError::PaymentRequired("Insufficient credit".into()));
        }
        shop.record.credit -= amount;
        Ok(shop.record.credit)
    }

    /// Fingerprint the key is currently bound to, if any.
    pub fn bound_fingerprint(&self, license_key: &str) -> Option<String> {
        self.shops
            .read()
            .ok()?
            .get(&canonicalize_key(license_key))?
            .bound_fingerprint
            .clone()
    }
}

fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LICENSE_KEY_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}
