use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ShopRecord;

/// License keys are exactly this many ASCII alphanumerics.
pub const LICENSE_KEY_LEN: usize = 8;

/// The license, shop and entitlement state of this device.
///
/// Only the key, the descriptive shop fields and `is_activated` are
/// persisted. `is_loading` and `error` are skipped by serde, so a reloaded
/// state always comes back with `false`/`None` for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LicenseState {
    pub license_key: Option<String>,
    pub shop_id: Option<String>,
    pub shop_name: Option<String>,
    pub shop_types: Vec<String>,
    pub owner_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub license_expires_at: Option<DateTime<Utc>>,
    pub credit: u64,
    pub is_activated: bool,
    #[serde(skip)]
    pub is_loading: bool,
    #[serde(skip)]
    pub error: Option<String>,
}

impl LicenseState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Records a successful activation of `license_key`.
    pub fn apply_activation(&mut self, license_key: String, shop: ShopRecord) {
        self.license_key = Some(license_key);
        self.apply_shop(shop);
        self.is_activated = true;
        self.is_loading = false;
        self.error = None;
    }

    /// Overwrites the descriptive fields from a refresh. Activation status,
    /// key and the transient fields are left alone.
    pub fn apply_refresh(&mut self, shop: ShopRecord) {
        self.apply_shop(shop);
    }

    fn apply_shop(&mut self, shop: ShopRecord) {
        self.shop_id = shop.id;
        self.shop_name = Some(shop.name);
        self.shop_types = shop.types;
        self.owner_name = shop.owner_name;
        self.phone_number = shop.phone_number;
        self.address = shop.address;
        self.license_expires_at = shop.license_expires_at;
        self.credit = shop.credit;
    }

    /// The state as it would look after a save/load cycle.
    pub fn persisted(&self) -> Self {
        Self {
            is_loading: false,
            error: None,
            ..self.clone()
        }
    }
}

/// Uppercases a key. Trimming is left to the input layer.
pub fn canonicalize_key(key: &str) -> String {
    key.to_ascii_uppercase()
}

/// Shape check only; the server decides whether the key is valid.
pub fn is_well_formed_key(key: &str) -> bool {
    key.len() == LICENSE_KEY_LEN && key.chars().all(|c| c.is_ascii_alphanumeric())
}
