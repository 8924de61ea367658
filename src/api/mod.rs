//! Licensing backend protocol.
//!
//! The backend is the only authority on key validity, device binding,
//! expiry and credit; this side performs one request per operation and
//! keeps no state of its own.

mod http;

pub use self::http::*;

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::DeviceFingerprint;
use crate::models::ShopRecord;

pub const ACTIVATE_PATH: &str = "/license/activate";
pub const INFO_PATH: &str = "/license/info";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub license_key: String,
    pub device_fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoQuery {
    pub license_key: String,
}

/// Error body returned by the backend. Either field may carry the text.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .filter(|m| !m.trim().is_empty())
            .or(self.error.filter(|m| !m.trim().is_empty()))
    }
}

/// Remote operations against the licensing backend.
pub trait LicensingApi: Send + Sync {
    /// Binds `license_key` (already uppercased) to `fingerprint`.
    ///
    /// Fails with [`crate::LicenseError::Activation`] carrying the server's
    /// message, or the generic one when none is usable.
    fn activate(
        &self,
        license_key: &str,
        fingerprint: &DeviceFingerprint,
    ) -> impl Future<Output = Result<ShopRecord>> + Send;

    /// Fetches the current shop record for an activated key.
    fn refresh_info(&self, license_key: &str) -> impl Future<Output = Result<ShopRecord>> + Send;
}

impl<A: LicensingApi> LicensingApi for Arc<A> {
    fn activate(
        &self,
        license_key: &str,
        fingerprint: &DeviceFingerprint,
    ) -> impl Future<Output = Result<ShopRecord>> + Send {
        (**self).activate(license_key, fingerprint)
    }

    fn refresh_info(&self, license_key: &str) -> impl Future<Output = Result<ShopRecord>> + Send {
        (**self).refresh_info(license_key)
    }
}
