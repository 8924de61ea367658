use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};
use super::registry::DevRegistry;
use crate::api::{ActivateRequest, InfoQuery};
use crate::models::{ShopEnvelope, ShopRecord};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /api/license/activate
pub async fn activate_license(
    State(registry): State<DevRegistry>,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<ShopEnvelope>> {
    if request.device_fingerprint.trim().is_empty() {
        return Err(AppError::BadRequest("Device fingerprint is required".into()));
    }

    let shop = registry.activate(&request.license_key, &request.device_fingerprint, Utc::now())?;

    tracing::info!(
        "DEV: Activated license {} on device {}",
        request.license_key,
        request.device_fingerprint
    );

    Ok(Json(ShopEnvelope { shop }))
}

/// GET /api/license/info?licenseKey=...
pub async fn license_info(
    State(registry): State<DevRegistry>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<ShopEnvelope>> {
    let shop = registry.info(&query.license_key)?;
    Ok(Json(ShopEnvelope { shop }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevCreateShop {
    /// Random key when omitted
    #[serde(default)]
    pub license_key: Option<String>,
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Absolute expiry; takes precedence over `expires_in_days`
    #[serde(default)]
    pub license_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
    #[serde(default)]
    pub credit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevShopCreated {
    pub license_key: String,
    pub shop: ShopRecord,
}

/// POST /api/dev/shops
pub async fn create_dev_shop(
    State(registry): State<DevRegistry>,
    Json(input): Json<DevCreateShop>,
) -> Result<Json<DevShopCreated>> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Shop name is required".into()));
    }

    let license_expires_at = match (input.license_expires_at, input.expires_in_days) {
        (Some(at), _) => Some(at),
        (None, Some(days)) => {
            let expires_at = TimeDelta::try_days(days)
                .and_then(|delta| Utc::now().checked_add_signed(delta))
                .ok_or_else(|| AppError::BadRequest("expiresInDays out of range".into()))?;
            Some(expires_at)
        }
        (None, None) => None,
    };

    let shop = ShopRecord {
        id: Some(uuid::Uuid::new_v4().to_string()),
        name: input.name,
        types: input.types,
        owner_name: input.owner_name,
        phone_number: input.phone_number,
        address: input.address,
        license_expires_at,
        credit: input.credit,
    };

    let license_key = registry.insert(input.license_key.as_deref(), shop.clone())?;

    tracing::info!("DEV: Created shop {} with license {}", shop.name, license_key);

    Ok(Json(DevShopCreated { license_key, shop }))
}

#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    pub amount: u64,
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub credit: u64,
}

/// POST /api/dev/shops/{key}/consume
pub async fn consume_credit(
    State(registry): State<DevRegistry>,
    Path(license_key): Path<String>,
    Json(request): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>> {
    let credit = registry.consume(&license_key, request.amount)?;
    Ok(Json(ConsumeResponse { credit }))
}
