use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Descriptive tenant payload returned by the licensing backend on
/// activation and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Category tags, e.g. `gold`, `jewelry`. `null` reads as empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// None = no expiry enforced
    #[serde(default)]
    pub license_expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub credit: u64,
}

/// `{ "shop": { ... } }` wrapper used by both licensing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopEnvelope {
    pub shop: ShopRecord,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
