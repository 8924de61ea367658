use reqwest::Client;

use super::{ACTIVATE_PATH, ActivateRequest, ErrorBody, INFO_PATH, InfoQuery, LicensingApi};
use crate::config::{Config, normalize_base_url};
use crate::error::{LicenseError, Result};
use crate::fingerprint::DeviceFingerprint;
use crate::models::{ShopEnvelope, ShopRecord};

/// [`LicensingApi`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpLicensingClient {
    client: Client,
    base_url: String,
}

impl HttpLicensingClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LicenseError::Client(e.to_string()))?;
        Ok(Self::with_client(client, &config.api_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl LicensingApi for HttpLicensingClient {
    async fn activate(
        &self,
        license_key: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Result<ShopRecord> {
        let request = ActivateRequest {
            license_key: license_key.to_string(),
            device_fingerprint: fingerprint.to_string(),
        };

        let response = self
            .client
            .post(self.url(ACTIVATE_PATH))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("Activation request failed: {}", e);
                LicenseError::activation(None)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message);
            tracing::debug!("Activation rejected with status {}", status);
            return Err(LicenseError::activation(message));
        }

        let envelope: ShopEnvelope = response.json().await.map_err(|e| {
            tracing::debug!("Failed to parse activation response: {}", e);
            LicenseError::activation(None)
        })?;

        Ok(envelope.shop)
    }

    async fn refresh_info(&self, license_key: &str) -> Result<ShopRecord> {
        let query = InfoQuery {
            license_key: license_key.to_string(),
        };

        let response = self
            .client
            .get(self.url(INFO_PATH))
            .query(&query)
            .send()
            .await
            .map_err(|e| LicenseError::Refresh(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_default();
            return Err(LicenseError::Refresh(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let envelope: ShopEnvelope = response
            .json()
            .await
            .map_err(|e| LicenseError::Refresh(format!("invalid response: {}", e)))?;

        Ok(envelope.shop)
    }
}
