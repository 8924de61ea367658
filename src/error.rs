//! Error types for the license engine.

use thiserror::Error;

/// Message used whenever activation fails without a usable server message.
pub const ACTIVATION_FAILED: &str = "Failed to activate license";

#[derive(Debug, Error)]
pub enum LicenseError {
    /// Activation did not succeed. Server rejections and transport failures
    /// both end up here; the message is what the user sees.
    #[error("{0}")]
    Activation(String),

    /// Background refresh failed. Never surfaced to the user.
    #[error("license refresh failed: {0}")]
    Refresh(String),

    #[error("http client error: {0}")]
    Client(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The store was reset, or a newer activation started, while this
    /// activation was pending. Its result was not applied.
    #[error("activation superseded before it completed")]
    Superseded,
}

impl LicenseError {
    /// Builds an activation error from an optional server message, falling
    /// back to the generic text when the server gave nothing usable.
    pub fn activation(message: Option<String>) -> Self {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| ACTIVATION_FAILED.to_string());
        Self::Activation(message)
    }

    /// The user-facing message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Activation(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LicenseError>;
