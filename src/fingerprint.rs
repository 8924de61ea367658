//! Device fingerprinting for license binding.
//!
//! Derives a short tag from environment signals so the licensing backend can
//! bind a key to one device. The hash is a plain 32-bit polynomial string
//! hash: collisions are possible and the server is expected to guard
//! against them (one active fingerprint per license).

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::sync::OnceLock;

const UNKNOWN: &str = "unknown";
const SEPARATOR: &str = "|";
const MIN_WIDTH: usize = 8;
const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

static CURRENT: OnceLock<DeviceFingerprint> = OnceLock::new();

/// The ordered environment signals a fingerprint is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    pub user_agent: String,
    pub display_resolution: String,
    pub color_depth: String,
    pub timezone_name: String,
    pub timezone_offset: String,
    pub cpu_count: String,
    pub language: String,
}

impl EnvironmentSignals {
    /// Reads the signals from the running process. Anything that cannot be
    /// read becomes `"unknown"`.
    pub fn collect() -> Self {
        Self {
            user_agent: user_agent(env::var("NERO_USER_AGENT").ok()),
            display_resolution: env_or_unknown("NERO_DISPLAY_RESOLUTION"),
            color_depth: env_or_unknown("NERO_COLOR_DEPTH"),
            timezone_name: env_or_unknown("TZ"),
            timezone_offset: timezone_offset_minutes(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get().to_string())
                .unwrap_or_else(|_| UNKNOWN.to_string()),
            language: language_tag(),
        }
    }

    fn ordered(&self) -> [&str; 7] {
        [
            &self.user_agent,
            &self.display_resolution,
            &self.color_depth,
            &self.timezone_name,
            &self.timezone_offset,
            &self.cpu_count,
            &self.language,
        ]
    }
}

/// A device identifier: uppercase base-36, at least 8 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    /// Returns the fingerprint of this process, computing it on first use.
    /// Every later call returns the same value for the life of the process.
    pub fn current() -> Self {
        CURRENT
            .get_or_init(|| {
                let fingerprint = Self::from_signals(&EnvironmentSignals::collect());
                tracing::debug!("Device fingerprint generated: {}", fingerprint);
                fingerprint
            })
            .clone()
    }

    /// Computes the fingerprint for an explicit set of signals.
    pub fn from_signals(signals: &EnvironmentSignals) -> Self {
        let combined = signals.ordered().join(SEPARATOR);
        Self::from_raw(&combined)
    }

    fn from_raw(input: &str) -> Self {
        let hash = string_hash(input);
        let mut id = to_base36(hash.unsigned_abs());
        if id.len() < MIN_WIDTH {
            id = format!("{:0>width$}", id, width = MIN_WIDTH);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Java-style string hash over UTF-16 code units, wrapping at 32 bits.
fn string_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

fn to_base36(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn env_or_unknown(name: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// An unset or blank override falls back to the crate's own agent string.
fn user_agent(configured: Option<String>) -> String {
    configured
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(default_user_agent)
}

fn default_user_agent() -> String {
    format!(
        "{}/{} ({}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env::consts::OS,
        env::consts::ARCH
    )
}

/// Local UTC offset in minutes with the browser sign convention
/// (UTC+03:30 is reported as -210).
fn timezone_offset_minutes() -> String {
    let offset_secs = chrono::Local::now().offset().local_minus_utc();
    (-(offset_secs / 60)).to_string()
}

/// `fa_IR.UTF-8` becomes `fa-IR`.
fn language_tag() -> String {
    let raw = env::var("LC_ALL")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| env::var("LANG").ok().filter(|v| !v.is_empty()));

    match raw {
        Some(value) => {
            let base = value.split(['.', '@']).next().unwrap_or_default();
            if base.is_empty() {
                UNKNOWN.to_string()
            } else {
                base.replace('_', "-")
            }
        }
        None => UNKNOWN.to_string(),
    }
}
