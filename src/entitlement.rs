//! Entitlement checks over the stored license state.
//!
//! Everything here is pure and cheap enough to run on every render. Credit
//! checks are advisory: the backend re-validates and decrements the real
//! balance when a paid operation runs.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::models::LicenseState;

/// Where a device sits in the license lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicensePhase {
    /// No successful activation yet (or reset since). Only activation works.
    Unactivated,
    Active,
    /// Activated but past expiry. Features are locked; the shop identity
    /// stays visible.
    Expired,
}

impl LicensePhase {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn shows_identity(&self) -> bool {
        matches!(self, Self::Active | Self::Expired)
    }
}

/// True once `now` is strictly past `expires_at`. The expiry instant itself
/// is still valid; no expiry means never expired.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|exp| now > exp)
}

/// Whole days left, rounded up and never negative. Thirty minutes left is
/// one day; None when there is no expiry.
pub fn remaining_days(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    let diff = expires_at? - now;
    if diff <= TimeDelta::zero() {
        return Some(0);
    }
    let whole = diff.num_days();
    if diff > TimeDelta::days(whole) {
        Some(whole + 1)
    } else {
        Some(whole)
    }
}

pub fn has_sufficient_credit(current: u64, required: u64) -> bool {
    current >= required
}

pub fn phase(state: &LicenseState, now: DateTime<Utc>) -> LicensePhase {
    if !state.is_activated {
        LicensePhase::Unactivated
    } else if is_expired(state.license_expires_at, now) {
        LicensePhase::Expired
    } else {
        LicensePhase::Active
    }
}

/// Snapshot of what the device is entitled to at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub phase: LicensePhase,
    pub usable: bool,
    pub remaining_days: Option<i64>,
    pub credit: u64,
}

impl Entitlement {
    pub fn evaluate(state: &LicenseState, now: DateTime<Utc>) -> Self {
        let phase = phase(state, now);
        Self {
            phase,
            usable: phase.is_usable(),
            remaining_days: remaining_days(state.license_expires_at, now),
            credit: state.credit,
        }
    }

    /// Whether a paid operation costing `required` may be offered.
    pub fn can_afford(&self, required: u64) -> bool {
        self.usable && has_sufficient_credit(self.credit, required)
    }
}
