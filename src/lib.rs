//! Device-bound license activation and entitlement engine.
//!
//! - [`fingerprint`]: per-process device fingerprint used to bind a key
//! - [`api`]: activation/refresh exchange with the licensing backend
//! - [`store`]: the persisted license state and its transitions
//! - [`entitlement`]: pure expiry and credit checks over that state
//! - [`dev`]: in-memory licensing backend for development and tests

pub mod api;
pub mod config;
pub mod dev;
pub mod entitlement;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;

pub use api::{HttpLicensingClient, LicensingApi};
pub use entitlement::{Entitlement, LicensePhase, has_sufficient_credit};
pub use error::{LicenseError, Result};
pub use fingerprint::{DeviceFingerprint, EnvironmentSignals};
pub use models::{LicenseState, ShopRecord};
pub use storage::{FilePersistence, MemoryPersistence, Persistence};
pub use store::LicenseStore;
pub use sync::BestEffortSync;
