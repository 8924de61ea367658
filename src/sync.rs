//! Fail-open policy for background syncs.

use std::future::Future;

use crate::error::Result;

/// Background syncs never surface errors: a failure is logged and dropped,
/// and the caller keeps whatever it had cached. Used for license refresh,
/// where a network hiccup must not lock the user out.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestEffortSync;

impl BestEffortSync {
    /// Returns the value on success, None (after logging) on failure.
    pub fn apply<T>(&self, operation: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{} failed, keeping cached state: {}", operation, e);
                None
            }
        }
    }

    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.apply(operation, fut.await)
    }
}
