//! Device location access.

use std::time::Duration;

use async_trait::async_trait;

use crate::geo::Location;

/// Platform location service.
///
/// Returns `None` when permission is denied or no fix is available.
/// Callers bound the wait with a timeout and drop the future when it
/// expires, so implementations must cancel the underlying fix request
/// (unregister listeners, release the provider) on drop.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Option<Location>;
}

/// Provider with a preconfigured position, for hosts without GPS.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation(pub Option<Location>);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Option<Location> {
        self.0
    }
}

/// Ask `provider` for a fix, resolving to `None` after `timeout`.
///
/// Never fails: an unavailable location only disables location-based
/// triggers downstream.
pub async fn locate_within(provider: &dyn LocationProvider, timeout: Duration) -> Option<Location> {
    if let Ok(location) = tokio::time::timeout(timeout, provider.current_location()).await {
        location
    } else {
        tracing::debug!("Location fix timed out after {timeout:?}");
        None
    }
}
