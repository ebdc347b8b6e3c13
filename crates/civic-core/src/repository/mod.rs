//! Domain repositories
//!
//! Every repository reads from its local cache (live queries that never
//! touch the network) and refreshes through the [`SyncCoordinator`]:
//!
//! 1. take the feature lock and ask the coordinator whether a fetch is due,
//! 2. fetch from the remote source (bounding box for spatial domains),
//! 3. store the result (replace-all for collections, upsert for one row),
//! 4. record the checkpoint.
//!
//! A failure at step 2 or 3 returns the error and leaves both the cache and
//! the checkpoint as they were.

mod address;
mod appointment;
mod favorite;
mod info;
mod office;
mod ticket;
mod user;

pub use address::AddressRepository;
pub use appointment::AppointmentRepository;
pub use favorite::FavoriteRepository;
pub use info::InfoRepository;
pub use office::OfficeRepository;
pub use ticket::TicketRepository;
pub use user::UserRepository;

use tokio::sync::OwnedMutexGuard;

use crate::error::Result;
use crate::geo::{BoundingBox, Location};
use crate::sync::{Feature, SyncCoordinator, SyncStatus};

/// Result of a refresh call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache was fresh enough; nothing was fetched
    Skipped,
    /// The cache now mirrors the remote collection
    Refreshed { count: usize },
}

impl RefreshOutcome {
    pub const fn was_fetched(self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

/// A refresh that was found due and holds the feature lock.
///
/// Dropping it without [`complete`](Self::complete) releases the lock and
/// leaves the checkpoint untouched.
pub(crate) struct PendingRefresh<'a> {
    coordinator: &'a SyncCoordinator,
    feature: Feature,
    status: SyncStatus,
    _guard: OwnedMutexGuard<()>,
}

impl PendingRefresh<'_> {
    pub(crate) const fn bbox(&self) -> Option<BoundingBox> {
        self.status.bbox
    }

    pub(crate) const fn location(&self) -> Option<Location> {
        self.status.current_location
    }

    /// Record the checkpoint. Call after the fetched data is stored.
    pub(crate) async fn complete(self, count: usize) -> Result<RefreshOutcome> {
        self.coordinator
            .update_sync_success(self.feature, self.status.current_location)
            .await?;
        tracing::info!(feature = %self.feature, count, reason = ?self.status.reason, "Refreshed");
        Ok(RefreshOutcome::Refreshed { count })
    }
}

/// Lock `feature` and check whether a fetch is due.
///
/// Returns `None` when the cache is fresh; the lock is released at once.
pub(crate) async fn begin_refresh(
    coordinator: &SyncCoordinator,
    feature: Feature,
    force: bool,
) -> Result<Option<PendingRefresh<'_>>> {
    let guard = coordinator.lock(feature).await;
    let status = coordinator.check_sync_status(feature, force).await?;
    if !status.should_fetch {
        tracing::debug!(%feature, "Cache is fresh, skipping refresh");
        return Ok(None);
    }
    Ok(Some(PendingRefresh {
        coordinator,
        feature,
        status,
        _guard: guard,
    }))
}
