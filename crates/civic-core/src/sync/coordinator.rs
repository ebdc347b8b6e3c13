//! Per-feature sync orchestration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::checkpoint::{Feature, SyncCheckpoint};
use super::policy::{evaluate, SyncReason};
use crate::clock::Clock;
use crate::config::{ClientConfig, FeatureSyncConfig};
use crate::db::SettingsStore;
use crate::error::Result;
use crate::geo::{BoundingBox, Location};
use crate::location::{locate_within, LocationProvider};

/// Outcome of a staleness check.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub should_fetch: bool,
    pub reason: SyncReason,
    pub current_location: Option<Location>,
    /// Spatial filter for list endpoints; `None` when the location is
    /// unknown or the radius disables filtering
    pub bbox: Option<BoundingBox>,
}

impl SyncStatus {
    /// Bounding box in `minLon,minLat,maxLon,maxLat` form
    pub fn bbox_string(&self) -> Option<String> {
        self.bbox.map(|bbox| bbox.to_wire())
    }
}

/// Decides when each feature talks to the remote source and remembers when
/// it last did.
///
/// Cheap to clone; clones share the per-feature locks.
#[derive(Clone)]
pub struct SyncCoordinator {
    settings: SettingsStore,
    location: Arc<dyn LocationProvider>,
    clock: Arc<dyn Clock>,
    params: FeatureSyncConfig,
    location_timeout: Duration,
    max_filtered_radius_km: f64,
    locks: Arc<HashMap<Feature, Arc<Mutex<()>>>>,
}

impl SyncCoordinator {
    pub fn new(
        settings: SettingsStore,
        location: Arc<dyn LocationProvider>,
        clock: Arc<dyn Clock>,
        config: &ClientConfig,
    ) -> Self {
        let locks = Feature::ALL
            .into_iter()
            .map(|feature| (feature, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            settings,
            location,
            clock,
            params: config.sync,
            location_timeout: config.location_timeout(),
            max_filtered_radius_km: config.max_filtered_radius_km,
            locks: Arc::new(locks),
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub const fn params(&self) -> &FeatureSyncConfig {
        &self.params
    }

    /// Serialize refreshes of one feature.
    ///
    /// Held from the staleness check until the checkpoint write, so two
    /// concurrent refreshes of the same feature cannot both fetch.
    pub async fn lock(&self, feature: Feature) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get(&feature)
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(())));
        lock.lock_owned().await
    }

    /// Check staleness using the feature's configured radius.
    pub async fn check_sync_status(&self, feature: Feature, force_refresh: bool) -> Result<SyncStatus> {
        let radius_km = self.params.params(feature).radius_km;
        self.check_sync_status_within(feature, force_refresh, radius_km)
            .await
    }

    /// Check staleness and build a bounding box of `radius_km` around the
    /// current position.
    ///
    /// The location fix is bounded by the configured timeout; an unknown
    /// location only disables the location triggers and the bounding box.
    pub async fn check_sync_status_within(
        &self,
        feature: Feature,
        force_refresh: bool,
        radius_km: f64,
    ) -> Result<SyncStatus> {
        let current_location = locate_within(self.location.as_ref(), self.location_timeout).await;
        let checkpoint = self.checkpoint(feature).await?;
        let now = self.clock.now_millis();
        let reason = evaluate(
            force_refresh,
            &checkpoint,
            current_location,
            now,
            &self.params.params(feature),
        );

        let bbox = current_location
            .filter(|_| radius_km > 0.0 && radius_km < self.max_filtered_radius_km)
            .map(|center| BoundingBox::around(center, radius_km));

        tracing::debug!(
            %feature,
            ?reason,
            located = current_location.is_some(),
            last_sync = checkpoint.last_sync_time_millis,
            "Sync check"
        );

        Ok(SyncStatus {
            should_fetch: reason.should_sync(),
            reason,
            current_location,
            bbox,
        })
    }

    /// Last successful sync of `feature`; defaults to never synced.
    pub async fn checkpoint(&self, feature: Feature) -> Result<SyncCheckpoint> {
        let keys = [feature.time_key(), feature.lat_key(), feature.lng_key()];
        let values = self
            .settings
            .get_many(&[keys[0].as_str(), keys[1].as_str(), keys[2].as_str()])
            .await?;
        Ok(SyncCheckpoint::from_values(
            values[0].as_deref(),
            values[1].as_deref(),
            values[2].as_deref(),
        ))
    }

    /// Record a successful fetch. Call only after the fetched data is stored.
    ///
    /// Time and location are written in one transaction. Without a location
    /// the previous coordinates are dropped, so the next located check
    /// counts as a first located sync.
    pub async fn update_sync_success(&self, feature: Feature, location: Option<Location>) -> Result<()> {
        let now = self.clock.now_millis().to_string();
        let time_key = feature.time_key();
        let lat_key = feature.lat_key();
        let lng_key = feature.lng_key();

        match location {
            Some(location) => {
                let lat = location.latitude.to_string();
                let lng = location.longitude.to_string();
                self.settings
                    .set_many(&[
                        (time_key.as_str(), now.as_str()),
                        (lat_key.as_str(), lat.as_str()),
                        (lng_key.as_str(), lng.as_str()),
                    ])
                    .await?;
            }
            None => {
                self.settings
                    .replace(
                        &[(time_key.as_str(), now.as_str())],
                        &[lat_key.as_str(), lng_key.as_str()],
                    )
                    .await?;
            }
        }
        tracing::debug!(%feature, "Sync checkpoint updated");
        Ok(())
    }

    /// Forget the checkpoint of one feature; its next check is stale.
    pub async fn clear_checkpoint(&self, feature: Feature) -> Result<()> {
        let keys = [feature.time_key(), feature.lat_key(), feature.lng_key()];
        self.settings
            .remove(&[keys[0].as_str(), keys[1].as_str(), keys[2].as_str()])
            .await
    }

    pub async fn clear_all_checkpoints(&self) -> Result<()> {
        let keys: Vec<String> = Feature::ALL
            .into_iter()
            .flat_map(|feature| [feature.time_key(), feature.lat_key(), feature.lng_key()])
            .collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.settings.remove(&keys).await
    }
}
