//! Staleness decision.
//!
//! Pure and deterministic: everything the decision depends on, including the
//! current time, is passed in.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::checkpoint::SyncCheckpoint;
use crate::geo::Location;

/// Tunable staleness parameters for one feature domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncParams {
    /// Maximum age of the cache before a time-based refresh
    pub interval_ms: i64,
    /// Radius of the bounding box sent to spatially filtered endpoints
    pub radius_km: f64,
    /// Movement since the last sync that triggers a refresh; `null` in a
    /// config file disables movement checks
    #[serde(with = "unbounded_km")]
    pub location_threshold_km: f64,
}

/// Infinite distances travel as `null`, which JSON can represent.
mod unbounded_km {
    use super::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

impl SyncParams {
    pub const fn new(interval_ms: i64, radius_km: f64, location_threshold_km: f64) -> Self {
        Self {
            interval_ms,
            radius_km,
            location_threshold_km,
        }
    }
}

impl Default for SyncParams {
    fn default() -> Self {
        Self::new(30 * 60 * 1000, 10.0, 2.0)
    }
}

/// Why a refresh is (or is not) due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    Forced,
    Stale,
    FirstLocatedSync,
    Moved,
    UpToDate,
}

impl SyncReason {
    pub const fn should_sync(self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Evaluate the staleness rules in order; first match wins.
pub fn evaluate(
    force_refresh: bool,
    checkpoint: &SyncCheckpoint,
    current_location: Option<Location>,
    now_millis: i64,
    params: &SyncParams,
) -> SyncReason {
    if force_refresh {
        return SyncReason::Forced;
    }

    if now_millis.saturating_sub(checkpoint.last_sync_time_millis) > params.interval_ms {
        return SyncReason::Stale;
    }

    match (current_location, checkpoint.last_location) {
        (Some(_), None) => SyncReason::FirstLocatedSync,
        (Some(current), Some(last))
            if current.distance_km(&last) > params.location_threshold_km =>
        {
            SyncReason::Moved
        }
        _ => SyncReason::UpToDate,
    }
}

/// Boolean form of [`evaluate`].
pub fn should_sync(
    force_refresh: bool,
    checkpoint: &SyncCheckpoint,
    current_location: Option<Location>,
    now_millis: i64,
    params: &SyncParams,
) -> bool {
    evaluate(force_refresh, checkpoint, current_location, now_millis, params).should_sync()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: i64 = 600_000;
    const HERE: Location = Location::new(48.2082, 16.3738);

    fn params() -> SyncParams {
        SyncParams::new(INTERVAL, 10.0, 1.0)
    }

    fn synced_at(time: i64, location: Option<Location>) -> SyncCheckpoint {
        SyncCheckpoint {
            last_sync_time_millis: time,
            last_location: location,
        }
    }

    #[test]
    fn force_refresh_always_syncs() {
        let checkpoint = synced_at(1_000, Some(HERE));
        assert!(should_sync(true, &checkpoint, Some(HERE), 1_000, &params()));
        assert!(should_sync(true, &checkpoint, None, 1_000, &params()));
        assert_eq!(
            evaluate(true, &checkpoint, Some(HERE), 1_000, &params()),
            SyncReason::Forced
        );
    }

    #[test]
    fn interval_boundary_is_exclusive() {
        let checkpoint = synced_at(100_000, Some(HERE));
        let at_boundary = 100_000 + INTERVAL;

        assert!(!should_sync(false, &checkpoint, Some(HERE), at_boundary - 1, &params()));
        assert!(!should_sync(false, &checkpoint, Some(HERE), at_boundary, &params()));
        assert!(should_sync(false, &checkpoint, Some(HERE), at_boundary + 1, &params()));
    }

    #[test]
    fn known_location_without_baseline_syncs() {
        let checkpoint = synced_at(100_000, None);
        assert_eq!(
            evaluate(false, &checkpoint, Some(HERE), 100_001, &params()),
            SyncReason::FirstLocatedSync
        );
    }

    #[test]
    fn unknown_location_disables_location_trigger() {
        let checkpoint = synced_at(100_000, None);
        assert!(!should_sync(false, &checkpoint, None, 100_001, &params()));

        let checkpoint = synced_at(100_000, Some(HERE));
        assert!(!should_sync(false, &checkpoint, None, 100_001, &params()));
    }

    #[test]
    fn movement_beyond_threshold_syncs() {
        let checkpoint = synced_at(100_000, Some(HERE));
        // ~2.2 km north
        let moved = Location::new(HERE.latitude + 0.02, HERE.longitude);
        // ~110 m north
        let nudged = Location::new(HERE.latitude + 0.001, HERE.longitude);

        assert_eq!(
            evaluate(false, &checkpoint, Some(moved), 100_001, &params()),
            SyncReason::Moved
        );
        assert!(!should_sync(false, &checkpoint, Some(nudged), 100_001, &params()));
    }

    #[test]
    fn never_synced_is_stale() {
        let checkpoint = SyncCheckpoint::default();
        assert_eq!(
            evaluate(false, &checkpoint, None, 700_000, &params()),
            SyncReason::Stale
        );
    }
}
