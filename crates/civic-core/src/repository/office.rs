//! Municipal offices, filtered around the user's position.

use std::sync::Arc;

use super::favorite::watch_favorited;
use super::{begin_refresh, RefreshOutcome};
use crate::db::{Database, EntityCache, LiveQuery};
use crate::error::Result;
use crate::models::{FavoriteType, Favorited, Office};
use crate::remote::OfficeSource;
use crate::sync::{Feature, SyncCoordinator};

#[derive(Clone)]
pub struct OfficeRepository {
    cache: EntityCache<Office>,
    remote: Arc<dyn OfficeSource>,
    coordinator: SyncCoordinator,
}

impl OfficeRepository {
    pub fn new(db: Database, remote: Arc<dyn OfficeSource>, coordinator: SyncCoordinator) -> Self {
        Self {
            cache: EntityCache::new(db),
            remote,
            coordinator,
        }
    }

    pub fn offices(&self) -> LiveQuery<Office> {
        self.cache.watch_all()
    }

    pub fn offices_with_favorites(&self, user_id: impl Into<String>) -> LiveQuery<Favorited<Office>> {
        watch_favorited(self.cache.database(), user_id, FavoriteType::Office, false)
    }

    pub fn favorite_offices(&self, user_id: impl Into<String>) -> LiveQuery<Favorited<Office>> {
        watch_favorited(self.cache.database(), user_id, FavoriteType::Office, true)
    }

    pub async fn cached(&self, id: i64) -> Result<Option<Office>> {
        self.cache.get(id).await
    }

    /// Refresh the offices around the current position when stale.
    pub async fn refresh_offices(&self, force: bool) -> Result<RefreshOutcome> {
        let Some(pending) = begin_refresh(&self.coordinator, Feature::Office, force).await? else {
            return Ok(RefreshOutcome::Skipped);
        };
        let offices = self.remote.list(pending.bbox()).await?;
        self.cache.replace_all(&offices).await?;
        pending.complete(offices.len()).await
    }

    /// Fetch one office and upsert it, bypassing the staleness check.
    pub async fn refresh_entity(&self, id: i64) -> Result<Office> {
        let office = self.remote.get(id).await?;
        self.cache.upsert(&office).await?;
        Ok(office)
    }

    /// Detail read: try the network, fall back to the cache.
    pub async fn office(&self, id: i64) -> Result<Option<Office>> {
        match self.refresh_entity(id).await {
            Ok(office) => Ok(Some(office)),
            Err(error) => {
                tracing::debug!(id, "Office refresh failed, using cache: {error}");
                self.cache.get(id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::db::SettingsStore;
    use crate::error::{Error, RemoteError};
    use crate::geo::Location;
    use crate::repository::FavoriteRepository;
    use crate::sync::SyncParams;
    use crate::test_support::{office, FakeLocation, FakeRemote, ManualClock};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    const HERE: Location = Location::new(48.2082, 16.3738);

    struct Fixture {
        repo: OfficeRepository,
        remote: Arc<FakeRemote<Office>>,
        location: Arc<FakeLocation>,
        clock: Arc<ManualClock>,
        coordinator: SyncCoordinator,
        db: Database,
    }

    fn setup(items: Vec<Office>) -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let mut config = ClientConfig::default();
        config.location_timeout_ms = 50;
        config.sync.office = SyncParams::new(600_000, 5.0, 1.0);
        let clock = Arc::new(ManualClock::new(1_000_000));
        let location = Arc::new(FakeLocation::at(HERE));
        let coordinator = SyncCoordinator::new(
            SettingsStore::new(db.clone()),
            location.clone(),
            clock.clone(),
            &config,
        );
        let remote = Arc::new(FakeRemote::new(items));
        let repo = OfficeRepository::new(db.clone(), remote.clone(), coordinator.clone());
        Fixture {
            repo,
            remote,
            location,
            clock,
            coordinator,
            db,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_refresh_within_interval_is_noop() {
        let fx = setup(vec![office(1), office(2)]);

        let first = fx.repo.refresh_offices(false).await.unwrap();
        fx.clock.advance(60_000);
        let second = fx.repo.refresh_offices(false).await.unwrap();

        assert_eq!(first, RefreshOutcome::Refreshed { count: 2 });
        assert_eq!(second, RefreshOutcome::Skipped);
        assert_eq!(fx.remote.list_calls(), 1);
        assert_eq!(
            fx.coordinator
                .checkpoint(Feature::Office)
                .await
                .unwrap()
                .last_sync_time_millis,
            1_000_000
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refresh_sends_bbox_around_position() {
        let fx = setup(vec![office(1)]);
        fx.repo.refresh_offices(false).await.unwrap();

        let bbox = fx.remote.last_bbox.lock().unwrap().unwrap();
        assert!(bbox.contains(HERE));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_moving_triggers_refresh() {
        let fx = setup(vec![office(1)]);
        fx.repo.refresh_offices(false).await.unwrap();

        fx.location
            .move_to(Location::new(HERE.latitude + 0.05, HERE.longitude));
        let outcome = fx.repo.refresh_offices(false).await.unwrap();
        assert!(outcome.was_fetched());
        assert_eq!(fx.remote.list_calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_refresh_leaves_cache_and_checkpoint() {
        let fx = setup(vec![office(1), office(2)]);
        fx.repo.refresh_offices(false).await.unwrap();
        let cache_before = fx.repo.cache.all().await.unwrap();
        let checkpoint_before = fx.coordinator.checkpoint(Feature::Office).await.unwrap();

        fx.remote.set_items(vec![office(3)]);
        fx.remote.fail_with(RemoteError::NoInternet);
        fx.clock.advance(700_000);
        let error = fx.repo.refresh_offices(false).await.unwrap_err();

        assert!(matches!(error, Error::Remote(RemoteError::NoInternet)));
        assert_eq!(fx.repo.cache.all().await.unwrap(), cache_before);
        assert_eq!(
            fx.coordinator.checkpoint(Feature::Office).await.unwrap(),
            checkpoint_before
        );

        fx.remote.recover();
        let outcome = fx.repo.refresh_offices(false).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Refreshed { count: 1 });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_refreshes_fetch_once() {
        let fx = setup(vec![office(1)]);
        fx.remote.delay_lists(std::time::Duration::from_millis(50));

        let (a, b) = tokio::join!(fx.repo.refresh_offices(false), fx.repo.refresh_offices(false));
        let fetched = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|outcome| outcome.was_fetched())
            .count();
        assert_eq!(fetched, 1);
        assert_eq!(fx.remote.list_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_detail_falls_back_to_cache() {
        let fx = setup(vec![office(1)]);
        fx.repo.refresh_offices(true).await.unwrap();
        fx.remote.fail_with(RemoteError::RequestTimeout);

        assert_eq!(fx.repo.office(1).await.unwrap(), Some(office(1)));
        assert_eq!(fx.repo.office(9).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_live_list_reflects_refresh_and_favorites() {
        let fx = setup(vec![office(1), office(2)]);
        let favorites = FavoriteRepository::new(fx.db.clone(), fx.clock.clone());
        let mut live = fx.repo.offices();
        assert!(live.next().await.unwrap().is_empty());

        fx.repo.refresh_offices(false).await.unwrap();
        assert_eq!(live.next().await.unwrap().len(), 2);

        favorites
            .toggle("alice", 2, FavoriteType::Office)
            .await
            .unwrap();
        let mut favorite_live = fx.repo.favorite_offices("alice");
        let rows = favorite_live.next().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item.id, 2);
    }
}
