//! Informational notices published by the municipality.

use std::sync::Arc;

use async_trait::async_trait;

use super::favorite::watch_favorited;
use super::{begin_refresh, FavoriteRepository, RefreshOutcome};
use crate::db::{CachedEntity, Database, EntityCache, LiveQuery};
use crate::error::Result;
use crate::models::{FavoriteType, Favorited, Info, NotificationSettings};
use crate::notify::{StatusTracked, TrackedEntity};
use crate::remote::InfoSource;
use crate::sync::{Feature, SyncCoordinator};

#[derive(Clone)]
pub struct InfoRepository {
    cache: EntityCache<Info>,
    remote: Arc<dyn InfoSource>,
    coordinator: SyncCoordinator,
    favorites: FavoriteRepository,
}

impl InfoRepository {
    pub fn new(
        db: Database,
        remote: Arc<dyn InfoSource>,
        coordinator: SyncCoordinator,
        favorites: FavoriteRepository,
    ) -> Self {
        Self {
            cache: EntityCache::new(db),
            remote,
            coordinator,
            favorites,
        }
    }

    /// Newest first
    pub fn infos(&self) -> LiveQuery<Info> {
        self.cache.watch_all()
    }

    pub fn infos_with_favorites(&self, user_id: impl Into<String>) -> LiveQuery<Favorited<Info>> {
        watch_favorited(self.cache.database(), user_id, FavoriteType::Info, false)
    }

    pub fn favorite_infos(&self, user_id: impl Into<String>) -> LiveQuery<Favorited<Info>> {
        watch_favorited(self.cache.database(), user_id, FavoriteType::Info, true)
    }

    pub async fn cached(&self, id: i64) -> Result<Option<Info>> {
        self.cache.get(id).await
    }

    pub async fn refresh_infos(&self, force: bool) -> Result<RefreshOutcome> {
        let Some(pending) = begin_refresh(&self.coordinator, Feature::Info, force).await? else {
            return Ok(RefreshOutcome::Skipped);
        };
        let infos = self.remote.list(pending.bbox()).await?;
        self.cache.replace_all(&infos).await?;
        pending.complete(infos.len()).await
    }

    pub async fn refresh_entity(&self, id: i64) -> Result<Info> {
        let info = self.remote.get(id).await?;
        self.cache.upsert(&info).await?;
        Ok(info)
    }

    pub async fn info(&self, id: i64) -> Result<Option<Info>> {
        match self.refresh_entity(id).await {
            Ok(info) => Ok(Some(info)),
            Err(error) => {
                tracing::debug!(id, "Info refresh failed, using cache: {error}");
                self.cache.get(id).await
            }
        }
    }
}

#[async_trait]
impl StatusTracked for InfoRepository {
    fn domain(&self) -> &'static str {
        "info"
    }

    fn notifications_enabled(&self, settings: &NotificationSettings) -> bool {
        settings.infos_enabled()
    }

    async fn watched_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        self.favorites.ids(user_id, FavoriteType::Info).await
    }

    async fn remote_status(&self, id: i64) -> Result<Option<String>> {
        Ok(self.remote.status(id).await?.map(|dto| dto.status))
    }

    async fn cached_status(&self, id: i64) -> Result<Option<String>> {
        self.cache.status_of(id).await
    }

    async fn refresh_tracked(&self, id: i64) -> Result<TrackedEntity> {
        let info = self.refresh_entity(id).await?;
        Ok(TrackedEntity {
            id,
            title: info.title().to_string(),
            status: info.status,
        })
    }
}
