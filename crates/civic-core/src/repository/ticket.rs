//! Citizen tickets: nearby and own, with votes and favorites.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::favorite::watch_favorited;
use super::{begin_refresh, FavoriteRepository, RefreshOutcome};
use crate::db::{live_query, select_by_owner, Database, EntityCache, LiveQuery, Table};
use crate::drafts::select_drafts;
use crate::error::Result;
use crate::models::{FavoriteType, Favorited, MyTicket, NotificationSettings, Ticket};
use crate::notify::{StatusTracked, TrackedEntity};
use crate::remote::{TicketQuery, TicketSource};
use crate::sync::{Feature, SyncCoordinator};

#[derive(Clone)]
pub struct TicketRepository {
    cache: EntityCache<Ticket>,
    remote: Arc<dyn TicketSource>,
    coordinator: SyncCoordinator,
    favorites: FavoriteRepository,
}

impl TicketRepository {
    pub fn new(
        db: Database,
        remote: Arc<dyn TicketSource>,
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

    /// Most recently updated first
    pub fn tickets(&self) -> LiveQuery<Ticket> {
        self.cache.watch_all()
    }

    pub fn tickets_with_favorites(&self, user_id: impl Into<String>) -> LiveQuery<Favorited<Ticket>> {
        watch_favorited(self.cache.database(), user_id, FavoriteType::Ticket, false)
    }

    pub fn favorite_tickets(&self, user_id: impl Into<String>) -> LiveQuery<Favorited<Ticket>> {
        watch_favorited(self.cache.database(), user_id, FavoriteType::Ticket, true)
    }

    /// The user's submitted tickets followed by their drafts.
    ///
    /// Drafts never enter the ticket cache; the two lists are merged here
    /// as a tagged union.
    pub fn my_tickets(&self, user_id: impl Into<String>) -> LiveQuery<MyTicket> {
        let user_id = user_id.into();
        live_query(
            self.cache.database().clone(),
            vec![Table::Tickets, Table::TicketDrafts],
            move |conn| {
                let remote = select_by_owner::<Ticket>(conn, &user_id)?;
                let drafts = select_drafts(conn, &user_id)?;
                Ok(remote
                    .into_iter()
                    .map(MyTicket::Remote)
                    .chain(drafts.into_iter().map(MyTicket::Draft))
                    .collect())
            },
        )
    }

    pub async fn cached(&self, id: i64) -> Result<Option<Ticket>> {
        self.cache.get(id).await
    }

    /// Refresh tickets around the current position plus, when signed in,
    /// the user's own tickets wherever they are.
    pub async fn refresh_tickets(&self, user_id: Option<&str>, force: bool) -> Result<RefreshOutcome> {
        let Some(pending) = begin_refresh(&self.coordinator, Feature::Ticket, force).await? else {
            return Ok(RefreshOutcome::Skipped);
        };
        let query = TicketQuery {
            bbox: pending.bbox(),
            user_id: user_id.map(str::to_string),
        };
        let tickets = self.remote.list(&query).await?;
        self.cache.replace_all(&tickets).await?;
        pending.complete(tickets.len()).await
    }

    pub async fn refresh_entity(&self, id: i64) -> Result<Ticket> {
        let ticket = self.remote.get(id).await?;
        self.cache.upsert(&ticket).await?;
        Ok(ticket)
    }

    pub async fn ticket(&self, id: i64) -> Result<Option<Ticket>> {
        match self.refresh_entity(id).await {
            Ok(ticket) => Ok(Some(ticket)),
            Err(error) => {
                tracing::debug!(id, "Ticket refresh failed, using cache: {error}");
                self.cache.get(id).await
            }
        }
    }

    /// Upvote a ticket and store the server's updated copy.
    pub async fn vote(&self, id: i64) -> Result<Ticket> {
        let ticket = self.remote.vote(id).await?;
        self.cache.upsert(&ticket).await?;
        tracing::info!(id, votes = ticket.votes, "Voted on ticket");
        Ok(ticket)
    }
}

#[async_trait]
impl StatusTracked for TicketRepository {
    fn domain(&self) -> &'static str {
        "ticket"
    }

    fn notifications_enabled(&self, settings: &NotificationSettings) -> bool {
        settings.tickets_enabled()
    }

    /// Favorites first, then own tickets not already favorited.
    async fn watched_ids(&self, user_id: &str) -> Result<Vec<i64>> {
        let favorites = self.favorites.ids(user_id, FavoriteType::Ticket).await?;
        let own = self.cache.by_owner(user_id).await?;

        let mut seen = HashSet::new();
        Ok(favorites
            .into_iter()
            .chain(own.into_iter().map(|ticket| ticket.id))
            .filter(|id| seen.insert(*id))
            .collect())
    }

    async fn remote_status(&self, id: i64) -> Result<Option<String>> {
        Ok(self.remote.status(id).await?.map(|dto| dto.status))
    }

    async fn cached_status(&self, id: i64) -> Result<Option<String>> {
        self.cache.status_of(id).await
    }

    async fn refresh_tracked(&self, id: i64) -> Result<TrackedEntity> {
        let ticket = self.refresh_entity(id).await?;
        Ok(TrackedEntity {
            id,
            title: ticket.title,
            status: ticket.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::ClientConfig;
    use crate::db::SettingsStore;
    use crate::drafts::DraftManager;
    use crate::geo::Location;
    use crate::models::DraftInput;
    use crate::test_support::{ticket, FakeLocation, FakeRemote, ManualClock};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    const HERE: Location = Location::new(48.2082, 16.3738);

    struct Fixture {
        repo: TicketRepository,
        remote: Arc<FakeRemote<Ticket>>,
        favorites: FavoriteRepository,
        drafts: DraftManager,
    }

    fn owned(id: i64, owner: &str) -> Ticket {
        let mut ticket = ticket(id, "OPEN");
        ticket.created_by = Some(owner.to_string());
        ticket
    }

    fn setup(items: Vec<Ticket>) -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let mut config = ClientConfig::default();
        config.location_timeout_ms = 50;
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(10_000_000));
        let coordinator = SyncCoordinator::new(
            SettingsStore::new(db.clone()),
            Arc::new(FakeLocation::at(HERE)),
            clock.clone(),
            &config,
        );
        let favorites = FavoriteRepository::new(db.clone(), clock.clone());
        let remote = Arc::new(FakeRemote::new(items));
        let repo = TicketRepository::new(db.clone(), remote.clone(), coordinator, favorites.clone());
        let drafts = DraftManager::new(db, remote.clone(), clock);
        Fixture {
            repo,
            remote,
            favorites,
            drafts,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refresh_queries_area_and_user() {
        let fx = setup(vec![owned(1, "alice")]);
        fx.repo.refresh_tickets(Some("alice"), false).await.unwrap();

        let query = fx.remote.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.user_id.as_deref(), Some("alice"));
        assert!(query.bbox.unwrap().contains(HERE));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watched_ids_dedupes_favorites_and_own() {
        let fx = setup(vec![owned(1, "alice"), owned(2, "alice"), owned(3, "bob")]);
        fx.repo.refresh_tickets(Some("alice"), true).await.unwrap();
        fx.favorites
            .toggle("alice", 2, FavoriteType::Ticket)
            .await
            .unwrap();
        fx.favorites
            .toggle("alice", 3, FavoriteType::Ticket)
            .await
            .unwrap();

        let mut ids = fx.repo.watched_ids("alice").await.unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_vote_updates_cached_row() {
        let fx = setup(vec![owned(1, "bob")]);
        fx.repo.refresh_tickets(None, true).await.unwrap();

        let voted = fx.repo.vote(1).await.unwrap();
        assert_eq!(voted.votes, 1);
        let cached = fx.repo.cached(1).await.unwrap().unwrap();
        assert!(cached.has_voted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_my_tickets_lists_remote_then_drafts() {
        let fx = setup(vec![owned(1, "alice"), owned(2, "bob")]);
        fx.repo.refresh_tickets(Some("alice"), true).await.unwrap();
        fx.drafts
            .create(
                "alice",
                DraftInput {
                    title: "Broken bench".into(),
                    ..DraftInput::default()
                },
            )
            .await
            .unwrap();

        let mine = fx.repo.my_tickets("alice").next().await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(matches!(&mine[0], MyTicket::Remote(ticket) if ticket.id == 1));
        assert!(mine[1].is_draft());
        assert_eq!(mine[1].title(), "Broken bench");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_drafts_survive_ticket_replace_all() {
        let fx = setup(vec![owned(1, "alice")]);
        fx.drafts
            .create("alice", DraftInput::default())
            .await
            .unwrap();
        fx.repo.refresh_tickets(Some("alice"), true).await.unwrap();
        fx.remote.set_items(Vec::new());
        fx.repo.refresh_tickets(Some("alice"), true).await.unwrap();

        let mine = fx.repo.my_tickets("alice").next().await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine[0].is_draft());
    }
}
