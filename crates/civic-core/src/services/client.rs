//! Wiring of the store, sync coordinator and repositories shared by hosts.

use std::path::Path;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::db::{Database, SettingsStore};
use crate::drafts::DraftManager;
use crate::error::Result;
use crate::location::LocationProvider;
use crate::notify::{NotificationSink, StatusChangeDetector};
use crate::remote::{
    AddressSource, ApiClient, AppointmentSource, InfoSource, OfficeSource, TicketSource,
    UserSource,
};
use crate::repository::{
    AddressRepository, AppointmentRepository, FavoriteRepository, InfoRepository,
    OfficeRepository, RefreshOutcome, TicketRepository, UserRepository,
};
use crate::sync::{Feature, SyncCoordinator};

/// Remote data sources, one per domain.
#[derive(Clone)]
pub struct Sources {
    pub offices: Arc<dyn OfficeSource>,
    pub infos: Arc<dyn InfoSource>,
    pub tickets: Arc<dyn TicketSource>,
    pub appointments: Arc<dyn AppointmentSource>,
    pub addresses: Arc<dyn AddressSource>,
    pub users: Arc<dyn UserSource>,
}

impl Sources {
    /// Every domain served by the same REST client.
    pub fn from_api(api: &ApiClient) -> Self {
        let api = Arc::new(api.clone());
        Self {
            offices: api.clone(),
            infos: api.clone(),
            tickets: api.clone(),
            appointments: api.clone(),
            addresses: api.clone(),
            users: api,
        }
    }
}

/// Platform collaborators supplied by the host.
#[derive(Clone)]
pub struct Platform {
    pub location: Arc<dyn LocationProvider>,
    pub sink: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
}

/// Thread-safe entry point to every repository.
///
/// Cheap to clone; clones share one database and one coordinator.
#[derive(Clone)]
pub struct CivicClient {
    db: Database,
    settings: SettingsStore,
    coordinator: SyncCoordinator,
    sink: Arc<dyn NotificationSink>,
    favorites: FavoriteRepository,
    offices: OfficeRepository,
    infos: InfoRepository,
    tickets: TicketRepository,
    appointments: AppointmentRepository,
    addresses: AddressRepository,
    users: UserRepository,
    drafts: DraftManager,
}

impl CivicClient {
    pub fn new(db: Database, sources: Sources, platform: Platform, config: &ClientConfig) -> Self {
        let settings = SettingsStore::new(db.clone());
        let coordinator = SyncCoordinator::new(
            settings.clone(),
            platform.location,
            platform.clock.clone(),
            config,
        );
        let favorites = FavoriteRepository::new(db.clone(), platform.clock.clone());

        Self {
            offices: OfficeRepository::new(db.clone(), sources.offices, coordinator.clone()),
            infos: InfoRepository::new(
                db.clone(),
                sources.infos,
                coordinator.clone(),
                favorites.clone(),
            ),
            tickets: TicketRepository::new(
                db.clone(),
                sources.tickets.clone(),
                coordinator.clone(),
                favorites.clone(),
            ),
            appointments: AppointmentRepository::new(
                db.clone(),
                sources.appointments,
                coordinator.clone(),
                settings.clone(),
                platform.sink.clone(),
                platform.clock.clone(),
                config.note_retention_millis(),
            ),
            addresses: AddressRepository::new(db.clone(), sources.addresses, platform.clock.clone()),
            users: UserRepository::new(
                db.clone(),
                sources.users,
                coordinator.clone(),
                platform.clock.clone(),
            ),
            drafts: DraftManager::new(db.clone(), sources.tickets, platform.clock),
            sink: platform.sink,
            favorites,
            coordinator,
            settings,
            db,
        }
    }

    /// Open the store at `path` and wire the client.
    pub fn open_path(
        path: impl AsRef<Path>,
        sources: Sources,
        platform: Platform,
        config: &ClientConfig,
    ) -> Result<Self> {
        let db = Database::open(path.as_ref())?;
        tracing::info!("Opened local store at {}", path.as_ref().display());
        Ok(Self::new(db, sources, platform, config))
    }

    pub fn open_in_memory(sources: Sources, platform: Platform, config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, sources, platform, config))
    }

    pub const fn database(&self) -> &Database {
        &self.db
    }

    pub const fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub const fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub const fn favorites(&self) -> &FavoriteRepository {
        &self.favorites
    }

    pub const fn offices(&self) -> &OfficeRepository {
        &self.offices
    }

    pub const fn infos(&self) -> &InfoRepository {
        &self.infos
    }

    pub const fn tickets(&self) -> &TicketRepository {
        &self.tickets
    }

    pub const fn appointments(&self) -> &AppointmentRepository {
        &self.appointments
    }

    pub const fn addresses(&self) -> &AddressRepository {
        &self.addresses
    }

    pub const fn users(&self) -> &UserRepository {
        &self.users
    }

    pub const fn drafts(&self) -> &DraftManager {
        &self.drafts
    }

    /// Detector tracking favorited infos and watched tickets.
    pub fn status_detector(&self) -> StatusChangeDetector {
        StatusChangeDetector::new(self.settings.clone(), self.sink.clone())
            .track(Arc::new(self.tickets.clone()))
            .track(Arc::new(self.infos.clone()))
    }

    /// Refresh every feature concurrently.
    ///
    /// User-scoped features are skipped when nobody is signed in. Each
    /// feature reports its own result; one failure does not stop the rest.
    pub async fn refresh_all(&self, force: bool) -> Vec<(Feature, Result<RefreshOutcome>)> {
        let user_id = match self.users.current_user_id().await {
            Ok(user_id) => user_id,
            Err(error) => {
                tracing::warn!("Could not read session: {error}");
                None
            }
        };

        let (offices, infos, tickets) = tokio::join!(
            self.offices.refresh_offices(force),
            self.infos.refresh_infos(force),
            self.tickets.refresh_tickets(user_id.as_deref(), force),
        );
        let mut results = vec![
            (Feature::Office, offices),
            (Feature::Info, infos),
            (Feature::Ticket, tickets),
        ];

        if let Some(user_id) = user_id.as_deref() {
            let (appointments, profile) = tokio::join!(
                self.appointments.refresh_appointments(user_id, force),
                self.users.refresh_profile(force),
            );
            results.push((Feature::Appointment, appointments));
            results.push((Feature::User, profile));
        }
        results
    }
}
