//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::db::CachedEntity;
use crate::error::{RemoteError, RemoteResult};
use crate::geo::{BoundingBox, Location};
use crate::location::LocationProvider;
use crate::models::{
    AddressSuggestion, Appointment, Credentials, Info, NewAppointment, NewTicket, Office, Session,
    Ticket, UserProfile,
};
use crate::notify::{Notification, NotificationSink, SinkError};
use crate::remote::{
    AddressSource, AppointmentSource, ImageUpload, InfoSource, OfficeSource, StatusDto,
    TicketQuery, TicketSource, UserSource,
};

pub fn ticket(id: i64, status: &str) -> Ticket {
    Ticket {
        id,
        title: format!("Ticket {id}"),
        description: String::new(),
        category: None,
        status: status.to_string(),
        latitude: 48.2,
        longitude: 16.37,
        address: None,
        created_by: None,
        created_at: 0,
        updated_at: 0,
        votes: 0,
        has_voted: false,
        image_urls: Vec::new(),
    }
}

pub fn info(id: i64, status: &str) -> Info {
    Info {
        id,
        title: format!("Info {id}"),
        content: String::new(),
        category: None,
        status: status.to_string(),
        latitude: None,
        longitude: None,
        published_at: 0,
    }
}

pub fn office(id: i64) -> Office {
    Office {
        id,
        name: format!("Office {id}"),
        address: "Town Hall Square 1".to_string(),
        latitude: 48.2,
        longitude: 16.37,
        phone: None,
        email: None,
        opening_hours: None,
        category: None,
    }
}

pub fn appointment(id: i64, user_id: &str, starts_at: i64) -> Appointment {
    Appointment {
        id,
        user_id: user_id.to_string(),
        office_id: 1,
        title: format!("Appointment {id}"),
        status: "CONFIRMED".to_string(),
        starts_at,
        ends_at: None,
        office_name: None,
    }
}

/// Clock advanced by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub const fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Location provider that counts fix requests and their release.
#[derive(Debug, Default)]
pub struct FakeLocation {
    location: Mutex<Option<Location>>,
    hang: bool,
    pub started: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

struct ReleaseOnDrop(Arc<AtomicUsize>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeLocation {
    pub fn at(location: Location) -> Self {
        Self {
            location: Mutex::new(Some(location)),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Never produces a fix.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn move_to(&self, location: Location) {
        *self.location.lock().unwrap() = Some(location);
    }
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn current_location(&self) -> Option<Location> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _release = ReleaseOnDrop(self.released.clone());
        if self.hang {
            std::future::pending::<()>().await;
        }
        *self.location.lock().unwrap()
    }
}

/// Scripted remote collection shared by the domain source fakes.
pub struct FakeRemote<T> {
    pub items: Mutex<Vec<T>>,
    failure: Mutex<Option<RemoteError>>,
    statuses: Mutex<HashMap<i64, RemoteResult<Option<StatusDto>>>>,
    failing_uploads: Mutex<HashSet<String>>,
    pub uploads: Mutex<Vec<String>>,
    pub last_bbox: Mutex<Option<BoundingBox>>,
    pub last_query: Mutex<Option<TicketQuery>>,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    next_id: AtomicI64,
    list_delay: Mutex<Option<Duration>>,
}

impl<T: CachedEntity> FakeRemote<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items),
            failure: Mutex::new(None),
            statuses: Mutex::new(HashMap::new()),
            failing_uploads: Mutex::new(HashSet::new()),
            uploads: Mutex::new(Vec::new()),
            last_bbox: Mutex::new(None),
            last_query: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            next_id: AtomicI64::new(1_000),
            list_delay: Mutex::new(None),
        }
    }

    /// Fail every list, get and create call with `error`.
    pub fn fail_with(&self, error: RemoteError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn set_items(&self, items: Vec<T>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn set_status(&self, id: i64, status: &str) {
        self.statuses.lock().unwrap().insert(
            id,
            Ok(Some(StatusDto {
                status: status.to_string(),
                message: None,
            })),
        );
    }

    pub fn fail_status(&self, id: i64, error: RemoteError) {
        self.statuses.lock().unwrap().insert(id, Err(error));
    }

    pub fn fail_upload(&self, file_name: &str) {
        self.failing_uploads
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    pub fn delay_lists(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> RemoteResult<()> {
        self.failure.lock().unwrap().clone().map_or(Ok(()), Err)
    }

    async fn list_items(&self) -> RemoteResult<Vec<T>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(self.items.lock().unwrap().clone())
    }

    fn get_item(&self, id: i64) -> RemoteResult<T> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id() == id)
            .cloned()
            .ok_or_else(|| RemoteError::Server {
                status: 404,
                message: format!("{id} not found"),
            })
    }

    fn status_of(&self, id: i64) -> RemoteResult<Option<StatusDto>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.statuses.lock().unwrap().get(&id) {
            return scripted.clone();
        }
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item.id() == id)
            .and_then(|item| item.status().map(str::to_string))
            .map(|status| StatusDto {
                status,
                message: None,
            }))
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl OfficeSource for FakeRemote<Office> {
    async fn list(&self, bbox: Option<BoundingBox>) -> RemoteResult<Vec<Office>> {
        *self.last_bbox.lock().unwrap() = bbox;
        self.list_items().await
    }

    async fn get(&self, id: i64) -> RemoteResult<Office> {
        self.get_item(id)
    }
}

#[async_trait]
impl InfoSource for FakeRemote<Info> {
    async fn list(&self, bbox: Option<BoundingBox>) -> RemoteResult<Vec<Info>> {
        *self.last_bbox.lock().unwrap() = bbox;
        self.list_items().await
    }

    async fn get(&self, id: i64) -> RemoteResult<Info> {
        self.get_item(id)
    }

    async fn status(&self, id: i64) -> RemoteResult<Option<StatusDto>> {
        self.status_of(id)
    }
}

#[async_trait]
impl TicketSource for FakeRemote<Ticket> {
    async fn list(&self, query: &TicketQuery) -> RemoteResult<Vec<Ticket>> {
        *self.last_query.lock().unwrap() = Some(query.clone());
        self.list_items().await
    }

    async fn get(&self, id: i64) -> RemoteResult<Ticket> {
        self.get_item(id)
    }

    async fn status(&self, id: i64) -> RemoteResult<Option<StatusDto>> {
        self.status_of(id)
    }

    async fn create(&self, new: &NewTicket) -> RemoteResult<Ticket> {
        self.check()?;
        let id = self.next_id();
        let created = Ticket {
            id,
            title: new.title.clone(),
            description: new.description.clone(),
            category: new.category.clone(),
            status: "OPEN".to_string(),
            latitude: new.latitude,
            longitude: new.longitude,
            address: new.address.clone(),
            created_by: Some("alice".to_string()),
            created_at: 1,
            updated_at: 1,
            votes: 0,
            has_voted: false,
            image_urls: Vec::new(),
        };
        self.items.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn upload_image(&self, ticket_id: i64, image: &ImageUpload) -> RemoteResult<String> {
        if self
            .failing_uploads
            .lock()
            .unwrap()
            .contains(&image.file_name)
        {
            return Err(RemoteError::Server {
                status: 413,
                message: "payload too large".to_string(),
            });
        }
        self.uploads.lock().unwrap().push(image.file_name.clone());
        Ok(format!("https://cdn.test/{ticket_id}/{}", image.file_name))
    }

    async fn vote(&self, ticket_id: i64) -> RemoteResult<Ticket> {
        self.check()?;
        let mut items = self.items.lock().unwrap();
        let ticket = items
            .iter_mut()
            .find(|ticket| ticket.id == ticket_id)
            .ok_or_else(|| RemoteError::Server {
                status: 404,
                message: "not found".to_string(),
            })?;
        ticket.votes += 1;
        ticket.has_voted = true;
        Ok(ticket.clone())
    }
}

#[async_trait]
impl AppointmentSource for FakeRemote<Appointment> {
    async fn list(&self, user_id: &str) -> RemoteResult<Vec<Appointment>> {
        let items = self.list_items().await?;
        Ok(items
            .into_iter()
            .filter(|appointment| appointment.user_id == user_id)
            .collect())
    }

    async fn get(&self, id: i64) -> RemoteResult<Appointment> {
        self.get_item(id)
    }

    async fn create(&self, new: &NewAppointment) -> RemoteResult<Appointment> {
        self.check()?;
        let created = Appointment {
            id: self.next_id(),
            user_id: "alice".to_string(),
            office_id: new.office_id,
            title: new.title.clone(),
            status: "CONFIRMED".to_string(),
            starts_at: new.starts_at,
            ends_at: None,
            office_name: None,
        };
        self.items.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn cancel(&self, id: i64) -> RemoteResult<()> {
        self.check()?;
        self.items
            .lock()
            .unwrap()
            .retain(|appointment| appointment.id != id);
        Ok(())
    }
}

/// Address lookup returning canned suggestions.
#[derive(Default)]
pub struct FakeAddresses {
    pub suggestions: Vec<AddressSuggestion>,
    pub queries: Mutex<Vec<(String, Option<BoundingBox>)>>,
}

#[async_trait]
impl AddressSource for FakeAddresses {
    async fn search(
        &self,
        query: &str,
        bbox: Option<BoundingBox>,
    ) -> RemoteResult<Vec<AddressSuggestion>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), bbox));
        Ok(self
            .suggestions
            .iter()
            .filter(|suggestion| suggestion.label.contains(query))
            .cloned()
            .collect())
    }

    async fn reverse(&self, location: Location) -> RemoteResult<Option<AddressSuggestion>> {
        Ok(self
            .suggestions
            .iter()
            .min_by(|a, b| {
                a.location()
                    .distance_km(&location)
                    .total_cmp(&b.location().distance_km(&location))
            })
            .cloned())
    }
}

/// Account backend accepting a single password.
pub struct FakeUsers {
    pub profile: Mutex<UserProfile>,
    pub profile_calls: AtomicUsize,
    failure: Mutex<Option<RemoteError>>,
}

impl FakeUsers {
    pub fn new(user_id: &str) -> Self {
        Self {
            profile: Mutex::new(UserProfile {
                id: user_id.to_string(),
                display_name: "Alice".to_string(),
                email: Some("alice@example.com".to_string()),
                phone: None,
            }),
            profile_calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    pub fn fail_with(&self, error: RemoteError) {
        *self.failure.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl UserSource for FakeUsers {
    async fn login(&self, credentials: &Credentials) -> RemoteResult<Session> {
        if credentials.password != "secret" {
            return Err(RemoteError::Server {
                status: 401,
                message: "invalid credentials".to_string(),
            });
        }
        Ok(Session {
            user_id: self.profile.lock().unwrap().id.clone(),
            access_token: "token-123".to_string(),
            expires_at: i64::MAX,
        })
    }

    async fn profile(&self, user_id: &str) -> RemoteResult<UserProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        let profile = self.profile.lock().unwrap().clone();
        if profile.id == user_id {
            Ok(profile)
        } else {
            Err(RemoteError::Server {
                status: 403,
                message: "forbidden".to_string(),
            })
        }
    }
}

/// Sink that records every call.
#[derive(Default)]
pub struct RecordingSink {
    pub shown: Mutex<Vec<Notification>>,
    pub scheduled: Mutex<Vec<(Notification, i64)>>,
    pub cancelled: Mutex<Vec<String>>,
    pub fail_schedule: AtomicBool,
}

impl RecordingSink {
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn show(&self, notification: &Notification) -> Result<(), SinkError> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn schedule(&self, notification: &Notification, at_millis: i64) -> Result<(), SinkError> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(SinkError::PermissionDenied("exact alarms not permitted".into()));
        }
        self.scheduled
            .lock()
            .unwrap()
            .push((notification.clone(), at_millis));
        Ok(())
    }

    async fn cancel_scheduled(&self, id: &str) -> Result<(), SinkError> {
        self.cancelled.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
