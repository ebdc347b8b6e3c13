//! REST implementation of the remote data sources.
//!
//! All transport and decoding failures are classified here into
//! [`RemoteError`]; nothing above this module sees a `reqwest::Error`.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    AddressSource, AppointmentSource, ImageUpload, InfoSource, OfficeSource, StatusDto,
    TicketQuery, TicketSource, UserSource,
};
use crate::error::{Error, RemoteError, RemoteResult};
use crate::geo::{BoundingBox, Location};
use crate::models::{
    AddressSuggestion, Appointment, Credentials, Info, NewAppointment, NewTicket, Office, Session,
    Ticket, UserProfile,
};
use crate::util::{compact_text, normalize_base_url};

/// HTTP client for the community services API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    access_token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds a client for an explicit API base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let base_url = normalize_base_url(&base_url.into()).map_err(Error::InvalidInput)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::InvalidInput(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self {
            base_url,
            client,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Install or clear the bearer token sent with every request.
    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.write() {
            *guard = token;
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json");
        let token = self
            .access_token
            .read()
            .ok()
            .and_then(|guard| guard.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(request: RequestBuilder) -> RemoteResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|error| classify_transport(&error))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        let response = Self::send(self.request(Method::GET, path).query(query)).await?;
        decode(response).await
    }

    /// Like [`Self::get_json`], mapping 404 to `None`.
    async fn get_optional_json<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<Option<T>> {
        match self.get_json(path, &[]).await {
            Ok(value) => Ok(Some(value)),
            Err(RemoteError::Server { status: 404, .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn post_json<B: Serialize + Sync + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> RemoteResult<T> {
        let response = Self::send(self.request(Method::POST, path).json(body)).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
    let body = response
        .text()
        .await
        .map_err(|error| classify_transport(&error))?;
    decode_body(&body)
}

fn decode_body<T: DeserializeOwned>(body: &str) -> RemoteResult<T> {
    serde_json::from_str(body).map_err(|error| RemoteError::Serialization(error.to_string()))
}

/// Classify a failure that happened before a status code was received.
pub(crate) fn classify_transport(error: &reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::RequestTimeout
    } else if error.is_connect() {
        RemoteError::NoInternet
    } else if error.is_decode() {
        RemoteError::Serialization(error.to_string())
    } else {
        RemoteError::Unknown(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Classify a non-success HTTP status.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => RemoteError::TooManyRequests,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RemoteError::RequestTimeout,
        _ => {
            let message = serde_json::from_str::<ApiErrorBody>(body)
                .ok()
                .and_then(|payload| payload.message.or(payload.error))
                .map_or_else(|| compact_text(body), |message| compact_text(&message));
            RemoteError::Server {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn bbox_query(bbox: Option<BoundingBox>) -> Vec<(&'static str, String)> {
    bbox.map(|bbox| vec![("bbox", bbox.to_wire())])
        .unwrap_or_default()
}

#[async_trait]
impl OfficeSource for ApiClient {
    async fn list(&self, bbox: Option<BoundingBox>) -> RemoteResult<Vec<Office>> {
        self.get_json("/offices", &bbox_query(bbox)).await
    }

    async fn get(&self, id: i64) -> RemoteResult<Office> {
        self.get_json(&format!("/offices/{id}"), &[]).await
    }
}

#[async_trait]
impl InfoSource for ApiClient {
    async fn list(&self, bbox: Option<BoundingBox>) -> RemoteResult<Vec<Info>> {
        self.get_json("/infos", &bbox_query(bbox)).await
    }

    async fn get(&self, id: i64) -> RemoteResult<Info> {
        self.get_json(&format!("/infos/{id}"), &[]).await
    }

    async fn status(&self, id: i64) -> RemoteResult<Option<StatusDto>> {
        self.get_optional_json(&format!("/infos/{id}/status")).await
    }
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    url: String,
}

#[async_trait]
impl TicketSource for ApiClient {
    async fn list(&self, query: &TicketQuery) -> RemoteResult<Vec<Ticket>> {
        let mut params = bbox_query(query.bbox);
        if let Some(user_id) = &query.user_id {
            params.push(("userId", user_id.clone()));
        }
        self.get_json("/tickets", &params).await
    }

    async fn get(&self, id: i64) -> RemoteResult<Ticket> {
        self.get_json(&format!("/tickets/{id}"), &[]).await
    }

    async fn status(&self, id: i64) -> RemoteResult<Option<StatusDto>> {
        self.get_optional_json(&format!("/tickets/{id}/status")).await
    }

    async fn create(&self, ticket: &NewTicket) -> RemoteResult<Ticket> {
        self.post_json("/tickets", ticket).await
    }

    async fn upload_image(&self, ticket_id: i64, image: &ImageUpload) -> RemoteResult<String> {
        let request = self
            .request(Method::POST, &format!("/tickets/{ticket_id}/images"))
            .query(&[("fileName", image.file_name.as_str())])
            .header(reqwest::header::CONTENT_TYPE, image.content_type.as_str())
            .body(image.bytes.clone());
        let uploaded: UploadedImage = decode(Self::send(request).await?).await?;
        Ok(uploaded.url)
    }

    async fn vote(&self, ticket_id: i64) -> RemoteResult<Ticket> {
        self.post_json(&format!("/tickets/{ticket_id}/votes"), &serde_json::json!({}))
            .await
    }
}

#[async_trait]
impl AppointmentSource for ApiClient {
    async fn list(&self, user_id: &str) -> RemoteResult<Vec<Appointment>> {
        self.get_json("/appointments", &[("userId", user_id.to_string())])
            .await
    }

    async fn get(&self, id: i64) -> RemoteResult<Appointment> {
        self.get_json(&format!("/appointments/{id}"), &[]).await
    }

    async fn create(&self, appointment: &NewAppointment) -> RemoteResult<Appointment> {
        self.post_json("/appointments", appointment).await
    }

    async fn cancel(&self, id: i64) -> RemoteResult<()> {
        Self::send(self.request(Method::DELETE, &format!("/appointments/{id}"))).await?;
        Ok(())
    }
}

#[async_trait]
impl AddressSource for ApiClient {
    async fn search(
        &self,
        query: &str,
        bbox: Option<BoundingBox>,
    ) -> RemoteResult<Vec<AddressSuggestion>> {
        let mut params = vec![("q", query.to_string())];
        params.extend(bbox_query(bbox));
        self.get_json("/addresses/search", &params).await
    }

    async fn reverse(&self, location: Location) -> RemoteResult<Option<AddressSuggestion>> {
        let path = format!(
            "/addresses/reverse?lat={}&lng={}",
            location.latitude, location.longitude
        );
        self.get_optional_json(&path).await
    }
}

#[async_trait]
impl UserSource for ApiClient {
    async fn login(&self, credentials: &Credentials) -> RemoteResult<Session> {
        self.post_json("/auth/login", credentials).await
    }

    async fn profile(&self, user_id: &str) -> RemoteResult<UserProfile> {
        let path = format!("/users/{}", urlencoding::encode(user_id));
        self.get_json(&path, &[]).await
    }
}
