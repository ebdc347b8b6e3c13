use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use civic_core::location::FixedLocation;
use civic_core::models::TicketDraft;
use civic_core::notify::LogSink;
use civic_core::remote::ApiClient;
use civic_core::{CivicClient, ClientConfig, Location, Platform, Sources, SystemClock};
use serde::Serialize;

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "CIVIC_DB_PATH";
pub const CONFIG_PATH_ENV: &str = "CIVIC_CONFIG";

/// Global options shared by every command.
pub struct Context {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub location: Option<Location>,
}

#[derive(Debug, Serialize)]
pub struct DraftListItem {
    pub local_id: i64,
    pub title: String,
    pub category: Option<String>,
    pub images: usize,
    pub updated_at: i64,
    pub relative_time: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("civic").join("civic.db"))
        .ok_or(CliError::NoDataDir)
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_config_path.or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
    {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("civic").join("config.json"))
        .ok_or(CliError::NoDataDir)
}

pub fn resolve_location(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Location>, CliError> {
    match (lat, lng) {
        (Some(latitude), Some(longitude)) => {
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                return Err(CliError::InvalidLocation(format!("{latitude}, {longitude}")));
            }
            Ok(Some(Location::new(latitude, longitude)))
        }
        _ => Ok(None),
    }
}

pub fn load_config(path: &Path) -> Result<ClientConfig, CliError> {
    Ok(ClientConfig::load(path)?.with_env_overrides()?)
}

/// Open the local store and wire the client against the configured API.
pub async fn open_client(context: &Context) -> Result<CivicClient, CliError> {
    let config = load_config(&context.config_path)?;
    let base_url = config.api_base_url.clone().ok_or_else(|| {
        civic_core::Error::InvalidInput(format!(
            "No API base URL configured. Set {} or add api_base_url to {}",
            civic_core::config::API_BASE_URL_ENV,
            context.config_path.display()
        ))
    })?;
    let api = ApiClient::new(base_url, config.request_timeout())?;

    if let Some(parent) = context.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let platform = Platform {
        location: Arc::new(FixedLocation(context.location)),
        sink: Arc::new(LogSink),
        clock: Arc::new(SystemClock),
    };
    let client = CivicClient::open_path(&context.db_path, Sources::from_api(&api), platform, &config)?;

    if let Some(session) = client.users().session().await? {
        api.set_access_token(Some(session.access_token));
    }
    Ok(client)
}

pub async fn require_user(client: &CivicClient) -> Result<String, CliError> {
    client
        .users()
        .current_user_id()
        .await?
        .ok_or(CliError::NotSignedIn)
}

pub fn format_draft_lines(drafts: &[TicketDraft]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    drafts
        .iter()
        .map(|draft| {
            let title = preview(&draft.title, 40);
            let relative_time = format_relative_time(draft.updated_at, now_ms);
            format!("{:<6}  {title:<40}  {relative_time}", draft.local_id)
        })
        .collect()
}

pub fn draft_to_list_item(draft: &TicketDraft) -> DraftListItem {
    DraftListItem {
        local_id: draft.local_id,
        title: draft.title.clone(),
        category: draft.category.clone(),
        images: draft.image_paths.len(),
        updated_at: draft.updated_at,
        relative_time: format_relative_time(draft.updated_at, Utc::now().timestamp_millis()),
    }
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return "never".to_string();
    }
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyDraftTitle);
    }
    Ok(trimmed.to_string())
}
