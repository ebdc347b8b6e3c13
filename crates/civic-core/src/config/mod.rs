//! Client configuration.
//!
//! Provides a `ClientConfig` shared by hosts (mobile shell, CLI) describing
//! the API endpoint, timeouts, retention and per-feature sync parameters.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::{Feature, SyncParams};
use crate::util::{normalize_base_url, normalize_text_option};

/// Environment variable overriding [`ClientConfig::api_base_url`].
pub const API_BASE_URL_ENV: &str = "CIVIC_API_BASE_URL";

const MINUTE_MS: i64 = 60 * 1000;

/// Runtime configuration of the client core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    pub api_base_url: Option<String>,
    pub request_timeout_ms: u64,
    /// Upper bound on waiting for a location fix
    pub location_timeout_ms: u64,
    /// Appointment notes older than this many days are purged
    pub note_retention_days: u32,
    /// Radii at or above this send no bounding box ("any distance")
    pub max_filtered_radius_km: f64,
    pub sync: FeatureSyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout_ms: 15_000,
            location_timeout_ms: 3_000,
            note_retention_days: 30,
            max_filtered_radius_km: 50.0,
            sync: FeatureSyncConfig::default(),
        }
    }
}

/// Sync parameters per feature domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FeatureSyncConfig {
    pub office: SyncParams,
    pub info: SyncParams,
    pub ticket: SyncParams,
    pub appointment: SyncParams,
    pub user: SyncParams,
}

impl Default for FeatureSyncConfig {
    fn default() -> Self {
        Self {
            // Offices rarely change; refresh on movement mostly.
            office: SyncParams::new(24 * 60 * MINUTE_MS, 10.0, 2.0),
            info: SyncParams::new(30 * MINUTE_MS, 10.0, 2.0),
            ticket: SyncParams::new(10 * MINUTE_MS, 5.0, 1.0),
            appointment: SyncParams::new(15 * MINUTE_MS, 0.0, f64::INFINITY),
            user: SyncParams::new(60 * MINUTE_MS, 0.0, f64::INFINITY),
        }
    }
}

impl FeatureSyncConfig {
    pub const fn params(&self, feature: Feature) -> SyncParams {
        match feature {
            Feature::Office => self.office,
            Feature::Info => self.info,
            Feature::Ticket => self.ticket,
            Feature::Appointment => self.appointment,
            Feature::User => self.user,
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validated()
    }

    /// Apply environment overrides, then validate.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(url) = normalize_text_option(std::env::var(API_BASE_URL_ENV).ok()) {
            self.api_base_url = Some(url);
        }
        self.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.api_base_url = normalize_text_option(self.api_base_url.take())
            .map(|url| normalize_base_url(&url))
            .transpose()
            .map_err(Error::InvalidInput)?;
        if self.max_filtered_radius_km <= 0.0 {
            return Err(Error::InvalidInput(
                "max_filtered_radius_km must be positive".into(),
            ));
        }
        for feature in Feature::ALL {
            if self.sync.params(feature).interval_ms < 0 {
                return Err(Error::InvalidInput(format!(
                    "sync.{feature}.interval_ms must not be negative"
                )));
            }
        }
        Ok(self)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub const fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }

    pub const fn note_retention_millis(&self) -> i64 {
        self.note_retention_days as i64 * 24 * 60 * MINUTE_MS
    }
}
