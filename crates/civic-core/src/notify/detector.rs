//! Background detection of remote status changes.
//!
//! For every tracked domain the detector collects the entities the user
//! watches, asks the server for each one's current status and compares it
//! with the cached status. A difference pulls the full entity into the
//! cache and shows a notification. A watched entity missing from the cache
//! counts as changed, so favorites dropped by an area refresh still notify.
//!
//! Domains are checked concurrently; candidates within a domain one after
//! another. A failing candidate is skipped and never affects its siblings.

use std::ops::AddAssign;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::sink::{Notification, NotificationSink};
use crate::db::SettingsStore;
use crate::error::Result;
use crate::models::NotificationSettings;

/// Fresh copy of a tracked entity after a single-entity refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    pub id: i64,
    pub title: String,
    pub status: String,
}

/// A domain whose entities carry a server-side status worth watching.
#[async_trait]
pub trait StatusTracked: Send + Sync {
    /// Short name, also the prefix of notification ids
    fn domain(&self) -> &'static str;

    fn notifications_enabled(&self, settings: &NotificationSettings) -> bool;

    /// Ids the user cares about, without duplicates.
    async fn watched_ids(&self, user_id: &str) -> Result<Vec<i64>>;

    /// Lightweight status lookup; `None` when the server has no status.
    async fn remote_status(&self, id: i64) -> Result<Option<String>>;

    async fn cached_status(&self, id: i64) -> Result<Option<String>>;

    /// Single-entity refresh into the cache.
    async fn refresh_tracked(&self, id: i64) -> Result<TrackedEntity>;
}

/// Summary of one detector run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCheckReport {
    pub checked: usize,
    pub changed: usize,
    pub failed: usize,
    /// The run stopped early on the cancellation signal
    pub cancelled: bool,
}

impl AddAssign for StatusCheckReport {
    fn add_assign(&mut self, other: Self) {
        self.checked += other.checked;
        self.changed += other.changed;
        self.failed += other.failed;
        self.cancelled |= other.cancelled;
    }
}

pub struct StatusChangeDetector {
    domains: Vec<Arc<dyn StatusTracked>>,
    settings: SettingsStore,
    sink: Arc<dyn NotificationSink>,
}

impl StatusChangeDetector {
    pub fn new(settings: SettingsStore, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            domains: Vec::new(),
            settings,
            sink,
        }
    }

    #[must_use]
    pub fn track(mut self, domain: Arc<dyn StatusTracked>) -> Self {
        self.domains.push(domain);
        self
    }

    /// Run one detection pass for `user_id`.
    ///
    /// Never fails: per-candidate errors are counted in the report. The
    /// cancellation token is checked between candidates; a candidate in
    /// flight always completes.
    pub async fn run(&self, user_id: &str, cancel: &CancellationToken) -> StatusCheckReport {
        let settings = match self.settings.notification_settings().await {
            Ok(settings) => settings,
            Err(error) => {
                tracing::error!("Status check aborted, settings unreadable: {error}");
                return StatusCheckReport::default();
            }
        };
        if !settings.enabled {
            tracing::debug!("Notifications disabled, skipping status check");
            return StatusCheckReport::default();
        }

        let checks = self
            .domains
            .iter()
            .filter(|domain| domain.notifications_enabled(&settings))
            .map(|domain| self.check_domain(domain.as_ref(), user_id, cancel));

        let mut report = StatusCheckReport::default();
        for domain_report in join_all(checks).await {
            report += domain_report;
        }
        tracing::info!(
            checked = report.checked,
            changed = report.changed,
            failed = report.failed,
            cancelled = report.cancelled,
            "Status check finished"
        );
        report
    }

    async fn check_domain(
        &self,
        domain: &dyn StatusTracked,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> StatusCheckReport {
        let mut report = StatusCheckReport::default();
        let ids = match domain.watched_ids(user_id).await {
            Ok(ids) => ids,
            Err(error) => {
                tracing::error!(domain = domain.domain(), "Could not load watched ids: {error}");
                report.failed = 1;
                return report;
            }
        };

        for id in ids {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.checked += 1;
            match self.check_candidate(domain, id).await {
                Ok(true) => report.changed += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(domain = domain.domain(), id, "Status check failed: {error}");
                    report.failed += 1;
                }
            }
        }

        if report.checked > 0 && report.failed == report.checked {
            tracing::error!(
                domain = domain.domain(),
                failed = report.failed,
                "Every status check in the batch failed"
            );
        }
        report
    }

    /// Returns whether a status change was notified.
    async fn check_candidate(&self, domain: &dyn StatusTracked, id: i64) -> Result<bool> {
        let Some(remote) = domain.remote_status(id).await? else {
            return Ok(false);
        };
        let cached = domain.cached_status(id).await?;
        if cached.as_deref() == Some(remote.as_str()) {
            return Ok(false);
        }

        let entity = domain.refresh_tracked(id).await?;
        // A watched entity evicted by an area refresh has no cached status.
        let message = match &cached {
            Some(previous) => format!("Status changed from {previous} to {remote}"),
            None => format!("Status is now {remote}"),
        };
        let notification = Notification {
            id: format!("{}:{id}", domain.domain()),
            title: entity.title,
            message,
        };
        if let Err(error) = self.sink.show(&notification).await {
            tracing::warn!(id = %notification.id, "Notification not shown: {error}");
        }
        Ok(true)
    }
}
