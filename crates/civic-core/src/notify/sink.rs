//! Notification delivery.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SinkError;

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Stable per entity, so a newer notification replaces an older one
    pub id: String,
    pub title: String,
    pub message: String,
}

/// Platform notification service.
///
/// Platform handles (activity, context) belong to the implementing type,
/// passed in at construction.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<(), SinkError>;

    async fn schedule(&self, notification: &Notification, at_millis: i64) -> Result<(), SinkError>;

    async fn cancel_scheduled(&self, id: &str) -> Result<(), SinkError>;
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn show(&self, notification: &Notification) -> Result<(), SinkError> {
        tracing::info!(
            id = %notification.id,
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }

    async fn schedule(&self, notification: &Notification, at_millis: i64) -> Result<(), SinkError> {
        tracing::info!(id = %notification.id, at_millis, "Scheduled: {}", notification.title);
        Ok(())
    }

    async fn cancel_scheduled(&self, id: &str) -> Result<(), SinkError> {
        tracing::info!(id, "Cancelled scheduled notification");
        Ok(())
    }
}
