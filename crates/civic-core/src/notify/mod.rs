//! Notifications: delivery sink and the status-change detector.

mod detector;
mod sink;

pub use crate::error::SinkError;
pub use detector::{StatusChangeDetector, StatusCheckReport, StatusTracked, TrackedEntity};
pub use sink::{LogSink, Notification, NotificationSink};
