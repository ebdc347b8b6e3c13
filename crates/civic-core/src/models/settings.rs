//! Notification settings model

use serde::{Deserialize, Serialize};

/// User-level notification switches.
///
/// `enabled` gates everything; the per-domain toggles gate the status
/// checks for that domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub tickets: bool,
    pub infos: bool,
    /// Whether booking schedules a reminder before the appointment
    pub appointment_reminders: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tickets: true,
            infos: true,
            appointment_reminders: true,
        }
    }
}

impl NotificationSettings {
    pub const fn tickets_enabled(&self) -> bool {
        self.enabled && self.tickets
    }

    pub const fn infos_enabled(&self) -> bool {
        self.enabled && self.infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = NotificationSettings::default();
        assert!(settings.tickets_enabled());
        assert!(settings.infos_enabled());
    }

    #[test]
    fn master_switch_gates_domains() {
        let settings = NotificationSettings {
            enabled: false,
            ..NotificationSettings::default()
        };
        assert!(!settings.tickets_enabled());
        assert!(!settings.infos_enabled());
    }
}
