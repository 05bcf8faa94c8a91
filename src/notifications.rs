use crate::config::NotificationConfig;
use crate::core::AlertMessage;

/// Desktop notification sender for fused alerts.
pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
        }
    }

    /// Try to show a desktop notification for an alert.
    /// Returns true if one was shown. Dispatch failures are logged, never propagated.
    pub fn notify(&self, alert: &AlertMessage) -> bool {
        if !self.enabled {
            tracing::debug!("Notifications disabled, not dispatching alert");
            return false;
        }
        self.send_notification(alert)
    }

    fn send_notification(&self, alert: &AlertMessage) -> bool {
        match notify_rust::Notification::new()
            .summary(&alert.subject)
            .body(&alert.body)
            .show()
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Desktop notification failed: {e}");
                false
            }
        }
    }
}
