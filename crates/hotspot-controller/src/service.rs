use crate::types::{FailureReason, Group};

/// Abstraction over the platform WiFi P2P group service.
///
/// In production: `WpaCliGroupService` (wpa_supplicant control interface).
/// In tests: `MockGroupService` (scripted answers, records calls).
#[async_trait::async_trait]
pub trait GroupService: Send + Sync {
    /// (Re)open the control channel to the platform service.
    async fn initialize(&self) -> Result<(), FailureReason> {
        Ok(())
    }

    /// Current group, if this device is part of one.
    async fn query_group(&self) -> Option<Group>;

    /// Ask the platform to form a new group with this device as owner.
    async fn create_group(&self) -> Result<(), FailureReason>;

    /// Tear down the current group.
    async fn remove_group(&self) -> Result<(), FailureReason>;
}

/// Sink for the foreground status notification.
pub trait NotificationPresenter: Send + Sync {
    /// Show (or replace) the notification with group metadata.
    fn present(&self, title: &str, subtext: &str);

    /// Show an empty notification, used right before clearing on failure.
    fn present_neutral(&self) {
        self.present("", "");
    }

    /// Remove the notification.
    fn clear(&self);
}

/// Presenter that drops every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresenter;

impl NotificationPresenter for NoopPresenter {
    fn present(&self, _title: &str, _subtext: &str) {}
    fn clear(&self) {}
}

// ── Mocks (tests) ────────────────────────────────────────────────────
