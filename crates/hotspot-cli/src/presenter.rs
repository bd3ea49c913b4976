use hotspot_controller::NotificationPresenter;

use crate::events;

/// Renders the foreground notification as log lines (or JSON events).
pub struct LogPresenter {
    json: bool,
}

impl LogPresenter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl NotificationPresenter for LogPresenter {
    fn present(&self, title: &str, subtext: &str) {
        tracing::info!(title, "notification shown");
        if self.json {
            events::emit_notification("present", title, subtext);
        } else {
            eprintln!("[hotspot] {title} · {subtext}");
        }
    }

    fn present_neutral(&self) {
        tracing::debug!("neutral notification shown");
        if self.json {
            events::emit_notification("neutral", "", "");
        }
    }

    fn clear(&self) {
        tracing::info!("notification cleared");
        if self.json {
            events::emit_notification("clear", "", "");
        }
    }
}
