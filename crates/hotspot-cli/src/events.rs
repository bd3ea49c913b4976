use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use hotspot_controller::{FailureReason, Group, GroupOperation, HotspotError, HotspotEvent, Status};
use serde::Serialize;

/// Emit a JSONL line to stdout (flushed immediately for piped output).
pub fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{json}");
        let _ = lock.flush();
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Serialize a controller event as one JSON line.
pub fn emit_event(event: &HotspotEvent) {
    match event {
        HotspotEvent::StatusChanged { status } => emit(&EventStatus {
            event: "status",
            status: *status,
            timestamp_ms: now_ms(),
        }),
        HotspotEvent::GroupAvailable { group } => emit(&EventGroup {
            event: "group",
            group,
            timestamp_ms: now_ms(),
        }),
        HotspotEvent::Error { error, message } => emit(&EventError::new(error, message)),
    }
}

/// Serialize a notification command as one JSON line.
pub fn emit_notification(action: &'static str, title: &str, subtext: &str) {
    emit(&EventNotification {
        event: "notification",
        action,
        title,
        subtext,
        timestamp_ms: now_ms(),
    });
}

// ── Event shapes ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventStatus {
    pub event: &'static str,
    pub status: Status,
    pub timestamp_ms: u64,
}

#[derive(Serialize)]
pub struct EventGroup<'a> {
    pub event: &'static str,
    pub group: &'a Group,
    pub timestamp_ms: u64,
}

#[derive(Serialize)]
pub struct EventError<'a> {
    pub event: &'static str,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<GroupOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    pub message: &'a str,
    pub timestamp_ms: u64,
}

impl<'a> EventError<'a> {
    pub fn new(error: &HotspotError, message: &'a str) -> Self {
        let (kind, operation, reason) = match error {
            HotspotError::OperationFailed { op, reason } => {
                ("operation_failed", Some(*op), Some(*reason))
            }
            HotspotError::UnexpectedGroupState { .. } => ("unexpected_group", None, None),
            HotspotError::ControllerShutDown => ("shut_down", None, None),
            HotspotError::Config(_) => ("config", None, None),
        };
        Self {
            event: "error",
            kind,
            operation,
            reason,
            message,
            timestamp_ms: now_ms(),
        }
    }
}

#[derive(Serialize)]
pub struct EventNotification<'a> {
    pub event: &'static str,
    pub action: &'static str,
    pub title: &'a str,
    pub subtext: &'a str,
    pub timestamp_ms: u64,
}
