use crate::types::{FailureReason, Group, GroupOperation};

/// Errors surfaced by the hotspot controller.
///
/// Group service failures never tear down the controller; they are
/// reported to the client and the state machine recovers locally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotspotError {
    #[error("failed to {op} P2P group (reason: {reason})")]
    OperationFailed {
        op: GroupOperation,
        reason: FailureReason,
    },

    #[error("unexpected group: {}", display_group(.group))]
    UnexpectedGroupState { group: Option<Group> },

    #[error("controller is shut down")]
    ControllerShutDown,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HotspotError {
    /// Short user-facing message, suitable for a transient popup.
    pub fn user_message(&self) -> String {
        match self {
            HotspotError::OperationFailed { op, reason } => {
                format!("Failed to {op} P2P group (reason: {reason})")
            }
            HotspotError::UnexpectedGroupState { group } => {
                format!("Unexpected group: {}", display_group(group))
            }
            other => other.to_string(),
        }
    }
}

fn display_group(group: &Option<Group>) -> String {
    match group {
        Some(g) => g.to_string(),
        None => "null".to_string(),
    }
}
