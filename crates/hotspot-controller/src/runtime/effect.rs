use std::time::Duration;

use crate::types::{FailureReason, Group, GroupOperation, Status};

use super::HotspotEvent;

/// Intent produced by the pure logic of `HotspotState`.
///
/// Every `handle_*` method returns `Vec<HotspotEffect>`.
/// The event loop then runs these effects through the group service,
/// the presenter and the client channels.
#[derive(Debug, Clone, PartialEq)]
pub enum HotspotEffect {
    /// (Re)open the group service control channel.
    Initialize,

    /// Ask the service for the current group.
    QueryGroup { generation: u64 },

    /// Ask the service to create a group.
    CreateGroup { generation: u64 },

    /// Ask the service to remove the current group.
    RemoveGroup { generation: u64, op: GroupOperation },

    /// Re-query after `delay`, without blocking the loop.
    ScheduleRequery { generation: u64, delay: Duration },

    /// Show the foreground notification for an active group.
    Present { title: String, subtext: String },

    /// Show an empty notification.
    PresentNeutral,

    /// Remove the foreground notification.
    ClearNotification,

    /// Publish a new status (watch cell first, then one event).
    StatusChanged(Status),

    /// Emit an event to the client.
    Emit(HotspotEvent),
}

/// Result of an asynchronous service call or timer, fed back into the loop.
///
/// `generation` identifies the start attempt that issued the call;
/// completions from an abandoned attempt are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Initialized {
        result: Result<(), FailureReason>,
    },
    Queried {
        generation: u64,
        group: Option<Group>,
    },
    Created {
        generation: u64,
        result: Result<(), FailureReason>,
    },
    Removed {
        generation: u64,
        op: GroupOperation,
        result: Result<(), FailureReason>,
    },
    BackoffElapsed {
        generation: u64,
    },
}
