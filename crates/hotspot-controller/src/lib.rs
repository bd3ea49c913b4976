//! WiFi P2P hotspot controller.
//!
//! Drives the lifecycle of a peer-to-peer group owned by this device:
//! find or create the group, wait for it to become owner-ready with
//! exponential backoff, keep a foreground notification in sync, and
//! tear the group down on stop.
//!
//! Logic lives in a pure state machine (`HotspotState`); a single tokio
//! task owns it and executes its effects against an injected
//! [`GroupService`] and [`NotificationPresenter`].

pub mod backend;
pub mod config;
pub mod error;
pub mod runtime;
pub mod service;
pub mod types;

pub use backend::{SimulatedBehavior, SimulatedCall, SimulatedGroupService, WpaCliGroupService};
pub use config::HotspotConfig;
pub use error::HotspotError;
pub use runtime::{
    CommandOutcome, HotspotChannels, HotspotController, HotspotEvent, HotspotHandle, HotspotState,
};
pub use service::{GroupService, NoopPresenter, NotificationPresenter};
pub use types::{FailureReason, Group, GroupOperation, Status};
