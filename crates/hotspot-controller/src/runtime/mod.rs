/// Hotspot runtime: drives the group lifecycle as a live event loop.
///
/// The runtime owns the group service, the presenter and the controller
/// state. It exposes a channel-based API so the application (CLI, UI
/// binding) never touches service callbacks or retry bookkeeping.
mod effect;
mod executor;
mod r#loop;
mod state;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::HotspotConfig;
use crate::error::HotspotError;
use crate::service::{GroupService, NotificationPresenter};
use crate::types::{Group, Status};

pub use effect::{Completion, HotspotEffect};
pub use state::{HotspotState, RetryState};

// ── Commands (app → runtime) ──────────────────────────────────────────

/// Whether a start/stop request was taken up by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    /// Rejected; `status` is the status at the time of the request.
    NotAccepted { status: Status },
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted)
    }
}

/// Commands the application sends to the runtime event loop.
pub enum HotspotCommand {
    /// Bring the hotspot group up.
    Start {
        reply: oneshot::Sender<CommandOutcome>,
    },
    /// Remove the group.
    Stop {
        reply: oneshot::Sender<CommandOutcome>,
    },
    /// Query: the group currently held.
    GetGroup {
        reply: oneshot::Sender<Option<Group>>,
    },
    /// The platform control channel was lost.
    ChannelDisconnected,
    /// Remove any group, then stop the loop.
    Teardown { reply: oneshot::Sender<()> },
}

// ── Events (runtime → app) ───────────────────────────────────────────

/// Events the application observes.
#[derive(Debug, Clone, PartialEq)]
pub enum HotspotEvent {
    /// Status changed; the handle already reports `status`.
    StatusChanged { status: Status },
    /// A group became active.
    GroupAvailable { group: Group },
    /// A non-fatal failure, with its user-facing message.
    Error {
        error: HotspotError,
        message: String,
    },
}

// ── HotspotHandle (app-facing API) ───────────────────────────────────

/// Handle to communicate with a running controller.
///
/// Cheap to clone. Dropping every handle tears the controller down.
#[derive(Clone)]
pub struct HotspotHandle {
    cmd_tx: mpsc::Sender<HotspotCommand>,
    status_rx: watch::Receiver<Status>,
}

impl HotspotHandle {
    /// Current status.
    pub fn status(&self) -> Status {
        *self.status_rx.borrow()
    }

    /// Subscribe to status updates.
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.status_rx.clone()
    }

    /// Request group start. Rejected unless the controller is idle.
    pub async fn start(&self) -> Result<CommandOutcome, HotspotError> {
        let (tx, rx) = oneshot::channel();
        self.send(HotspotCommand::Start { reply: tx }).await?;
        rx.await.map_err(|_| HotspotError::ControllerShutDown)
    }

    /// Request group removal. This is the client's shutdown action.
    pub async fn stop(&self) -> Result<CommandOutcome, HotspotError> {
        let (tx, rx) = oneshot::channel();
        self.send(HotspotCommand::Stop { reply: tx }).await?;
        rx.await.map_err(|_| HotspotError::ControllerShutDown)
    }

    /// The group held while active.
    pub async fn group(&self) -> Result<Option<Group>, HotspotError> {
        let (tx, rx) = oneshot::channel();
        self.send(HotspotCommand::GetGroup { reply: tx }).await?;
        rx.await.map_err(|_| HotspotError::ControllerShutDown)
    }

    /// Report that the platform channel dropped.
    pub async fn channel_disconnected(&self) -> Result<(), HotspotError> {
        self.send(HotspotCommand::ChannelDisconnected).await
    }

    /// Remove any group and stop the controller. Resolves once done.
    pub async fn teardown(&self) -> Result<(), HotspotError> {
        let (tx, rx) = oneshot::channel();
        self.send(HotspotCommand::Teardown { reply: tx }).await?;
        rx.await.map_err(|_| HotspotError::ControllerShutDown)
    }

    async fn send(&self, cmd: HotspotCommand) -> Result<(), HotspotError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| HotspotError::ControllerShutDown)
    }
}

// ── HotspotChannels ──────────────────────────────────────────────────

/// Channels returned to the application when the controller starts.
pub struct HotspotChannels {
    /// Handle to send commands to the controller.
    pub handle: HotspotHandle,
    /// Receive status changes, activations and errors.
    pub events: mpsc::Receiver<HotspotEvent>,
}

// ── HotspotController ────────────────────────────────────────────────

/// The hotspot controller. Spawn it and communicate via channels.
pub struct HotspotController;

impl HotspotController {
    /// Validate `config` and start the controller loop as a tokio task.
    pub fn spawn<S, P>(
        service: Arc<S>,
        presenter: Arc<P>,
        config: HotspotConfig,
    ) -> Result<HotspotChannels, HotspotError>
    where
        S: GroupService + 'static,
        P: NotificationPresenter + 'static,
    {
        config.validate()?;

        // Command channel (app → runtime)
        let (cmd_tx, cmd_rx) = mpsc::channel::<HotspotCommand>(config.command_buffer);

        // Event channels (runtime → app)
        let (event_tx, event_rx) = mpsc::channel::<HotspotEvent>(config.event_buffer);
        let (status_tx, status_rx) = watch::channel(Status::Idle);

        tokio::spawn(r#loop::controller_loop(
            HotspotState::new(config.clone()),
            config,
            service,
            presenter,
            cmd_rx,
            status_tx,
            event_tx,
        ));

        Ok(HotspotChannels {
            handle: HotspotHandle { cmd_tx, status_rx },
            events: event_rx,
        })
    }
}
