//! Effect executor: the only place that touches I/O.
//!
//! Takes a list of HotspotEffect and executes them concretely:
//! - Initialize / QueryGroup / CreateGroup / RemoveGroup -> spawned service call,
//!   result posted back to the loop as a `Completion`
//! - ScheduleRequery -> spawned timer posting `BackoffElapsed`
//! - Present / PresentNeutral / ClearNotification -> presenter
//! - StatusChanged -> watch cell, then the event outbox
//! - Emit -> event outbox

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::service::{GroupService, NotificationPresenter};
use crate::types::Status;

use super::effect::{Completion, HotspotEffect};
use super::HotspotEvent;

/// Everything the executor needs to run effects.
pub(super) struct ExecContext<S, P> {
    pub service: Arc<S>,
    pub presenter: Arc<P>,
    pub completion_tx: mpsc::UnboundedSender<Completion>,
    pub status_tx: watch::Sender<Status>,
}

/// Ordered, lossless delivery of events to the client.
///
/// Events that do not fit in the channel wait in `backlog`; the loop
/// flushes it as the client catches up. Nothing is queued once the
/// receiver is gone.
pub(super) struct EventOutbox {
    tx: mpsc::Sender<HotspotEvent>,
    pub backlog: VecDeque<HotspotEvent>,
}

impl EventOutbox {
    pub fn new(tx: mpsc::Sender<HotspotEvent>) -> Self {
        Self {
            tx,
            backlog: VecDeque::new(),
        }
    }

    pub fn has_backlog(&self) -> bool {
        !self.backlog.is_empty()
    }

    pub fn push(&mut self, event: HotspotEvent) {
        if self.has_backlog() {
            self.backlog.push_back(event);
            return;
        }
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!("event channel full, queueing");
                self.backlog.push_back(event);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Deliver everything still queued, waiting for the client to read.
    pub async fn flush(&mut self) {
        while let Some(event) = self.backlog.pop_front() {
            if self.tx.send(event).await.is_err() {
                self.backlog.clear();
                return;
            }
        }
    }
}

/// Execute a list of effects in order.
pub(super) fn execute_effects<S, P>(
    effects: Vec<HotspotEffect>,
    ctx: &ExecContext<S, P>,
    events: &mut EventOutbox,
) where
    S: GroupService + 'static,
    P: NotificationPresenter,
{
    for effect in effects {
        match effect {
            HotspotEffect::Initialize => {
                let service = ctx.service.clone();
                complete_with(ctx, async move {
                    Completion::Initialized {
                        result: service.initialize().await,
                    }
                });
            }
            HotspotEffect::QueryGroup { generation } => {
                let service = ctx.service.clone();
                complete_with(ctx, async move {
                    Completion::Queried {
                        generation,
                        group: service.query_group().await,
                    }
                });
            }
            HotspotEffect::CreateGroup { generation } => {
                let service = ctx.service.clone();
                complete_with(ctx, async move {
                    Completion::Created {
                        generation,
                        result: service.create_group().await,
                    }
                });
            }
            HotspotEffect::RemoveGroup { generation, op } => {
                let service = ctx.service.clone();
                complete_with(ctx, async move {
                    Completion::Removed {
                        generation,
                        op,
                        result: service.remove_group().await,
                    }
                });
            }
            HotspotEffect::ScheduleRequery { generation, delay } => {
                complete_with(ctx, async move {
                    tokio::time::sleep(delay).await;
                    Completion::BackoffElapsed { generation }
                });
            }
            HotspotEffect::Present { title, subtext } => {
                ctx.presenter.present(&title, &subtext);
            }
            HotspotEffect::PresentNeutral => {
                ctx.presenter.present_neutral();
            }
            HotspotEffect::ClearNotification => {
                ctx.presenter.clear();
            }
            HotspotEffect::StatusChanged(status) => {
                // Watch first so anyone reacting to the event reads the new value.
                ctx.status_tx.send_replace(status);
                events.push(HotspotEvent::StatusChanged { status });
            }
            HotspotEffect::Emit(event) => events.push(event),
        }
    }
}

/// Run `fut` off the loop and post its completion back.
fn complete_with<S, P, F>(ctx: &ExecContext<S, P>, fut: F)
where
    F: std::future::Future<Output = Completion> + Send + 'static,
{
    let completion_tx = ctx.completion_tx.clone();
    tokio::spawn(async move {
        let completion = fut.await;
        // The loop is gone only after teardown; late results are irrelevant then.
        let _ = completion_tx.send(completion);
    });
}
