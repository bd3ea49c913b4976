//! The controller event loop.
//!
//! A single async task that owns the controller state and multiplexes
//! over application commands and service/timer completions. All state
//! mutation happens here; service calls and timers run as spawned tasks
//! and report back through the completion channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::HotspotConfig;
use crate::service::{GroupService, NotificationPresenter};
use crate::types::{FailureReason, GroupOperation, Status};

use super::effect::{Completion, HotspotEffect};
use super::executor::{execute_effects, EventOutbox, ExecContext};
use super::state::HotspotState;
use super::{HotspotCommand, HotspotEvent};

/// Main event loop. Owns all controller state.
pub(super) async fn controller_loop<S, P>(
    mut state: HotspotState,
    config: HotspotConfig,
    service: Arc<S>,
    presenter: Arc<P>,
    mut cmd_rx: mpsc::Receiver<HotspotCommand>,
    status_tx: watch::Sender<Status>,
    event_tx: mpsc::Sender<HotspotEvent>,
) where
    S: GroupService + 'static,
    P: NotificationPresenter + 'static,
{
    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<Completion>();
    let ctx = ExecContext {
        service,
        presenter,
        completion_tx,
        status_tx,
    };
    let mut events = EventOutbox::new(event_tx.clone());

    execute_effects(vec![HotspotEffect::Initialize], &ctx, &mut events);
    tracing::info!("hotspot controller running");

    loop {
        tokio::select! {
            // ── 1. Commands from application ────────────────────
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    tracing::debug!("all handles dropped");
                    teardown(&mut state, &config, &ctx, &mut events, &mut completion_rx).await;
                    break;
                };
                match cmd {
                    HotspotCommand::Start { reply } => {
                        let (outcome, effects) = state.handle_start();
                        execute_effects(effects, &ctx, &mut events);
                        let _ = reply.send(outcome);
                    }
                    HotspotCommand::Stop { reply } => {
                        let (outcome, effects) = state.handle_stop();
                        execute_effects(effects, &ctx, &mut events);
                        let _ = reply.send(outcome);
                    }
                    HotspotCommand::GetGroup { reply } => {
                        let _ = reply.send(state.group().cloned());
                    }
                    HotspotCommand::ChannelDisconnected => {
                        let effects = state.handle_channel_disconnected();
                        execute_effects(effects, &ctx, &mut events);
                    }
                    HotspotCommand::Teardown { reply } => {
                        teardown(&mut state, &config, &ctx, &mut events, &mut completion_rx).await;
                        let _ = reply.send(());
                        break;
                    }
                }
            }

            // ── 2. Service / timer completions ──────────────────
            Some(completion) = completion_rx.recv() => {
                let effects = state.handle_completion(completion);
                execute_effects(effects, &ctx, &mut events);
            }

            // ── 3. Queued events, once the client has room ──────
            Ok(permit) = event_tx.reserve(), if events.has_backlog() => {
                if let Some(event) = events.backlog.pop_front() {
                    permit.send(event);
                }
            }
        }
    }

    // The client may still be reading; do not hold the service forever.
    if tokio::time::timeout(config.teardown_timeout, events.flush())
        .await
        .is_err()
    {
        tracing::warn!(pending = events.backlog.len(), "client stopped reading events");
    }
    tracing::info!(status = %state.status(), "hotspot controller stopped");
}

/// Best-effort removal of the group before the loop exits.
///
/// A removal already in flight from `stop()` is awaited rather than
/// repeated; otherwise the removal runs inline. Either way it is bounded
/// by the configured timeout and the loop takes no commands meanwhile.
async fn teardown<S, P>(
    state: &mut HotspotState,
    config: &HotspotConfig,
    ctx: &ExecContext<S, P>,
    events: &mut EventOutbox,
    completion_rx: &mut mpsc::UnboundedReceiver<Completion>,
) where
    S: GroupService + 'static,
    P: NotificationPresenter + 'static,
{
    let pending = state.is_stopping();
    let Some(generation) = state.handle_teardown() else {
        return;
    };

    let finished = if pending {
        tracing::info!("tearing down, waiting for pending group removal");
        let drain = async {
            while state.is_stopping() {
                let Some(completion) = completion_rx.recv().await else {
                    break;
                };
                let effects = state.handle_completion(completion);
                execute_effects(effects, ctx, events);
            }
        };
        tokio::time::timeout(config.teardown_timeout, drain).await.is_ok()
    } else {
        tracing::info!("tearing down active group");
        match tokio::time::timeout(config.teardown_timeout, ctx.service.remove_group()).await {
            Ok(result) => {
                let effects = state.handle_remove_result(generation, GroupOperation::Remove, result);
                execute_effects(effects, ctx, events);
                true
            }
            Err(_) => false,
        }
    };

    if !finished {
        tracing::warn!(
            timeout_ms = config.teardown_timeout.as_millis() as u64,
            "group removal timed out during teardown"
        );
        let effects =
            state.handle_remove_result(generation, GroupOperation::Remove, Err(FailureReason::ERROR));
        execute_effects(effects, ctx, events);
    }

    let effects = state.finish_teardown();
    execute_effects(effects, ctx, events);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::super::{CommandOutcome, HotspotChannels, HotspotController};
    use super::*;
    use crate::backend::{SimulatedBehavior, SimulatedCall, SimulatedGroupService};
    use crate::error::HotspotError;
    use crate::service::mock::{Call, MockGroupService, RecordingPresenter, Shown};
    use crate::types::Group;

    fn config() -> HotspotConfig {
        HotspotConfig::new()
            .max_retries(10)
            .backoff_base(Duration::from_millis(30))
    }

    fn spawn(service: &MockGroupService, presenter: &RecordingPresenter) -> HotspotChannels {
        HotspotController::spawn(
            Arc::new(service.clone()),
            Arc::new(presenter.clone()),
            config(),
        )
        .unwrap()
    }

    /// Collect events until a status change to `target`.
    async fn until_status(
        events: &mut mpsc::Receiver<HotspotEvent>,
        target: Status,
    ) -> Vec<HotspotEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(600), events.recv())
                .await
                .expect("timed out waiting for status")
                .expect("event channel closed");
            let done = event == HotspotEvent::StatusChanged { status: target };
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    async fn drain(events: &mut mpsc::Receiver<HotspotEvent>) -> Vec<HotspotEvent> {
        let mut rest = Vec::new();
        while let Some(event) = events.recv().await {
            rest.push(event);
        }
        rest
    }

    async fn activate(
        service: &MockGroupService,
        presenter: &RecordingPresenter,
    ) -> HotspotChannels {
        service.push_query(Some(Group::owned("DIRECT-ab", "hunter22")));
        let mut channels = spawn(service, presenter);
        assert_eq!(
            channels.handle.start().await.unwrap(),
            CommandOutcome::Accepted
        );
        until_status(&mut channels.events, Status::Active).await;
        channels
    }

    #[tokio::test(start_paused = true)]
    async fn owned_group_goes_active_without_create() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let mut channels = activate(&service, &presenter).await;

        assert_eq!(channels.handle.status(), Status::Active);
        assert_eq!(service.count(Call::Create), 0);
        assert_eq!(service.count(Call::Remove), 0);
        assert_eq!(
            presenter.shown(),
            vec![Shown::Present {
                title: "DIRECT-ab".into(),
                subtext: "hunter22".into()
            }]
        );
        assert_eq!(
            channels.handle.group().await.unwrap(),
            Some(Group::owned("DIRECT-ab", "hunter22"))
        );
        let Some(HotspotEvent::GroupAvailable { group }) = channels.events.recv().await else {
            panic!("expected GroupAvailable after activation");
        };
        assert_eq!(group.network_name, "DIRECT-ab");
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_group_removed_before_create() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        service.push_query(Some(Group::client("DIRECT-old")));
        service.set_query_fallback(Some(Group::owned("DIRECT-new", "pw")));
        let mut channels = spawn(&service, &presenter);

        channels.handle.start().await.unwrap();
        until_status(&mut channels.events, Status::Active).await;

        let calls: Vec<Call> = service
            .calls()
            .into_iter()
            .filter(|c| *c != Call::Initialize)
            .collect();
        assert_eq!(calls, vec![Call::Query, Call::Remove, Call::Create, Call::Query]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_without_extra_calls() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        service.push_query(None);
        service.push_query(None);
        service.set_query_fallback(Some(Group::owned("DIRECT-ab", "pw")));
        let mut channels = spawn(&service, &presenter);

        assert!(channels.handle.start().await.unwrap().is_accepted());
        let second = channels.handle.start().await.unwrap();
        assert!(matches!(second, CommandOutcome::NotAccepted { .. }));

        until_status(&mut channels.events, Status::Active).await;
        let third = channels.handle.start().await.unwrap();
        assert_eq!(
            third,
            CommandOutcome::NotAccepted {
                status: Status::Active
            }
        );
        assert_eq!(service.count(Call::Create), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requery_backs_off_until_owner_ready() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        for _ in 0..4 {
            service.push_query(None);
        }
        service.set_query_fallback(Some(Group::owned("DIRECT-ab", "pw")));
        let mut channels = spawn(&service, &presenter);

        let started = Instant::now();
        channels.handle.start().await.unwrap();
        until_status(&mut channels.events, Status::Active).await;

        // 30 + 60 + 120 ms of backoff before the fourth requery
        assert!(started.elapsed() >= Duration::from_millis(210));
        assert_eq!(service.count(Call::Query), 5);
        assert_eq!(service.count(Call::Create), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_after_ten_backoffs() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let mut channels = spawn(&service, &presenter);

        let started = Instant::now();
        channels.handle.start().await.unwrap();
        until_status(&mut channels.events, Status::Starting).await;
        let events = until_status(&mut channels.events, Status::Idle).await;

        assert!(started.elapsed() >= Duration::from_millis(30 * 1023));
        assert!(events.iter().any(|e| matches!(
            e,
            HotspotEvent::Error {
                error: HotspotError::UnexpectedGroupState { group: None },
                ..
            }
        )));
        // initial query + post-create query + one per backoff
        assert_eq!(service.count(Call::Query), 12);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(service.count(Call::Query), 12);
        assert_eq!(
            presenter.shown(),
            vec![Shown::Neutral, Shown::Clear]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_returns_to_idle() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        service.push_create(Err(FailureReason::BUSY));
        let mut channels = spawn(&service, &presenter);

        channels.handle.start().await.unwrap();
        let events = until_status(&mut channels.events, Status::Idle).await;
        let message = events.iter().find_map(|e| match e {
            HotspotEvent::Error { message, .. } => Some(message.clone()),
            _ => None,
        });
        assert_eq!(
            message.as_deref(),
            Some("Failed to create P2P group (reason: BUSY)")
        );
        assert!(!presenter.is_showing());
        assert_eq!(channels.handle.status(), Status::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_from_active_clears_notification() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let mut channels = activate(&service, &presenter).await;

        assert!(channels.handle.stop().await.unwrap().is_accepted());
        until_status(&mut channels.events, Status::Idle).await;

        assert_eq!(channels.handle.status(), Status::Idle);
        assert_eq!(presenter.shown().last(), Some(&Shown::Clear));
        assert_eq!(channels.handle.group().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_failure_leaves_status_active() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        service.push_remove(Err(FailureReason::BUSY));
        let mut channels = activate(&service, &presenter).await;

        channels.handle.stop().await.unwrap();
        let event = loop {
            match channels.events.recv().await {
                Some(HotspotEvent::Error { message, .. }) => break message,
                Some(HotspotEvent::StatusChanged { status }) => {
                    panic!("unexpected transition to {status}")
                }
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        };
        assert_eq!(event, "Failed to remove P2P group (reason: BUSY)");
        assert_eq!(channels.handle.status(), Status::Active);
        assert!(presenter.is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_from_active_removes_group_and_stops_loop() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let channels = activate(&service, &presenter).await;

        channels.handle.teardown().await.unwrap();
        assert_eq!(service.count(Call::Remove), 1);
        assert_eq!(channels.handle.status(), Status::Idle);
        assert!(!presenter.is_showing());
        assert_eq!(
            channels.handle.start().await,
            Err(HotspotError::ControllerShutDown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_from_idle_issues_no_removal() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let channels = spawn(&service, &presenter);

        channels.handle.teardown().await.unwrap();
        assert_eq!(service.count(Call::Remove), 0);
        assert!(presenter.shown().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handles_tears_down() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let HotspotChannels { handle, mut events } = activate(&service, &presenter).await;

        drop(handle);
        while events.recv().await.is_some() {}
        assert_eq!(service.count(Call::Remove), 1);
        assert!(!presenter.is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn channel_disconnect_reinitializes_service() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let channels = spawn(&service, &presenter);

        channels.handle.channel_disconnected().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(service.count(Call::Initialize), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn status_is_published_before_event() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        let mut channels = activate(&service, &presenter).await;

        channels.handle.stop().await.unwrap();
        let mut status_rx = channels.handle.watch_status();
        until_status(&mut channels.events, Status::Idle).await;
        assert_eq!(*status_rx.borrow_and_update(), Status::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_during_stop_waits_for_pending_removal() {
        let service = SimulatedGroupService::new(SimulatedBehavior {
            existing: Some(Group::owned("DIRECT-ab", "pw")),
            latency: Duration::from_millis(100),
            ..SimulatedBehavior::default()
        });
        let presenter = RecordingPresenter::new();
        let HotspotChannels { handle, mut events } = HotspotController::spawn(
            Arc::new(service.clone()),
            Arc::new(presenter.clone()),
            config(),
        )
        .unwrap();

        handle.start().await.unwrap();
        until_status(&mut events, Status::Active).await;
        assert!(handle.stop().await.unwrap().is_accepted());
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.teardown().await.unwrap();

        let removes = service
            .calls()
            .into_iter()
            .filter(|c| *c == SimulatedCall::Remove)
            .count();
        assert_eq!(removes, 1);
        assert_eq!(service.current_group(), None);
        assert_eq!(handle.status(), Status::Idle);
        assert!(!presenter.is_showing());

        let rest = drain(&mut events).await;
        assert!(!rest.iter().any(|e| matches!(e, HotspotEvent::Error { .. })));
        assert_eq!(
            rest.last(),
            Some(&HotspotEvent::StatusChanged {
                status: Status::Idle
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_after_failed_removal_publishes_idle() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        service.push_remove(Err(FailureReason::BUSY));
        let HotspotChannels { handle, mut events } = activate(&service, &presenter).await;

        handle.teardown().await.unwrap();
        assert_eq!(service.count(Call::Remove), 1);
        assert_eq!(handle.status(), Status::Idle);
        assert!(!presenter.is_showing());

        let rest = drain(&mut events).await;
        assert!(rest.iter().any(|e| matches!(
            e,
            HotspotEvent::Error {
                error: HotspotError::OperationFailed {
                    op: GroupOperation::Remove,
                    reason: FailureReason::BUSY,
                },
                ..
            }
        )));
        assert_eq!(
            rest.last(),
            Some(&HotspotEvent::StatusChanged {
                status: Status::Idle
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn status_transitions_survive_a_full_event_buffer() {
        let service = MockGroupService::new();
        let presenter = RecordingPresenter::new();
        service.push_query(Some(Group::owned("DIRECT-ab", "pw")));
        let mut channels = HotspotController::spawn(
            Arc::new(service.clone()),
            Arc::new(presenter.clone()),
            config().event_buffer(1),
        )
        .unwrap();

        let mut status_rx = channels.handle.watch_status();
        channels.handle.start().await.unwrap();
        while *status_rx.borrow_and_update() != Status::Active {
            status_rx.changed().await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(channels.events.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                HotspotEvent::StatusChanged {
                    status: Status::Starting
                },
                HotspotEvent::StatusChanged {
                    status: Status::Active
                },
                HotspotEvent::GroupAvailable {
                    group: Group::owned("DIRECT-ab", "pw")
                },
            ]
        );
    }
}
