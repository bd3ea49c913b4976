use crate::config::HotspotConfig;
use crate::error::HotspotError;
use crate::types::{FailureReason, Group, GroupOperation, Status};

use super::effect::{Completion, HotspotEffect};
use super::{CommandOutcome, HotspotEvent};

/// Re-query counter for the current creation attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub tries: u32,
}

/// Which asynchronous step the controller is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing in flight.
    Settled,
    /// Initial query, looking for a group left over from before.
    QueryingExisting,
    /// Removing a leftover group we do not own.
    RemovingStale,
    /// `create_group` in flight.
    Creating,
    /// Query after a successful create.
    Requerying,
    /// Waiting for the backoff timer.
    BackingOff,
    /// `remove_group` in flight for a stop, `from` is the status at stop time.
    Stopping { from: Status },
}

/// Complete controller state: pure logic, no async, no I/O.
///
/// Every `handle_*` method returns `Vec<HotspotEffect>`.
/// No method touches the group service, the presenter or a channel.
pub struct HotspotState {
    config: HotspotConfig,
    status: Status,
    group: Option<Group>,
    retry: RetryState,
    phase: Phase,
    /// Bumped on every start and on a stop that cancels a start.
    generation: u64,
}

impl HotspotState {
    pub fn new(config: HotspotConfig) -> Self {
        Self {
            config,
            status: Status::Idle,
            group: None,
            retry: RetryState::default(),
            phase: Phase::Settled,
            generation: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    pub fn retry(&self) -> RetryState {
        self.retry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a stop-triggered removal is in flight.
    pub fn is_stopping(&self) -> bool {
        matches!(self.phase, Phase::Stopping { .. })
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Begin a start attempt. Only accepted from `Idle`.
    pub fn handle_start(&mut self) -> (CommandOutcome, Vec<HotspotEffect>) {
        if self.status != Status::Idle {
            tracing::debug!(status = %self.status, "start rejected");
            return (
                CommandOutcome::NotAccepted {
                    status: self.status,
                },
                Vec::new(),
            );
        }

        self.generation += 1;
        self.retry = RetryState::default();
        self.phase = Phase::QueryingExisting;

        let mut effects = Vec::new();
        self.set_status(Status::Starting, &mut effects);
        effects.push(HotspotEffect::QueryGroup {
            generation: self.generation,
        });
        (CommandOutcome::Accepted, effects)
    }

    /// Remove the group. Accepted whenever not `Idle` and not already stopping.
    ///
    /// A stop while `Starting` abandons the start attempt.
    pub fn handle_stop(&mut self) -> (CommandOutcome, Vec<HotspotEffect>) {
        if self.status == Status::Idle || self.is_stopping() {
            tracing::debug!(status = %self.status, "stop rejected");
            return (
                CommandOutcome::NotAccepted {
                    status: self.status,
                },
                Vec::new(),
            );
        }

        let generation = self.begin_stop();
        (
            CommandOutcome::Accepted,
            vec![HotspotEffect::RemoveGroup {
                generation,
                op: GroupOperation::Remove,
            }],
        )
    }

    /// Prepare a teardown removal, run inline by the loop.
    ///
    /// Returns the generation to report the removal under, or `None` when
    /// there is nothing to remove.
    pub fn handle_teardown(&mut self) -> Option<u64> {
        if self.status == Status::Idle {
            return None;
        }
        if !self.is_stopping() {
            self.begin_stop();
        }
        Some(self.generation)
    }

    /// Close out a teardown once its removal has been reported.
    ///
    /// The controller is going away, so whatever the removal outcome the
    /// notification is withdrawn and `Idle` is published.
    pub fn finish_teardown(&mut self) -> Vec<HotspotEffect> {
        let mut effects = Vec::new();
        if self.status != Status::Idle {
            tracing::warn!(status = %self.status, "group left in place after teardown");
            self.clean(&mut effects);
        }
        effects
    }

    /// The platform control channel dropped; open a new one.
    pub fn handle_channel_disconnected(&mut self) -> Vec<HotspotEffect> {
        tracing::info!("group service channel disconnected, reinitializing");
        vec![HotspotEffect::Initialize]
    }

    fn begin_stop(&mut self) -> u64 {
        let from = self.status;
        if from == Status::Starting {
            // Pending completions and timers of the start attempt become stale.
            self.generation += 1;
            tracing::info!("stop requested while starting, abandoning start attempt");
        }
        self.phase = Phase::Stopping { from };
        self.generation
    }

    // ── Completions ──────────────────────────────────────────────────────

    /// Dispatch a service or timer completion.
    pub fn handle_completion(&mut self, completion: Completion) -> Vec<HotspotEffect> {
        match completion {
            Completion::Initialized { result } => self.handle_initialized(result),
            Completion::Queried { generation, group } => {
                self.handle_query_result(generation, group)
            }
            Completion::Created { generation, result } => {
                self.handle_create_result(generation, result)
            }
            Completion::Removed {
                generation,
                op,
                result,
            } => self.handle_remove_result(generation, op, result),
            Completion::BackoffElapsed { generation } => self.handle_backoff_elapsed(generation),
        }
    }

    pub fn handle_initialized(&mut self, result: Result<(), FailureReason>) -> Vec<HotspotEffect> {
        match result {
            Ok(()) => tracing::debug!("group service channel ready"),
            Err(reason) => tracing::warn!(%reason, "group service initialization failed"),
        }
        Vec::new()
    }

    pub fn handle_query_result(
        &mut self,
        generation: u64,
        group: Option<Group>,
    ) -> Vec<HotspotEffect> {
        if self.is_stale(generation, "query") {
            return Vec::new();
        }

        match self.phase {
            Phase::QueryingExisting => match group {
                None => self.begin_create(),
                Some(group) if group.is_owner => self.activate(group),
                Some(group) => {
                    tracing::info!(%group, "removing old group");
                    self.phase = Phase::RemovingStale;
                    vec![HotspotEffect::RemoveGroup {
                        generation: self.generation,
                        op: GroupOperation::RemoveStale,
                    }]
                }
            },
            Phase::Requerying => match group {
                Some(group) if group.is_owner => self.activate(group),
                other if self.retry.tries < self.config.max_retries => {
                    let delay = self.config.backoff_delay(self.retry.tries);
                    self.retry.tries += 1;
                    self.phase = Phase::BackingOff;
                    tracing::debug!(
                        tries = self.retry.tries,
                        delay_ms = delay.as_millis() as u64,
                        group = ?other,
                        "group not owner-ready, backing off"
                    );
                    vec![HotspotEffect::ScheduleRequery {
                        generation: self.generation,
                        delay,
                    }]
                }
                other => self.abort_start(HotspotError::UnexpectedGroupState { group: other }, true),
            },
            phase => {
                tracing::debug!(?phase, "query result ignored");
                Vec::new()
            }
        }
    }

    pub fn handle_create_result(
        &mut self,
        generation: u64,
        result: Result<(), FailureReason>,
    ) -> Vec<HotspotEffect> {
        if self.is_stale(generation, "create") || self.phase != Phase::Creating {
            return Vec::new();
        }

        match result {
            Ok(()) => {
                self.phase = Phase::Requerying;
                vec![HotspotEffect::QueryGroup {
                    generation: self.generation,
                }]
            }
            Err(reason) => self.abort_start(
                HotspotError::OperationFailed {
                    op: GroupOperation::Create,
                    reason,
                },
                true,
            ),
        }
    }

    pub fn handle_remove_result(
        &mut self,
        generation: u64,
        op: GroupOperation,
        result: Result<(), FailureReason>,
    ) -> Vec<HotspotEffect> {
        if self.is_stale(generation, "remove") {
            return Vec::new();
        }

        match (self.phase, op) {
            (Phase::RemovingStale, GroupOperation::RemoveStale) => match result {
                Ok(()) => self.begin_create(),
                Err(reason) => self.abort_start(
                    HotspotError::OperationFailed {
                        op: GroupOperation::RemoveStale,
                        reason,
                    },
                    false,
                ),
            },
            (Phase::Stopping { from }, GroupOperation::Remove) => match result {
                Ok(()) => {
                    tracing::info!("group removed");
                    let mut effects = Vec::new();
                    self.clean(&mut effects);
                    effects
                }
                Err(reason) => {
                    let error = HotspotError::OperationFailed {
                        op: GroupOperation::Remove,
                        reason,
                    };
                    tracing::warn!(%error, "group removal failed");
                    let mut effects = vec![error_event(error)];
                    if from == Status::Starting {
                        // The start attempt is gone; nothing else will move us out of Starting.
                        self.clean(&mut effects);
                    } else {
                        self.phase = Phase::Settled;
                    }
                    effects
                }
            },
            (phase, op) => {
                tracing::debug!(?phase, ?op, "remove result ignored");
                Vec::new()
            }
        }
    }

    pub fn handle_backoff_elapsed(&mut self, generation: u64) -> Vec<HotspotEffect> {
        if self.is_stale(generation, "backoff") || self.phase != Phase::BackingOff {
            return Vec::new();
        }
        self.phase = Phase::Requerying;
        vec![HotspotEffect::QueryGroup {
            generation: self.generation,
        }]
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn is_stale(&self, generation: u64, what: &str) -> bool {
        let stale = generation != self.generation;
        if stale {
            tracing::debug!(
                generation,
                current = self.generation,
                what,
                "dropping stale completion"
            );
        }
        stale
    }

    fn begin_create(&mut self) -> Vec<HotspotEffect> {
        self.retry = RetryState::default();
        self.phase = Phase::Creating;
        vec![HotspotEffect::CreateGroup {
            generation: self.generation,
        }]
    }

    fn activate(&mut self, group: Group) -> Vec<HotspotEffect> {
        tracing::info!(%group, "group active");
        let mut effects = vec![HotspotEffect::Present {
            title: group.network_name.clone(),
            subtext: group.passphrase.clone(),
        }];
        self.group = Some(group.clone());
        self.phase = Phase::Settled;
        self.set_status(Status::Active, &mut effects);
        effects.push(HotspotEffect::Emit(HotspotEvent::GroupAvailable { group }));
        effects
    }

    /// Give up on the current start attempt and return to `Idle`.
    fn abort_start(&mut self, error: HotspotError, neutral: bool) -> Vec<HotspotEffect> {
        tracing::warn!(%error, "start attempt failed");
        let mut effects = vec![error_event(error)];
        if neutral {
            effects.push(HotspotEffect::PresentNeutral);
        }
        self.clean(&mut effects);
        effects
    }

    fn clean(&mut self, effects: &mut Vec<HotspotEffect>) {
        self.group = None;
        self.retry = RetryState::default();
        self.phase = Phase::Settled;
        effects.push(HotspotEffect::ClearNotification);
        self.set_status(Status::Idle, effects);
    }

    fn set_status(&mut self, status: Status, effects: &mut Vec<HotspotEffect>) {
        if self.status == status {
            return;
        }
        tracing::debug!(from = %self.status, to = %status, "status transition");
        self.status = status;
        effects.push(HotspotEffect::StatusChanged(status));
    }
}

fn error_event(error: HotspotError) -> HotspotEffect {
    let message = error.user_message();
    HotspotEffect::Emit(HotspotEvent::Error { error, message })
}
