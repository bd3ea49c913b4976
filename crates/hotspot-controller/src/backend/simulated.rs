//! In-memory group service with scripted behaviour.
//!
//! Models a platform that takes a few queries after `create_group` before
//! the new group reports this device as owner. Used by the CLI `sim` mode
//! and by integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::service::GroupService;
use crate::types::{FailureReason, Group};

/// Knobs for [`SimulatedGroupService`].
#[derive(Debug, Clone)]
pub struct SimulatedBehavior {
    /// Group present before the first start.
    pub existing: Option<Group>,
    /// Queries answered with "no group" after a create, before ownership shows.
    pub ready_after: u32,
    /// Every `create_group` fails with this code.
    pub create_failure: Option<FailureReason>,
    /// Every `remove_group` fails with this code.
    pub remove_failure: Option<FailureReason>,
    /// Credentials of the group formed by `create_group`.
    pub network_name: String,
    pub passphrase: String,
    /// Artificial delay for every call.
    pub latency: Duration,
}

impl Default for SimulatedBehavior {
    fn default() -> Self {
        Self {
            existing: None,
            ready_after: 0,
            create_failure: None,
            remove_failure: None,
            network_name: "DIRECT-sim-hotspot".to_string(),
            passphrase: "simulated-passphrase".to_string(),
            latency: Duration::ZERO,
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedCall {
    Initialize,
    Query,
    Create,
    Remove,
}

#[derive(Debug)]
struct SimState {
    group: Option<Group>,
    /// Remaining "not ready" answers while a created group forms.
    forming: Option<u32>,
    calls: Vec<SimulatedCall>,
}

/// Group service that never leaves the process.
#[derive(Clone)]
pub struct SimulatedGroupService {
    behavior: SimulatedBehavior,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedGroupService {
    pub fn new(behavior: SimulatedBehavior) -> Self {
        let state = SimState {
            group: behavior.existing.clone(),
            forming: None,
            calls: Vec::new(),
        };
        Self {
            behavior,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<SimulatedCall> {
        self.lock().calls.clone()
    }

    /// The group the simulated platform currently holds.
    pub fn current_group(&self) -> Option<Group> {
        self.lock().group.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn delay(&self) {
        if !self.behavior.latency.is_zero() {
            tokio::time::sleep(self.behavior.latency).await;
        }
    }
}

#[async_trait::async_trait]
impl GroupService for SimulatedGroupService {
    async fn initialize(&self) -> Result<(), FailureReason> {
        self.lock().calls.push(SimulatedCall::Initialize);
        Ok(())
    }

    async fn query_group(&self) -> Option<Group> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.push(SimulatedCall::Query);
        let forming = state.forming;
        match forming {
            Some(0) => {
                state.forming = None;
                state.group = Some(Group::owned(
                    self.behavior.network_name.clone(),
                    self.behavior.passphrase.clone(),
                ));
            }
            Some(n) => {
                state.forming = Some(n - 1);
                return None;
            }
            None => {}
        }
        state.group.clone()
    }

    async fn create_group(&self) -> Result<(), FailureReason> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.push(SimulatedCall::Create);
        if let Some(reason) = self.behavior.create_failure {
            return Err(reason);
        }
        if state.group.is_some() || state.forming.is_some() {
            return Err(FailureReason::BUSY);
        }
        state.forming = Some(self.behavior.ready_after);
        Ok(())
    }

    async fn remove_group(&self) -> Result<(), FailureReason> {
        self.delay().await;
        let mut state = self.lock();
        state.calls.push(SimulatedCall::Remove);
        if let Some(reason) = self.behavior.remove_failure {
            return Err(reason);
        }
        if state.group.is_none() && state.forming.is_none() {
            return Err(FailureReason::ERROR);
        }
        state.group = None;
        state.forming = None;
        Ok(())
    }
}
