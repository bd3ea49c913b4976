use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of the hotspot group.
///
/// Follows the progression: Idle -> Starting -> Active -> Idle.
/// There is no direct Active -> Starting edge; a stop always lands on Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Starting,
    Active,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Idle => "idle",
            Status::Starting => "starting",
            Status::Active => "active",
        };
        f.write_str(s)
    }
}

/// A WiFi P2P group as reported by the group service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Whether this device owns the group.
    pub is_owner: bool,
    /// SSID advertised by the group.
    pub network_name: String,
    /// WPA passphrase clients use to join.
    pub passphrase: String,
    /// Group network interface, when the backend knows it (e.g. `p2p-wlan0-0`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

impl Group {
    /// An owned group with the given credentials.
    pub fn owned(network_name: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            is_owner: true,
            network_name: network_name.into(),
            passphrase: passphrase.into(),
            interface: None,
        }
    }

    /// A group this device joined as a client.
    pub fn client(network_name: impl Into<String>) -> Self {
        Self {
            is_owner: false,
            network_name: network_name.into(),
            passphrase: String::new(),
            interface: None,
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.is_owner { "owner" } else { "client" };
        write!(f, "{} ({role})", self.network_name)
    }
}

/// Platform failure code returned by a group service operation.
///
/// Known codes mirror the WiFi P2P action-listener reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureReason(pub u32);

impl FailureReason {
    pub const ERROR: FailureReason = FailureReason(0);
    pub const P2P_UNSUPPORTED: FailureReason = FailureReason(1);
    pub const BUSY: FailureReason = FailureReason(2);
    pub const NO_SERVICE_REQUESTS: FailureReason = FailureReason(3);

    /// Symbolic name for well-known codes.
    pub fn name(&self) -> Option<&'static str> {
        match self.0 {
            0 => Some("ERROR"),
            1 => Some("P2P_UNSUPPORTED"),
            2 => Some("BUSY"),
            3 => Some("NO_SERVICE_REQUESTS"),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Which group service call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOperation {
    /// Removing a group we found but do not own, before creating our own.
    RemoveStale,
    /// Creating a new group.
    Create,
    /// Removing our group on stop / teardown.
    Remove,
}

impl fmt::Display for GroupOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupOperation::RemoveStale => "remove old",
            GroupOperation::Create => "create",
            GroupOperation::Remove => "remove",
        };
        f.write_str(s)
    }
}
