//! Group service backed by wpa_supplicant's control interface.
//!
//! Every operation shells out to `wpa_cli`. The P2P device interface
//! (`p2p-dev-wlan0` or plain `wlan0`, depending on the driver) receives
//! group management commands; the group itself lives on a dynamically
//! created `p2p-<iface>-<n>` interface.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::process::Command;

use crate::service::GroupService;
use crate::types::{FailureReason, Group};

/// Mode reported by `status` on a group interface we own.
const GROUP_OWNER_MODE: &str = "P2P GO";

/// `wpa_cli` driven group service.
#[derive(Debug, Clone)]
pub struct WpaCliGroupService {
    program: String,
    ctrl_iface: String,
    ctrl_dir: Option<String>,
    command_timeout: Duration,
    /// Group interface seen by the last successful query.
    group_iface: Arc<Mutex<Option<String>>>,
}

impl WpaCliGroupService {
    /// Drive P2P group management on `ctrl_iface` (e.g. `wlan0`).
    pub fn new(ctrl_iface: impl Into<String>) -> Self {
        Self {
            program: "wpa_cli".to_string(),
            ctrl_iface: ctrl_iface.into(),
            ctrl_dir: None,
            command_timeout: Duration::from_secs(10),
            group_iface: Arc::new(Mutex::new(None)),
        }
    }

    /// Use a different `wpa_cli` binary.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Control socket directory passed as `-p` (default: wpa_cli's own).
    pub fn ctrl_dir(mut self, dir: impl Into<String>) -> Self {
        self.ctrl_dir = Some(dir.into());
        self
    }

    /// Timeout for a single `wpa_cli` invocation (default: 10 s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    async fn run(&self, iface: &str, args: &[&str]) -> Result<String, FailureReason> {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = &self.ctrl_dir {
            cmd.arg("-p").arg(dir);
        }
        cmd.arg("-i").arg(iface).args(args).kill_on_drop(true);

        let output = match tokio::time::timeout(self.command_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(program = %self.program, "could not execute wpa_cli: {e}");
                return Err(FailureReason::ERROR);
            }
            Err(_) => {
                tracing::warn!(iface, ?args, "wpa_cli timed out");
                return Err(FailureReason::ERROR);
            }
        };

        if !output.status.success() {
            tracing::debug!(
                iface,
                ?args,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "wpa_cli exited with {}",
                output.status
            );
            return Err(FailureReason::ERROR);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Name of the current group interface, if any.
    async fn group_interface(&self) -> Result<Option<String>, FailureReason> {
        let listing = self.run(&self.ctrl_iface, &["interface"]).await?;
        Ok(find_group_interface(&listing))
    }

    fn remembered_interface(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.group_iface.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl GroupService for WpaCliGroupService {
    async fn initialize(&self) -> Result<(), FailureReason> {
        let reply = self.run(&self.ctrl_iface, &["ping"]).await?;
        if reply.trim() == "PONG" {
            Ok(())
        } else {
            tracing::warn!(reply = reply.trim(), "unexpected ping reply");
            Err(FailureReason::ERROR)
        }
    }

    async fn query_group(&self) -> Option<Group> {
        let iface = match self.group_interface().await {
            Ok(Some(iface)) => iface,
            Ok(None) => return None,
            Err(reason) => {
                tracing::debug!(%reason, "interface listing failed");
                return None;
            }
        };

        let status = self.run(&iface, &["status"]).await.ok()?;
        let mut group = parse_status(&status)?.with_interface(iface.clone());
        if group.is_owner {
            match self.run(&iface, &["p2p_get_passphrase"]).await {
                Ok(reply) if parse_reply(&reply).is_ok() => {
                    group.passphrase = reply.trim().to_string();
                }
                _ => {
                    tracing::debug!(%iface, "passphrase not available yet");
                    return None;
                }
            }
        }
        *self.remembered_interface() = Some(iface);
        Some(group)
    }

    async fn create_group(&self) -> Result<(), FailureReason> {
        let reply = self.run(&self.ctrl_iface, &["p2p_group_add"]).await?;
        parse_reply(&reply)
    }

    async fn remove_group(&self) -> Result<(), FailureReason> {
        let remembered = self.remembered_interface().take();
        let iface = match remembered {
            Some(iface) => iface,
            None => match self.group_interface().await? {
                Some(iface) => iface,
                None => return Err(FailureReason::ERROR),
            },
        };
        let reply = self
            .run(&self.ctrl_iface, &["p2p_group_remove", iface.as_str()])
            .await?;
        parse_reply(&reply)
    }
}

// ── Output parsing ───────────────────────────────────────────────────

/// Map a command reply (`OK`, `FAIL`, `FAIL-BUSY`, payload) to a result.
pub fn parse_reply(reply: &str) -> Result<(), FailureReason> {
    match reply.trim() {
        "FAIL-BUSY" => Err(FailureReason::BUSY),
        r if r.starts_with("FAIL") => Err(FailureReason::ERROR),
        "" => Err(FailureReason::ERROR),
        _ => Ok(()),
    }
}

/// First `p2p-*` group interface in an `interface` listing.
///
/// `p2p-dev-*` entries are P2P device interfaces, not groups.
pub fn find_group_interface(listing: &str) -> Option<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with("Selected interface") && !l.ends_with(':'))
        .find(|l| l.starts_with("p2p-") && !l.starts_with("p2p-dev-"))
        .map(str::to_string)
}

/// Build a group from `status` output on a group interface.
///
/// Returns `None` until the interface reports an SSID.
pub fn parse_status(status: &str) -> Option<Group> {
    let mut mode = None;
    let mut ssid = None;
    for line in status.lines() {
        match line.trim().split_once('=') {
            Some(("mode", v)) => mode = Some(v),
            Some(("ssid", v)) => ssid = Some(v),
            _ => {}
        }
    }

    let ssid = ssid.filter(|s| !s.is_empty())?;
    Some(Group {
        is_owner: mode == Some(GROUP_OWNER_MODE),
        network_name: ssid.to_string(),
        passphrase: String::new(),
        interface: None,
    })
}
