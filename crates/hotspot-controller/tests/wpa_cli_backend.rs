//! wpa_cli backend against a scripted stand-in for the real binary.
//!
//! The script logs every invocation and answers like wpa_supplicant with
//! a group-owner interface `p2p-wlan0-7`.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use hotspot_controller::{GroupService, WpaCliGroupService};

const SCRIPT: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/calls.log"
while [ "$1" = "-p" ] || [ "$1" = "-i" ]; do shift 2; done
case "$1" in
  ping) echo PONG ;;
  interface) printf 'Selected interface wlan0\np2p-dev-wlan0\nwlan0\np2p-wlan0-7\n' ;;
  status) printf 'ssid=DIRECT-xy-test\nmode=P2P GO\nwpa_state=COMPLETED\n' ;;
  p2p_get_passphrase) echo s3cr3tPass ;;
  p2p_group_add) echo OK ;;
  p2p_group_remove) echo OK ;;
  *) echo FAIL ;;
esac
"#;

fn fake_wpa_cli(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hotspot-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let _ = std::fs::remove_file(dir.join("calls.log"));
    let program = dir.join("wpa_cli");
    std::fs::write(&program, SCRIPT).unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
    program
}

fn calls(program: &PathBuf) -> Vec<String> {
    let log = program.with_file_name("calls.log");
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn removal_targets_the_queried_group_interface() {
    let program = fake_wpa_cli("remove");
    let service = WpaCliGroupService::new("wlan0").program(program.to_string_lossy());

    assert_eq!(service.initialize().await, Ok(()));
    let group = service.query_group().await.expect("group reported");
    assert!(group.is_owner);
    assert_eq!(group.network_name, "DIRECT-xy-test");
    assert_eq!(group.passphrase, "s3cr3tPass");
    assert_eq!(group.interface.as_deref(), Some("p2p-wlan0-7"));

    assert_eq!(service.remove_group().await, Ok(()));

    let log = calls(&program);
    assert_eq!(
        log.iter().filter(|c| c.ends_with(" interface")).count(),
        1,
        "removal must reuse the queried interface: {log:?}"
    );
    assert_eq!(log.last().map(String::as_str), Some("-i wlan0 p2p_group_remove p2p-wlan0-7"));

    // Without a remembered interface the listing is consulted again.
    assert_eq!(service.remove_group().await, Ok(()));
    let log = calls(&program);
    assert_eq!(log.iter().filter(|c| c.ends_with(" interface")).count(), 2);
    assert_eq!(log.last().map(String::as_str), Some("-i wlan0 p2p_group_remove p2p-wlan0-7"));

    assert_eq!(service.create_group().await, Ok(()));
}
