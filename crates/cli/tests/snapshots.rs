// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn nonce() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

#[test]
fn test_scenario_writes_snapshot() {
    let dir = std::env::temp_dir().join(format!("bringup-snapshot-{}", nonce()));
    std::fs::create_dir_all(&dir).unwrap();
    let script = dir.join("scenario.yaml");
    std::fs::write(
        &script,
        r#"
schema_version: "1.0"
name: "snapshot"
limits:
  iterations: 1
"#,
    )
    .unwrap();
    let snapshot_path = dir.join("state.json");

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "scenario",
            "--script",
            script.to_str().unwrap(),
            "--snapshot",
            snapshot_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(snapshot["sequencer"]["state"], "steady_state");
    assert_eq!(snapshot["sequencer"]["iterations"], 1);
    assert_eq!(snapshot["system_core_clock_hz"], 168_000_000);
    assert_eq!(snapshot["ports"]["GPIOD"]["odr"], 0x4000);
    assert_eq!(snapshot["control"]["gpio_toggle_count"], 1);
    assert_eq!(snapshot["control"]["uart_init_calls"], 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_selftest_writes_snapshot() {
    let snapshot_path = std::env::temp_dir().join(format!("bringup-selftest-{}.json", nonce()));
    let _ = std::fs::remove_file(&snapshot_path);

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["selftest", "--snapshot", snapshot_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());
    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(snapshot["ports"].as_object().map(|p| p.len()), Some(4));
    assert!(snapshot["control"].is_object());

    let _ = std::fs::remove_file(&snapshot_path);
}
