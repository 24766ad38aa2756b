// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn write_temp_file(prefix: &str, contents: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("bringup-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = dir.join(format!("{}-{}.yaml", prefix, nonce));
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("{}-{}", prefix, nonce))
}

#[test]
fn test_scenario_outputs() {
    let script = write_temp_file(
        "scenario-happy",
        r#"
schema_version: "1.0"
name: "happy path"
limits:
  iterations: 3
assertions:
  - init_result: ok
  - expected_state: steady_state
  - toggle_count: 3
  - delay_count: 3
  - last_delay_ms: 500
  - odr_bits_high: { port: d, pins: 0x4000 }
"#,
    );
    let output_dir = temp_dir("bringup-artifacts");

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "scenario",
            "--script",
            script.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result_path = output_dir.join("result.json");
    assert!(result_path.exists());
    assert!(output_dir.join("snapshot.json").exists());

    let junit = std::fs::read_to_string(output_dir.join("junit.xml")).unwrap();
    assert!(junit.contains("<testsuite"));
    assert!(junit.contains(r#"name="bring-up""#));

    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&result_path).unwrap()).unwrap();
    assert_eq!(result["status"], "pass");
    assert_eq!(result["name"], "happy path");
    assert_eq!(result["init_result"], "ok");
    assert_eq!(result["final_state"], "steady_state");
    assert_eq!(result["iterations"], 3);
    assert_eq!(result["metrics"]["iterations"], 3);
    assert_eq!(result["script_hash"].as_str().map(str::len), Some(64));
    assert_eq!(result["assertions"].as_array().map(Vec::len), Some(6));

    let _ = std::fs::remove_dir_all(&output_dir);
    let _ = std::fs::remove_file(&script);
}

#[test]
fn test_scenario_uart_failure_is_observable() {
    let script = write_temp_file(
        "scenario-uart",
        r#"
schema_version: "1.0"
name: "uart failure"
statuses:
  uart_init: error
limits:
  iterations: 3
assertions:
  - init_result: ok
  - expected_state: error
  - called: uart_init
  - not_called: timer_base_init
  - toggle_count: 0
"#,
    );
    let output_dir = temp_dir("bringup-uart");

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "scenario",
            "--script",
            script.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output_dir.join("result.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(result["final_state"], "error");
    assert_eq!(result["fault"]["step"], "uart_init");
    assert_eq!(result["fault"]["status"], "error");
    assert_eq!(result["metrics"]["faults"], 1);

    let _ = std::fs::remove_dir_all(&output_dir);
    let _ = std::fs::remove_file(&script);
}

#[test]
fn test_scenario_assertion_failure() {
    let script = write_temp_file(
        "scenario-fail",
        r#"
schema_version: "1.0"
name: "wrong count"
limits:
  iterations: 2
assertions:
  - toggle_count: 5
"#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["scenario", "--script", script.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1)); // EXIT_ASSERT_FAIL
    let _ = std::fs::remove_file(&script);
}

#[test]
fn test_scenario_iterations_override() {
    let script = write_temp_file(
        "scenario-override",
        r#"
schema_version: "1.0"
name: "override"
limits:
  iterations: 2
assertions:
  - toggle_count: 4
"#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "scenario",
            "--script",
            script.to_str().unwrap(),
            "--iterations",
            "4",
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let _ = std::fs::remove_file(&script);
}

#[test]
fn test_scenario_iterations_guard() {
    let script = write_temp_file(
        "scenario-huge",
        r#"
schema_version: "1.0"
name: "huge"
"#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "scenario",
            "--script",
            script.to_str().unwrap(),
            "--iterations",
            "2000000",
        ])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR
    let _ = std::fs::remove_file(&script);
}

#[test]
fn test_scenario_config_error_outputs() {
    let script = write_temp_file(
        "scenario-bad",
        r#"
schema_version: "9.9"
name: "bad version"
"#,
    );
    let output_dir = temp_dir("bringup-config-error");

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "scenario",
            "--script",
            script.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));

    let result: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output_dir.join("result.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(result["status"], "error");
    assert!(result["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported schema_version"));
    assert!(!output_dir.join("snapshot.json").exists());

    let junit = std::fs::read_to_string(output_dir.join("junit.xml")).unwrap();
    assert!(junit.contains("<error"));

    let _ = std::fs::remove_dir_all(&output_dir);
    let _ = std::fs::remove_file(&script);
}

#[test]
fn test_scenario_missing_script() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["scenario", "--script", "no/such/scenario.yaml"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
}
