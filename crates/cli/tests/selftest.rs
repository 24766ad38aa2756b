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
fn test_selftest_passes() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .arg("selftest")
        .output()
        .expect("Failed to execute bringup");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", stdout);
    assert!(stdout.contains(":test_hal_init_success:PASS"));
    assert!(stdout.contains(":test_system_integration:PASS"));
    assert!(stdout.contains("29 Tests 0 Failures 0 Ignored"));
    assert!(stdout.trim_end().ends_with("OK"));
}

#[test]
fn test_selftest_forced_failure_sets_exit_code() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["selftest", "--force", "platform_init=error"])
        .output()
        .expect("Failed to execute bringup");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains(":test_default_statuses_reach_steady_state:FAIL:"));
    assert!(stdout.trim_end().ends_with("FAIL"));

    let failures = stdout
        .lines()
        .filter(|line| line.contains(":FAIL:"))
        .count() as i32;
    assert_eq!(output.status.code(), Some(failures));
}

#[test]
fn test_selftest_rejects_bad_force_value() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["selftest", "--force", "uart_init=maybe"])
        .output()
        .expect("Failed to execute bringup");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown status"));
}

#[test]
fn test_selftest_junit_report() {
    let junit_path = std::env::temp_dir().join(format!("bringup-selftest-{}.xml", nonce()));
    let _ = std::fs::remove_file(&junit_path);

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["selftest", "--junit", junit_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());
    let junit = std::fs::read_to_string(&junit_path).unwrap();
    assert!(junit.contains(r#"<testsuite name="bringup_selftest" tests="29" failures="0""#));
    assert!(junit.contains(r#"name="test_gpio_read_pin""#));

    let _ = std::fs::remove_file(&junit_path);
}

#[test]
fn test_selftest_logs_stay_off_stdout() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["--trace", "selftest"])
        .output()
        .expect("Failed to execute bringup");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("DEBUG"));
    assert!(!stdout.contains("INFO"));
}
