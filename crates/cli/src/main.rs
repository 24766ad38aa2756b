// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bringup_config::{Scenario, MAX_ITERATIONS};
use bringup_core::harness::{RunSummary, TestOutcome};
use bringup_core::metrics::{LoopMetrics, MetricsReport};
use bringup_core::mock::MockHal;
use bringup_core::scenario::{run_scenario, ScenarioReport};
use bringup_core::sequencer::Sequencer;
use bringup_core::snapshot::MockSnapshot;
use bringup_core::{HalStatus, InitStep};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

mod report;
mod suite;

use report::{CaseStatus, JunitCase};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

const RESULT_SCHEMA_VERSION: &str = "1.0";

/// `entry=status`, e.g. `uart_init=error`.
fn parse_force(s: &str) -> Result<(InitStep, HalStatus), String> {
    let (entry, status) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected ENTRY=STATUS, got '{}'", s))?;

    let step = match entry.trim() {
        "platform_init" => InitStep::PlatformInit,
        "oscillator_config" => InitStep::OscillatorConfig,
        "bus_clock_config" => InitStep::BusClockConfig,
        "uart_init" => InitStep::UartInit,
        "timer_base_init" => InitStep::TimerBaseInit,
        "timer_sync_config" => InitStep::TimerSyncConfig,
        other => return Err(format!("Unknown entry point '{}'", other)),
    };
    let status = match status.trim() {
        "ok" => HalStatus::Ok,
        "error" => HalStatus::Error,
        "busy" => HalStatus::Busy,
        "timeout" => HalStatus::Timeout,
        other => return Err(format!("Unknown status '{}'", other)),
    };
    Ok((step, status))
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "STM32F4 board bring-up harness",
    long_about = None
)]
struct Cli {
    /// Enable debug-level logging of every mocked HAL call
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the built-in test suite against the mock HAL.
    Selftest(SelftestArgs),

    /// Run a YAML scenario script and evaluate its assertions.
    Scenario(ScenarioArgs),
}

#[derive(Parser, Debug)]
struct SelftestArgs {
    /// Optional path to write a JUnit XML report for CI systems
    #[arg(long)]
    junit: Option<PathBuf>,

    /// Write the mock state after the last test (JSON)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Force an entry point status before every test (repeatable), e.g. `uart_init=error`
    #[arg(long = "force", value_parser = parse_force)]
    force: Vec<(InitStep, HalStatus)>,
}

#[derive(Parser, Debug)]
struct ScenarioArgs {
    /// Path to the scenario script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Override steady-state iterations (takes precedence over script)
    #[arg(long)]
    iterations: Option<u64>,

    /// Directory to write artifacts (result.json, snapshot.json, junit.xml)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Optional path to write a JUnit XML report for CI systems
    #[arg(long)]
    junit: Option<PathBuf>,

    /// Write the final mock and sequencer state (JSON)
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ScenarioResult {
    result_schema_version: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten)]
    report: Option<ScenarioReport>,
    metrics: Option<MetricsReport>,
    script_hash: String,
    script: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so the test report on stdout stays machine readable.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Selftest(args) => run_selftest(args),
        Commands::Scenario(args) => run_scenario_cmd(args),
    }
}

fn run_selftest(args: SelftestArgs) -> ExitCode {
    let start = Instant::now();
    let mut runner = suite::runner(args.force.clone());
    info!("Running {} tests", runner.tests().len());

    println!("{}:", suite::SUITE_NAME);
    let summary = runner.run_with(|result| println!("{}", result));
    println!();
    println!("{}", summary.footer());

    if let Some(path) = &args.junit {
        let cases = selftest_junit_cases(&summary);
        report::write_junit_xml(
            path,
            suite::SUITE_NAME,
            &cases,
            &[("result_schema_version", RESULT_SCHEMA_VERSION.to_string())],
            start.elapsed(),
        );
    }

    if let Some(path) = &args.snapshot {
        let board = runner.fixture();
        match MockSnapshot::capture(&board.hal) {
            Ok(snap) => report::write_json(path, &snap.with_sequencer(&board.seq)),
            Err(e) => error!("Failed to capture snapshot: {}", e),
        }
    }

    ExitCode::from(summary.exit_code())
}

fn selftest_junit_cases(summary: &RunSummary) -> Vec<JunitCase> {
    summary
        .results
        .iter()
        .map(|result| {
            let (status, details) = match &result.outcome {
                TestOutcome::Pass => (CaseStatus::Passed, None),
                TestOutcome::Fail(failure) => (
                    CaseStatus::Failed(failure.message.clone()),
                    Some(format!("{}:{}", failure.file, failure.line)),
                ),
                TestOutcome::Ignore { reason } => (CaseStatus::Skipped(reason.clone()), None),
            };
            JunitCase {
                name: result.name.clone(),
                status,
                details,
            }
        })
        .collect()
}

fn run_scenario_cmd(args: ScenarioArgs) -> ExitCode {
    let start = Instant::now();

    let script_hash = std::fs::read(&args.script)
        .map(|bytes| report::sha256_hex(&bytes))
        .unwrap_or_default();

    let (scenario, iterations) = match load_scenario(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, &script_hash, msg, start);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(LoopMetrics::new());
    let mut hal = MockHal::from_scenario(&scenario);
    let mut seq = Sequencer::new();
    seq.observers.push(metrics.clone());

    let report = run_scenario(&scenario, &mut hal, &mut seq, iterations);

    for result in report.assertions.iter().filter(|a| !a.passed) {
        error!("Assertion failed: {}", result.message);
    }
    let passed = report.passed();
    info!(
        "Scenario '{}' {} ({} of {} assertions passed)",
        report.name,
        if passed { "passed" } else { "failed" },
        report.assertions.iter().filter(|a| a.passed).count(),
        report.assertions.len()
    );

    let status = if passed { "pass" } else { "fail" };
    let cases = scenario_junit_cases(Some(&report), None);
    let result = ScenarioResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        message: None,
        report: Some(report),
        metrics: Some(metrics.report()),
        script_hash,
        script: args.script.clone(),
    };

    let snapshot = match MockSnapshot::capture(&hal) {
        Ok(snap) => Some(snap.with_sequencer(&seq)),
        Err(e) => {
            error!("Failed to capture snapshot: {}", e);
            None
        }
    };

    write_outputs(&args, &result, snapshot.as_ref(), &cases, start);

    if passed {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_ASSERT_FAIL)
    }
}

/// Load and validate the script, resolving the iteration count.
fn load_scenario(args: &ScenarioArgs) -> anyhow::Result<(Scenario, u64)> {
    info!("Loading scenario: {:?}", args.script);
    let scenario = Scenario::from_file(&args.script)?;

    let iterations = args.iterations.unwrap_or(scenario.limits.iterations);
    if iterations > MAX_ITERATIONS {
        anyhow::bail!(
            "iterations {} exceeds MAX_ITERATIONS {}",
            iterations,
            MAX_ITERATIONS
        );
    }
    Ok((scenario, iterations))
}

fn scenario_junit_cases(
    report: Option<&ScenarioReport>,
    config_error: Option<&str>,
) -> Vec<JunitCase> {
    let mut cases = Vec::new();

    // A halted sequencer is not a failure by itself; scenarios assert on it.
    let status = match config_error {
        Some(msg) => CaseStatus::Errored(format!("config error: {}", msg)),
        None => CaseStatus::Passed,
    };
    cases.push(JunitCase {
        name: "bring-up".to_string(),
        status,
        details: report.and_then(|r| r.fault).map(|fault| fault.to_string()),
    });

    if let Some(r) = report {
        for (idx, a) in r.assertions.iter().enumerate() {
            cases.push(JunitCase {
                name: format!("assertion {}: {}", idx + 1, a.message),
                status: if a.passed {
                    CaseStatus::Passed
                } else {
                    CaseStatus::Failed("assertion failed".to_string())
                },
                details: Some(a.message.clone()),
            });
        }
    }
    cases
}

fn write_outputs(
    args: &ScenarioArgs,
    result: &ScenarioResult,
    snapshot: Option<&MockSnapshot>,
    cases: &[JunitCase],
    start: Instant,
) {
    let properties = [
        ("result_schema_version", RESULT_SCHEMA_VERSION.to_string()),
        ("status", result.status.clone()),
        ("script_hash", result.script_hash.clone()),
    ];

    if let Some(output_dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            error!("Failed to create output directory {:?}: {}", output_dir, e);
        } else {
            report::write_json(&output_dir.join("result.json"), result);
            if let Some(snap) = snapshot {
                report::write_json(&output_dir.join("snapshot.json"), snap);
            }
            report::write_junit_xml(
                &output_dir.join("junit.xml"),
                "bringup",
                cases,
                &properties,
                start.elapsed(),
            );
        }
    }

    if let Some(path) = &args.junit {
        report::write_junit_xml(path, "bringup", cases, &properties, start.elapsed());
    }

    if let Some(path) = &args.snapshot {
        match snapshot {
            Some(snap) => report::write_json(path, snap),
            None => error!("No snapshot available for {:?}", path),
        }
    }
}

fn write_config_error_outputs(
    args: &ScenarioArgs,
    script_hash: &str,
    message: String,
    start: Instant,
) {
    let cases = scenario_junit_cases(None, Some(&message));
    let result = ScenarioResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        message: Some(message),
        report: None,
        metrics: None,
        script_hash: script_hash.to_string(),
        script: args.script.clone(),
    };
    write_outputs(args, &result, None, &cases, start);
}
