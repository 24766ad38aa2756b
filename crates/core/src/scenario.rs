// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Execution of YAML scenario scripts against the mock HAL.

use crate::mock::MockHal;
use crate::peripherals::gpio::PortId;
use crate::sequencer::{FaultHandler, Sequencer, SequencerState};
use crate::{InitStep, PeripheralInitError};
use bringup_config::{Entry, InitOutcome, Scenario, ScenarioAssertion, StateName, StatusOverrides};
use serde::Serialize;
use tracing::info;

impl From<SequencerState> for StateName {
    fn from(state: SequencerState) -> Self {
        match state {
            SequencerState::Unconfigured => StateName::Unconfigured,
            SequencerState::ClockConfiguring => StateName::ClockConfiguring,
            SequencerState::GpioConfiguring => StateName::GpioConfiguring,
            SequencerState::UartConfiguring => StateName::UartConfiguring,
            SequencerState::TimerConfiguring => StateName::TimerConfiguring,
            SequencerState::SteadyState => StateName::SteadyState,
            SequencerState::Error(_) => StateName::Error,
        }
    }
}

impl MockHal {
    /// Fresh mock with the scenario's forced statuses applied.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut hal = MockHal::new();
        hal.apply_overrides(&scenario.statuses);
        hal
    }

    pub fn apply_overrides(&mut self, overrides: &StatusOverrides) {
        let table = [
            (InitStep::PlatformInit, overrides.platform_init),
            (InitStep::OscillatorConfig, overrides.oscillator_config),
            (InitStep::BusClockConfig, overrides.bus_clock_config),
            (InitStep::UartInit, overrides.uart_init),
            (InitStep::TimerBaseInit, overrides.timer_base_init),
            (InitStep::TimerSyncConfig, overrides.timer_sync_config),
        ];
        for (step, status) in table {
            if let Some(status) = status {
                self.set_status(step, status.into());
            }
        }
    }

    fn entry_calls(&self, entry: Entry) -> u32 {
        let control = self.control();
        match entry {
            Entry::PlatformInit => control.calls(InitStep::PlatformInit),
            Entry::OscillatorConfig => control.calls(InitStep::OscillatorConfig),
            Entry::BusClockConfig => control.calls(InitStep::BusClockConfig),
            Entry::GpioInit => control.gpio_init_calls,
            Entry::UartInit => control.calls(InitStep::UartInit),
            Entry::TimerBaseInit => control.calls(InitStep::TimerBaseInit),
            Entry::TimerSyncConfig => control.calls(InitStep::TimerSyncConfig),
        }
    }

    fn odr(&self, port: PortId) -> u32 {
        self.port(port).map(|p| p.odr()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionResult {
    pub assertion: ScenarioAssertion,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub init_result: InitOutcome,
    pub final_state: StateName,
    pub fault: Option<PeripheralInitError>,
    pub iterations: u64,
    pub toggle_count: u32,
    pub delay_count: u32,
    pub last_delay_ms: u32,
    pub assertions: Vec<AssertionResult>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.assertions.iter().all(|a| a.passed)
    }
}

/// Bring the board up, run `iterations` loop passes and check the scenario's
/// assertions against what the mock recorded.
pub fn run_scenario<F: FaultHandler>(
    scenario: &Scenario,
    hal: &mut MockHal,
    seq: &mut Sequencer<F>,
    iterations: u64,
) -> ScenarioReport {
    info!("Running scenario '{}'", scenario.name);

    let init_result = match seq.initialize(hal) {
        Ok(()) => InitOutcome::Ok,
        Err(_) => InitOutcome::Error,
    };
    let iterations = seq.run(hal, iterations);

    let assertions = scenario
        .assertions
        .iter()
        .map(|assertion| evaluate(assertion, hal, seq.state(), init_result))
        .collect();

    ScenarioReport {
        name: scenario.name.clone(),
        init_result,
        final_state: seq.state().into(),
        fault: seq.fault(),
        iterations,
        toggle_count: hal.gpio_toggle_count(),
        delay_count: hal.delay_call_count(),
        last_delay_ms: hal.last_delay_ms(),
        assertions,
    }
}

pub fn evaluate(
    assertion: &ScenarioAssertion,
    hal: &MockHal,
    state: SequencerState,
    init_result: InitOutcome,
) -> AssertionResult {
    let (passed, message) = match assertion {
        ScenarioAssertion::InitResult(a) => compare("init_result", a.init_result, init_result),
        ScenarioAssertion::ExpectedState(a) => {
            compare("state", a.expected_state, StateName::from(state))
        }
        ScenarioAssertion::ToggleCount(a) => {
            compare("toggle_count", a.toggle_count, hal.gpio_toggle_count())
        }
        ScenarioAssertion::DelayCount(a) => {
            compare("delay_count", a.delay_count, hal.delay_call_count())
        }
        ScenarioAssertion::LastDelay(a) => {
            compare("last_delay_ms", a.last_delay_ms, hal.last_delay_ms())
        }
        ScenarioAssertion::Called(a) => {
            let calls = hal.entry_calls(a.called);
            (calls > 0, format!("{:?} called {} time(s)", a.called, calls))
        }
        ScenarioAssertion::NotCalled(a) => {
            let calls = hal.entry_calls(a.not_called);
            (calls == 0, format!("{:?} called {} time(s)", a.not_called, calls))
        }
        ScenarioAssertion::OdrBitsHigh(a) => {
            let port = PortId::from(a.odr_bits_high.port);
            let mask = u32::from(a.odr_bits_high.pins);
            let odr = hal.odr(port);
            (
                odr & mask == mask,
                format!("{} ODR 0x{:04X}, expected bits 0x{:04X} high", port, odr, mask),
            )
        }
        ScenarioAssertion::OdrBitsLow(a) => {
            let port = PortId::from(a.odr_bits_low.port);
            let mask = u32::from(a.odr_bits_low.pins);
            let odr = hal.odr(port);
            (
                odr & mask == 0,
                format!("{} ODR 0x{:04X}, expected bits 0x{:04X} low", port, odr, mask),
            )
        }
    };

    AssertionResult {
        assertion: assertion.clone(),
        passed,
        message,
    }
}

fn compare<T: PartialEq + std::fmt::Debug>(what: &str, expected: T, actual: T) -> (bool, String) {
    (
        expected == actual,
        format!("{}: expected {:?}, got {:?}", what, expected, actual),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(yaml: &str) -> Scenario {
        Scenario::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_happy_path_scenario() {
        let s = scenario(
            r#"
schema_version: "1.0"
name: "happy"
limits:
  iterations: 3
assertions:
  - init_result: ok
  - expected_state: steady_state
  - toggle_count: 3
  - delay_count: 3
  - last_delay_ms: 500
  - called: gpio_init
  - odr_bits_high: { port: d, pins: 0x4000 }
  - odr_bits_low: { port: d, pins: 0x1000 }
"#,
        );
        let mut hal = MockHal::from_scenario(&s);
        let mut seq = Sequencer::new();
        let report = run_scenario(&s, &mut hal, &mut seq, s.limits.iterations);

        assert!(report.passed(), "{:#?}", report.assertions);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.fault, None);
    }

    #[test]
    fn test_uart_failure_scenario() {
        let s = scenario(
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
        let mut hal = MockHal::from_scenario(&s);
        let mut seq = Sequencer::new();
        let report = run_scenario(&s, &mut hal, &mut seq, s.limits.iterations);

        assert!(report.passed(), "{:#?}", report.assertions);
        assert_eq!(report.final_state, StateName::Error);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.fault.map(|f| f.step), Some(InitStep::UartInit));
    }

    #[test]
    fn test_failing_assertion_is_reported() {
        let s = scenario(
            r#"
schema_version: "1.0"
name: "wrong expectation"
statuses:
  platform_init: timeout
assertions:
  - init_result: ok
  - not_called: oscillator_config
"#,
        );
        let mut hal = MockHal::from_scenario(&s);
        let mut seq = Sequencer::new();
        let report = run_scenario(&s, &mut hal, &mut seq, 0);

        assert!(!report.passed());
        assert!(!report.assertions[0].passed);
        assert!(report.assertions[0].message.contains("expected Ok, got Error"));
        assert!(report.assertions[1].passed);
    }

    #[test]
    fn test_odr_on_unbacked_port_reads_zero() {
        let hal = MockHal::new();
        let a = ScenarioAssertion::OdrBitsLow(bringup_config::OdrBitsLowAssertion {
            odr_bits_low: bringup_config::PortBits {
                port: bringup_config::PortName::B,
                pins: 0xFFFF,
            },
        });
        let result = evaluate(&a, &hal, SequencerState::Unconfigured, InitOutcome::Ok);
        assert!(result.passed);
    }
}
