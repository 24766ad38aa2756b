// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";

/// Upper bound on steady-state iterations a scenario may request.
pub const MAX_ITERATIONS: u64 = 1_000_000;

/// Status a mocked entry point is forced to return.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ok,
    Error,
    Busy,
    Timeout,
}

/// Mocked HAL entry points a scenario can refer to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Entry {
    PlatformInit,
    OscillatorConfig,
    BusClockConfig,
    GpioInit,
    UartInit,
    TimerBaseInit,
    TimerSyncConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateName {
    Unconfigured,
    ClockConfiguring,
    GpioConfiguring,
    UartConfiguring,
    TimerConfiguring,
    SteadyState,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitOutcome {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PortName {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
}

/// Forced return statuses. Entries left out keep the mock default (`ok`).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StatusOverrides {
    #[serde(default)]
    pub platform_init: Option<Status>,
    #[serde(default)]
    pub oscillator_config: Option<Status>,
    #[serde(default)]
    pub bus_clock_config: Option<Status>,
    #[serde(default)]
    pub uart_init: Option<Status>,
    #[serde(default)]
    pub timer_base_init: Option<Status>,
    #[serde(default)]
    pub timer_sync_config: Option<Status>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioLimits {
    #[serde(default)]
    pub iterations: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PortBits {
    pub port: PortName,
    pub pins: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InitResultAssertion {
    pub init_result: InitOutcome,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExpectedStateAssertion {
    pub expected_state: StateName,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToggleCountAssertion {
    pub toggle_count: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DelayCountAssertion {
    pub delay_count: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LastDelayAssertion {
    pub last_delay_ms: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CalledAssertion {
    pub called: Entry,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NotCalledAssertion {
    pub not_called: Entry,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OdrBitsHighAssertion {
    pub odr_bits_high: PortBits,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OdrBitsLowAssertion {
    pub odr_bits_low: PortBits,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    InitResult(InitResultAssertion),
    ExpectedState(ExpectedStateAssertion),
    ToggleCount(ToggleCountAssertion),
    DelayCount(DelayCountAssertion),
    LastDelay(LastDelayAssertion),
    Called(CalledAssertion),
    NotCalled(NotCalledAssertion),
    OdrBitsHigh(OdrBitsHighAssertion),
    OdrBitsLow(OdrBitsLowAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub schema_version: String,
    pub name: String,
    #[serde(default)]
    pub statuses: StatusOverrides,
    #[serde(default)]
    pub limits: ScenarioLimits,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario at {:?}", path.as_ref()))?;
        let scenario: Self =
            serde_yaml::from_reader(f).context("Failed to parse Scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(yaml).context("Failed to parse Scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        if self.name.trim().is_empty() {
            anyhow::bail!("Scenario 'name' cannot be empty");
        }

        if self.limits.iterations > MAX_ITERATIONS {
            anyhow::bail!(
                "Limit 'iterations' {} exceeds maximum of {}",
                self.limits.iterations,
                MAX_ITERATIONS
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_scenario() {
        let yaml = r#"
schema_version: "1.0"
name: "uart failure"
statuses:
  uart_init: error
limits:
  iterations: 3
assertions:
  - init_result: ok
  - expected_state: error
  - toggle_count: 3
  - called: uart_init
  - not_called: timer_base_init
  - odr_bits_high: { port: d, pins: 16384 }
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.name, "uart failure");
        assert_eq!(scenario.statuses.uart_init, Some(Status::Error));
        assert_eq!(scenario.statuses.platform_init, None);
        assert_eq!(scenario.limits.iterations, 3);
        assert_eq!(scenario.assertions.len(), 6);
        assert_eq!(
            scenario.assertions[1],
            ScenarioAssertion::ExpectedState(ExpectedStateAssertion {
                expected_state: StateName::Error
            })
        );
        assert_eq!(
            scenario.assertions[5],
            ScenarioAssertion::OdrBitsHigh(OdrBitsHighAssertion {
                odr_bits_high: PortBits {
                    port: PortName::D,
                    pins: 0x4000
                }
            })
        );
    }

    #[test]
    fn test_defaults_when_sections_omitted() {
        let yaml = r#"
schema_version: "1.0"
name: "bare"
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.statuses, StatusOverrides::default());
        assert_eq!(scenario.limits.iterations, 0);
        assert!(scenario.assertions.is_empty());
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
name: "x"
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_empty_name() {
        let yaml = r#"
schema_version: "1.0"
name: "  "
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_iterations_limit() {
        let yaml = r#"
schema_version: "1.0"
name: "long"
limits:
  iterations: 1000001
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("iterations"));
    }

    #[test]
    fn test_unknown_status_key_rejected() {
        let yaml = r#"
schema_version: "1.0"
name: "typo"
statuses:
  uart_inti: error
"#;
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::from_file("definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to open scenario"));
    }
}
