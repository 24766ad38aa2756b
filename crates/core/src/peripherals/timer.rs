// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::rcc::ApbBus;
use serde::Serialize;

/// Basic timers (no capture/compare channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerInstance {
    Tim6,
    Tim7,
}

impl TimerInstance {
    pub fn base_address(self) -> u32 {
        match self {
            TimerInstance::Tim6 => 0x4000_1000,
            TimerInstance::Tim7 => 0x4000_1400,
        }
    }

    pub fn bus(self) -> ApbBus {
        ApbBus::Apb1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterMode {
    #[default]
    Up,
    Down,
    CenterAligned1,
    CenterAligned2,
    CenterAligned3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockDivision {
    #[default]
    Div1,
    Div2,
    Div4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoReloadPreload {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimerConfig {
    pub prescaler: u32,
    pub counter_mode: CounterMode,
    pub period: u32,
    pub clock_division: ClockDivision,
    pub repetition_counter: u32,
    pub auto_reload_preload: AutoReloadPreload,
}

impl TimerConfig {
    /// Prescaler 0, counting up through the full 16-bit range, no ARR preload.
    pub fn free_running() -> Self {
        Self {
            prescaler: 0,
            counter_mode: CounterMode::Up,
            period: 65_535,
            auto_reload_preload: AutoReloadPreload::Disabled,
            ..Default::default()
        }
    }

    /// Update events per second for the given timer kernel clock.
    pub fn update_rate_hz(&self, timer_clock_hz: u32) -> u32 {
        let ticks = (u64::from(self.prescaler) + 1) * (u64::from(self.period) + 1);
        u32::try_from(u64::from(timer_clock_hz) / ticks).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutput {
    #[default]
    Reset,
    Enable,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterSlaveMode {
    #[default]
    Disabled,
    Enabled,
}

/// Master mode synchronisation (TRGO selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MasterConfig {
    pub trigger_output: TriggerOutput,
    pub master_slave_mode: MasterSlaveMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimerHandle {
    pub instance: Option<TimerInstance>,
    pub config: Option<TimerConfig>,
}

impl TimerHandle {
    pub fn bind(&mut self, instance: TimerInstance, config: TimerConfig) {
        self.instance = Some(instance);
        self.config = Some(config);
    }

    pub fn is_bound(&self) -> bool {
        self.instance.is_some() && self.config.is_some()
    }
}
