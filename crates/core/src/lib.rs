// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod harness;
pub mod metrics;
pub mod mock;
pub mod peripherals;
pub mod scenario;
pub mod sequencer;
pub mod snapshot;

use peripherals::gpio::{GpioConfig, PinMask, PinState, PortId};
use peripherals::rcc::{BusClockConfig, FlashLatency, OscillatorConfig, VoltageScale};
use peripherals::timer::{MasterConfig, TimerHandle};
use peripherals::uart::UartHandle;
use sequencer::SequencerState;
use serde::Serialize;
use std::fmt;


/// Status code returned by every fallible HAL entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HalStatus {
    #[default]
    Ok = 0x00,
    Error = 0x01,
    Busy = 0x02,
    Timeout = 0x03,
}

impl HalStatus {
    pub fn is_ok(self) -> bool {
        self == HalStatus::Ok
    }

    /// Map a status returned by `step` into a result.
    pub fn check(self, step: InitStep) -> InitResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(PeripheralInitError { step, status: self })
        }
    }
}

impl fmt::Display for HalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HalStatus::Ok => "HAL_OK",
            HalStatus::Error => "HAL_ERROR",
            HalStatus::Busy => "HAL_BUSY",
            HalStatus::Timeout => "HAL_TIMEOUT",
        };
        f.write_str(s)
    }
}

impl From<bringup_config::Status> for HalStatus {
    fn from(status: bringup_config::Status) -> Self {
        match status {
            bringup_config::Status::Ok => HalStatus::Ok,
            bringup_config::Status::Error => HalStatus::Error,
            bringup_config::Status::Busy => HalStatus::Busy,
            bringup_config::Status::Timeout => HalStatus::Timeout,
        }
    }
}

/// The status-returning HAL entry points the bring-up sequence depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStep {
    PlatformInit,
    OscillatorConfig,
    BusClockConfig,
    UartInit,
    TimerBaseInit,
    TimerSyncConfig,
}

impl InitStep {
    pub const ALL: [InitStep; 6] = [
        InitStep::PlatformInit,
        InitStep::OscillatorConfig,
        InitStep::BusClockConfig,
        InitStep::UartInit,
        InitStep::TimerBaseInit,
        InitStep::TimerSyncConfig,
    ];
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InitStep::PlatformInit => "platform init",
            InitStep::OscillatorConfig => "oscillator config",
            InitStep::BusClockConfig => "bus clock config",
            InitStep::UartInit => "UART init",
            InitStep::TimerBaseInit => "timer base init",
            InitStep::TimerSyncConfig => "timer master sync config",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{step} failed with {status}")]
pub struct PeripheralInitError {
    pub step: InitStep,
    pub status: HalStatus,
}

pub type InitResult<T> = Result<T, PeripheralInitError>;

/// Trait for observing the bring-up sequence without touching the HAL.
pub trait SequencerObserver: std::fmt::Debug + Send + Sync {
    fn on_transition(&self, _from: SequencerState, _to: SequencerState) {}
    fn on_iteration(&self, _iteration: u64) {}
}

/// The peripheral call surface the bring-up sequence is written against.
///
/// A mock implementation lives in [`mock::MockHal`]; a target build plugs a
/// register-level implementation in behind the same trait. The trait is object
/// safe so fault handlers can take `&mut dyn Hal`.
pub trait Hal {
    /// Reset peripherals, set up the flash interface and the system tick.
    fn platform_init(&mut self) -> HalStatus;

    /// Enable the power controller clock and select the regulator scale.
    fn power_config(&mut self, _scale: VoltageScale) {}

    fn oscillator_config(&mut self, config: &OscillatorConfig) -> HalStatus;

    fn bus_clock_config(&mut self, config: &BusClockConfig, latency: FlashLatency) -> HalStatus;

    /// Gate the clock of a GPIO port on. Idempotent.
    fn gpio_clock_enable(&mut self, port: PortId);

    fn gpio_init(&mut self, port: PortId, config: &GpioConfig);

    fn gpio_write(&mut self, port: PortId, pins: PinMask, state: PinState);

    fn gpio_toggle(&mut self, port: PortId, pins: PinMask);

    fn gpio_read(&self, port: PortId, pins: PinMask) -> PinState;

    fn uart_init(&mut self, handle: &mut UartHandle) -> HalStatus;

    fn timer_base_init(&mut self, handle: &mut TimerHandle) -> HalStatus;

    fn timer_master_config(&mut self, handle: &mut TimerHandle, config: &MasterConfig)
        -> HalStatus;

    fn delay_ms(&mut self, ms: u32);

    fn disable_interrupts(&mut self) {}
}
