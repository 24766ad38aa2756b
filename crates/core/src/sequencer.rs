// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Ordered board bring-up and the steady-state blink loop.
//!
//! `initialize()` walks platform init, clock tree, GPIO, UART and timer in
//! that order. Only a platform init failure is reported to the caller; any
//! later failure goes through the [`FaultHandler`] and parks the sequencer in
//! [`SequencerState::Error`], which no transition leaves.

use crate::peripherals::gpio::{GpioConfig, PinMask, PinState, PortId, LED_PINS};
use crate::peripherals::rcc::{BusClockConfig, OscillatorConfig, VoltageScale, FLASH_LATENCY};
use crate::peripherals::timer::{MasterConfig, TimerConfig, TimerHandle, TimerInstance};
use crate::peripherals::uart::{UartConfig, UartHandle, UartInstance};
use crate::{Hal, InitResult, InitStep, PeripheralInitError, SequencerObserver};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const LED_PORT: PortId = PortId::D;
pub const BLINK_PORT: PortId = LED_PORT;
pub const BLINK_PIN: PinMask = PinMask::PIN_14;
pub const BLINK_PERIOD_MS: u32 = 500;

/// Port clock domains gated on during GPIO bring-up, in enable order.
pub const GPIO_CLOCK_DOMAINS: [PortId; 4] = [PortId::C, PortId::H, PortId::A, PortId::D];

pub const CONSOLE_UART: UartInstance = UartInstance::Uart4;
pub const TICK_TIMER: TimerInstance = TimerInstance::Tim6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    #[default]
    Unconfigured,
    ClockConfiguring,
    GpioConfiguring,
    UartConfiguring,
    TimerConfiguring,
    SteadyState,
    Error(PeripheralInitError),
}

impl SequencerState {
    pub fn name(&self) -> &'static str {
        match self {
            SequencerState::Unconfigured => "unconfigured",
            SequencerState::ClockConfiguring => "clock_configuring",
            SequencerState::GpioConfiguring => "gpio_configuring",
            SequencerState::UartConfiguring => "uart_configuring",
            SequencerState::TimerConfiguring => "timer_configuring",
            SequencerState::SteadyState => "steady_state",
            SequencerState::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SequencerState::Error(_))
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerState::Error(fault) => write!(f, "error ({})", fault),
            other => f.write_str(other.name()),
        }
    }
}

/// Hook run once when a configuration step fails.
///
/// On hardware the handler masks interrupts and spins; the hosted build
/// returns and the sequencer records the terminal state instead.
pub trait FaultHandler {
    fn on_fault(&mut self, hal: &mut dyn Hal, _fault: PeripheralInitError) {
        hal.disable_interrupts();
    }

    /// Called from [`Sequencer::reset`] to drop per-run state.
    fn reset(&mut self) {}
}

/// Default handler: masks interrupts and remembers every fault it saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatchFault {
    faults: Vec<PeripheralInitError>,
}

impl LatchFault {
    pub fn faults(&self) -> &[PeripheralInitError] {
        &self.faults
    }
}

impl FaultHandler for LatchFault {
    fn on_fault(&mut self, hal: &mut dyn Hal, fault: PeripheralInitError) {
        hal.disable_interrupts();
        self.faults.push(fault);
    }

    fn reset(&mut self) {
        self.faults.clear();
    }
}

#[derive(Debug)]
pub struct Sequencer<F: FaultHandler = LatchFault> {
    state: SequencerState,
    uart: UartHandle,
    timer: TimerHandle,
    iterations: u64,
    fault_handler: F,
    pub observers: Vec<Arc<dyn SequencerObserver>>,
}

impl Sequencer<LatchFault> {
    pub fn new() -> Self {
        Self::with_fault_handler(LatchFault::default())
    }
}

impl Default for Sequencer<LatchFault> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FaultHandler> Sequencer<F> {
    pub fn with_fault_handler(fault_handler: F) -> Self {
        Self {
            state: SequencerState::Unconfigured,
            uart: UartHandle::default(),
            timer: TimerHandle::default(),
            iterations: 0,
            fault_handler,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state.is_error()
    }

    pub fn fault(&self) -> Option<PeripheralInitError> {
        match self.state {
            SequencerState::Error(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn uart(&self) -> &UartHandle {
        &self.uart
    }

    pub fn timer(&self) -> &TimerHandle {
        &self.timer
    }

    /// Steady-state iterations executed so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn fault_handler(&self) -> &F {
        &self.fault_handler
    }

    /// Back to `Unconfigured` with empty handles and a cleared fault
    /// handler. Observers are kept.
    pub fn reset(&mut self) {
        self.state = SequencerState::Unconfigured;
        self.uart = UartHandle::default();
        self.timer = TimerHandle::default();
        self.iterations = 0;
        self.fault_handler.reset();
    }

    /// Run the complete bring-up sequence.
    ///
    /// `Err` means the platform init call failed and nothing else was
    /// attempted. `Ok` does not mean the board is up: check [`Self::state`]
    /// to see whether a later step halted the sequencer.
    pub fn initialize<H: Hal>(&mut self, hal: &mut H) -> InitResult<()> {
        info!("Starting board bring-up");

        if let Err(fault) = hal.platform_init().check(InitStep::PlatformInit) {
            error!("{}", fault);
            self.transition(SequencerState::Error(fault));
            return Err(fault);
        }

        self.configure_system_clock(hal);
        if self.is_halted() {
            return Ok(());
        }

        self.configure_gpio(hal);

        self.configure_uart(hal);
        if self.is_halted() {
            return Ok(());
        }

        self.configure_timer(hal);
        Ok(())
    }

    /// Regulator scaling, HSI-fed PLL to 168 MHz, then the bus dividers and
    /// the SYSCLK switch-over.
    pub fn configure_system_clock<H: Hal>(&mut self, hal: &mut H) {
        self.transition(SequencerState::ClockConfiguring);

        hal.power_config(VoltageScale::Scale1);
        let result = hal
            .oscillator_config(&OscillatorConfig::hsi_pll_168mhz())
            .check(InitStep::OscillatorConfig)
            .and_then(|()| {
                hal.bus_clock_config(&BusClockConfig::pll_168mhz(), FLASH_LATENCY)
                    .check(InitStep::BusClockConfig)
            });

        if let Err(fault) = result {
            self.halt(hal, fault);
        }
    }

    /// Cannot fail.
    pub fn configure_gpio<H: Hal>(&mut self, hal: &mut H) {
        self.transition(SequencerState::GpioConfiguring);

        for port in GPIO_CLOCK_DOMAINS {
            hal.gpio_clock_enable(port);
        }
        hal.gpio_write(LED_PORT, LED_PINS, PinState::Reset);
        hal.gpio_init(LED_PORT, &GpioConfig::led_outputs());
    }

    pub fn configure_uart<H: Hal>(&mut self, hal: &mut H) {
        self.transition(SequencerState::UartConfiguring);

        self.uart
            .bind(CONSOLE_UART, UartConfig::console_115200_8n1());
        if let Err(fault) = hal.uart_init(&mut self.uart).check(InitStep::UartInit) {
            self.halt(hal, fault);
        }
    }

    pub fn configure_timer<H: Hal>(&mut self, hal: &mut H) {
        self.transition(SequencerState::TimerConfiguring);

        self.timer.bind(TICK_TIMER, TimerConfig::free_running());
        let timer = &mut self.timer;
        let result = hal
            .timer_base_init(timer)
            .check(InitStep::TimerBaseInit)
            .and_then(|()| {
                hal.timer_master_config(timer, &MasterConfig::default())
                    .check(InitStep::TimerSyncConfig)
            });

        match result {
            Ok(()) => self.transition(SequencerState::SteadyState),
            Err(fault) => self.halt(hal, fault),
        }
    }

    /// One pass of the main loop body: toggle the blink pin, wait.
    pub fn run_one_step<H: Hal>(&mut self, hal: &mut H) {
        hal.gpio_toggle(BLINK_PORT, BLINK_PIN);
        hal.delay_ms(BLINK_PERIOD_MS);

        self.iterations = self.iterations.saturating_add(1);
        for observer in &self.observers {
            observer.on_iteration(self.iterations);
        }
    }

    /// Bounded stand-in for the endless main loop. A halted sequencer never
    /// reaches the loop, so nothing runs. Returns the iterations executed.
    pub fn run<H: Hal>(&mut self, hal: &mut H, iterations: u64) -> u64 {
        if self.is_halted() {
            warn!("Sequencer halted in {}, not entering main loop", self.state);
            return 0;
        }
        for _ in 0..iterations {
            self.run_one_step(hal);
        }
        debug!("Ran {} main loop iterations", iterations);
        iterations
    }

    fn halt<H: Hal>(&mut self, hal: &mut H, fault: PeripheralInitError) {
        if let Some(first) = self.fault() {
            warn!("Ignoring {} after earlier {}", fault, first);
            return;
        }
        error!("{}, entering error handler", fault);
        self.fault_handler.on_fault(hal, fault);
        self.transition(SequencerState::Error(fault));
    }

    fn transition(&mut self, to: SequencerState) {
        let from = self.state;
        if from.is_error() || from == to {
            return;
        }
        info!("Sequencer {} -> {}", from, to);
        for observer in &self.observers {
            observer.on_transition(from, to);
        }
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHal;
    use crate::HalStatus;

    #[test]
    fn test_initialize_reaches_steady_state() {
        let mut hal = MockHal::new();
        let mut seq = Sequencer::new();
        assert_eq!(seq.initialize(&mut hal), Ok(()));
        assert_eq!(seq.state(), SequencerState::SteadyState);
        assert!(seq.uart().is_bound());
        assert!(seq.timer().is_bound());
        assert!(seq.fault_handler().faults().is_empty());
    }

    #[test]
    fn test_platform_init_failure_skips_fault_handler() {
        let mut hal = MockHal::new();
        hal.set_platform_init_status(HalStatus::Error);
        let mut seq = Sequencer::new();

        let err = seq.initialize(&mut hal).unwrap_err();
        assert_eq!(err.step, InitStep::PlatformInit);
        assert_eq!(seq.fault(), Some(err));
        assert!(seq.fault_handler().faults().is_empty());
        assert!(!hal.control().interrupts_disabled);
    }

    #[test]
    fn test_bus_clock_failure_halts() {
        let mut hal = MockHal::new();
        hal.set_status(InitStep::BusClockConfig, HalStatus::Timeout);
        let mut seq = Sequencer::new();

        assert_eq!(seq.initialize(&mut hal), Ok(()));
        assert_eq!(
            seq.fault(),
            Some(PeripheralInitError {
                step: InitStep::BusClockConfig,
                status: HalStatus::Timeout,
            })
        );
        assert_eq!(seq.fault_handler().faults().len(), 1);
        assert!(hal.control().interrupts_disabled);
        assert!(!hal.control().gpio_init_called());
    }

    #[test]
    fn test_timer_sync_failure_after_base_init() {
        let mut hal = MockHal::new();
        hal.set_status(InitStep::TimerSyncConfig, HalStatus::Busy);
        let mut seq = Sequencer::new();

        seq.initialize(&mut hal).unwrap();
        assert_eq!(hal.control().timer_base_init_calls, 1);
        assert_eq!(hal.control().timer_sync_config_calls, 1);
        assert_eq!(seq.fault().map(|f| f.step), Some(InitStep::TimerSyncConfig));
    }

    #[test]
    fn test_error_is_terminal() {
        let mut hal = MockHal::new();
        hal.set_uart_init_status(HalStatus::Error);
        let mut seq = Sequencer::new();
        seq.initialize(&mut hal).unwrap();
        let first = seq.state();

        // A later step run by hand neither leaves Error nor replaces the fault.
        hal.set_timer_init_status(HalStatus::Error);
        seq.configure_timer(&mut hal);
        seq.configure_gpio(&mut hal);
        assert_eq!(seq.state(), first);
        assert_eq!(seq.fault_handler().faults().len(), 1);
        assert_eq!(hal.control().disable_irq_count, 1);
    }

    #[test]
    fn test_run_skipped_when_halted() {
        let mut hal = MockHal::new();
        hal.set_clock_config_status(HalStatus::Error);
        let mut seq = Sequencer::new();
        seq.initialize(&mut hal).unwrap();

        assert_eq!(seq.run(&mut hal, 5), 0);
        assert_eq!(hal.gpio_toggle_count(), 0);
        assert_eq!(hal.delay_call_count(), 0);
    }

    #[test]
    fn test_run_one_step_blinks_pd14() {
        let mut hal = MockHal::new();
        let mut seq = Sequencer::new();
        seq.run_one_step(&mut hal);

        assert_eq!(hal.last_gpio_port(), Some(PortId::D));
        assert_eq!(hal.last_gpio_pin(), PinMask::PIN_14);
        assert_eq!(hal.last_delay_ms(), 500);
        assert_eq!(seq.iterations(), 1);
    }

    #[derive(Debug, Default)]
    struct CountingHandler {
        calls: u32,
    }

    impl FaultHandler for CountingHandler {
        fn on_fault(&mut self, _hal: &mut dyn Hal, _fault: PeripheralInitError) {
            self.calls += 1;
        }
    }

    #[test]
    fn test_custom_fault_handler_replaces_default() {
        let mut hal = MockHal::new();
        hal.set_uart_init_status(HalStatus::Error);
        let mut seq = Sequencer::with_fault_handler(CountingHandler::default());
        seq.initialize(&mut hal).unwrap();

        assert_eq!(seq.fault_handler().calls, 1);
        assert!(!hal.control().interrupts_disabled);
    }

    #[test]
    fn test_reset_returns_to_unconfigured() {
        let mut hal = MockHal::new();
        let mut seq = Sequencer::new();
        seq.initialize(&mut hal).unwrap();
        seq.run(&mut hal, 2);

        seq.reset();
        assert_eq!(seq.state(), SequencerState::Unconfigured);
        assert_eq!(seq.iterations(), 0);
        assert!(!seq.uart().is_bound());
    }

    #[test]
    fn test_reset_clears_latched_faults() {
        let mut hal = MockHal::new();
        let mut seq = Sequencer::new();
        hal.set_uart_init_status(HalStatus::Error);
        seq.initialize(&mut hal).unwrap();
        assert_eq!(seq.fault_handler().faults().len(), 1);

        hal.reset();
        seq.reset();
        seq.initialize(&mut hal).unwrap();

        assert_eq!(seq.state(), SequencerState::SteadyState);
        assert_eq!(seq.fault(), None);
        assert!(seq.fault_handler().faults().is_empty());
    }
}
