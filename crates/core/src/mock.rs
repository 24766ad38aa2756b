// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Deterministic stand-in for the vendor HAL.
//!
//! Every entry point only does bookkeeping in [`MockControl`] plus the port
//! register updates needed for read-back to stay consistent. Failures are
//! never produced on their own; a test injects them through [`MockHal::set_status`].

use crate::peripherals::gpio::{GpioConfig, GpioPort, PinMask, PinState, PortId};
use crate::peripherals::rcc::{
    BusClockConfig, ClockTree, FlashLatency, OscillatorConfig, SysclkSource, VoltageScale,
    HSE_HZ, HSI_HZ,
};
use crate::peripherals::timer::{MasterConfig, TimerHandle};
use crate::peripherals::uart::UartHandle;
use crate::{Hal, HalStatus, InitStep};
use bitflags::bitflags;
use serde::Serialize;
use tracing::{debug, trace};

/// Ports with backing register storage. Anything else behaves like a null port.
pub const BACKED_PORTS: [PortId; 4] = [PortId::A, PortId::C, PortId::D, PortId::H];

bitflags! {
    /// Set of GPIO port clock domains.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    #[serde(transparent)]
    pub struct PortSet: u16 {
        const A = 1 << 0;
        const B = 1 << 1;
        const C = 1 << 2;
        const D = 1 << 3;
        const E = 1 << 4;
        const F = 1 << 5;
        const G = 1 << 6;
        const H = 1 << 7;
        const I = 1 << 8;
    }
}

impl From<PortId> for PortSet {
    fn from(port: PortId) -> Self {
        PortSet::from_bits_retain(1 << port.index())
    }
}

/// Forced return status for each fallible entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusTable {
    pub platform_init: HalStatus,
    pub oscillator_config: HalStatus,
    pub bus_clock_config: HalStatus,
    pub uart_init: HalStatus,
    pub timer_base_init: HalStatus,
    pub timer_sync_config: HalStatus,
}

impl StatusTable {
    pub fn get(&self, step: InitStep) -> HalStatus {
        match step {
            InitStep::PlatformInit => self.platform_init,
            InitStep::OscillatorConfig => self.oscillator_config,
            InitStep::BusClockConfig => self.bus_clock_config,
            InitStep::UartInit => self.uart_init,
            InitStep::TimerBaseInit => self.timer_base_init,
            InitStep::TimerSyncConfig => self.timer_sync_config,
        }
    }

    pub fn set(&mut self, step: InitStep, status: HalStatus) {
        let slot = match step {
            InitStep::PlatformInit => &mut self.platform_init,
            InitStep::OscillatorConfig => &mut self.oscillator_config,
            InitStep::BusClockConfig => &mut self.bus_clock_config,
            InitStep::UartInit => &mut self.uart_init,
            InitStep::TimerBaseInit => &mut self.timer_base_init,
            InitStep::TimerSyncConfig => &mut self.timer_sync_config,
        };
        *slot = status;
    }
}

/// Observability record of every mocked call.
///
/// Counters saturate instead of wrapping so they never decrease between resets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MockControl {
    pub platform_init_calls: u32,
    pub oscillator_config_calls: u32,
    pub bus_clock_config_calls: u32,
    pub gpio_init_calls: u32,
    pub uart_init_calls: u32,
    pub timer_base_init_calls: u32,
    pub timer_sync_config_calls: u32,

    pub delay_call_count: u32,
    pub last_delay_ms: u32,
    pub gpio_toggle_count: u32,
    pub last_gpio_port: Option<PortId>,
    pub last_gpio_pin: PinMask,

    pub gpio_clocks_enabled: PortSet,
    pub voltage_scale: Option<VoltageScale>,
    pub last_oscillator_config: Option<OscillatorConfig>,
    pub last_bus_clock_config: Option<BusClockConfig>,
    pub flash_latency: Option<FlashLatency>,
    pub clocks: ClockTree,
    pub last_gpio_init: Option<(PortId, GpioConfig)>,
    pub last_uart: Option<UartHandle>,
    pub uart_brr: Option<u32>,
    pub last_timer: Option<TimerHandle>,
    pub timer_update_hz: Option<u32>,
    pub last_master_config: Option<MasterConfig>,

    pub interrupts_disabled: bool,
    pub disable_irq_count: u32,

    pub statuses: StatusTable,
}

impl MockControl {
    pub fn calls(&self, step: InitStep) -> u32 {
        match step {
            InitStep::PlatformInit => self.platform_init_calls,
            InitStep::OscillatorConfig => self.oscillator_config_calls,
            InitStep::BusClockConfig => self.bus_clock_config_calls,
            InitStep::UartInit => self.uart_init_calls,
            InitStep::TimerBaseInit => self.timer_base_init_calls,
            InitStep::TimerSyncConfig => self.timer_sync_config_calls,
        }
    }

    pub fn platform_init_called(&self) -> bool {
        self.platform_init_calls > 0
    }

    /// Set once the bus clock switch-over was attempted, i.e. the clock tree
    /// configuration ran to its last call.
    pub fn system_clock_config_called(&self) -> bool {
        self.bus_clock_config_calls > 0
    }

    pub fn gpio_init_called(&self) -> bool {
        self.gpio_init_calls > 0
    }

    pub fn uart_init_called(&self) -> bool {
        self.uart_init_calls > 0
    }

    pub fn timer_init_called(&self) -> bool {
        self.timer_base_init_calls > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockHal {
    ports: [GpioPort; BACKED_PORTS.len()],
    control: MockControl,
}

fn bump(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}

impl MockHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the observability record and every port, restore `Ok` statuses.
    pub fn reset(&mut self) {
        debug!("Mock HAL reset");
        self.control = MockControl::default();
        for port in &mut self.ports {
            port.reset();
        }
    }

    pub fn control(&self) -> &MockControl {
        &self.control
    }

    pub fn status(&self, step: InitStep) -> HalStatus {
        self.control.statuses.get(step)
    }

    pub fn set_status(&mut self, step: InitStep, status: HalStatus) {
        debug!("Mock HAL: {} will return {}", step, status);
        self.control.statuses.set(step, status);
    }

    pub fn set_platform_init_status(&mut self, status: HalStatus) {
        self.set_status(InitStep::PlatformInit, status);
    }

    /// Oscillator and bus clock configuration together.
    pub fn set_clock_config_status(&mut self, status: HalStatus) {
        self.set_status(InitStep::OscillatorConfig, status);
        self.set_status(InitStep::BusClockConfig, status);
    }

    pub fn set_uart_init_status(&mut self, status: HalStatus) {
        self.set_status(InitStep::UartInit, status);
    }

    /// Timer base init and master synchronisation together.
    pub fn set_timer_init_status(&mut self, status: HalStatus) {
        self.set_status(InitStep::TimerBaseInit, status);
        self.set_status(InitStep::TimerSyncConfig, status);
    }

    pub fn delay_call_count(&self) -> u32 {
        self.control.delay_call_count
    }

    pub fn last_delay_ms(&self) -> u32 {
        self.control.last_delay_ms
    }

    pub fn gpio_toggle_count(&self) -> u32 {
        self.control.gpio_toggle_count
    }

    pub fn last_gpio_port(&self) -> Option<PortId> {
        self.control.last_gpio_port
    }

    pub fn last_gpio_pin(&self) -> PinMask {
        self.control.last_gpio_pin
    }

    pub fn system_core_clock(&self) -> u32 {
        self.control.clocks.hclk_hz
    }

    fn slot(port: PortId) -> Option<usize> {
        BACKED_PORTS.iter().position(|p| *p == port)
    }

    pub fn port(&self, port: PortId) -> Option<&GpioPort> {
        Self::slot(port).and_then(|i| self.ports.get(i))
    }

    pub fn port_mut(&mut self, port: PortId) -> Option<&mut GpioPort> {
        Self::slot(port).and_then(|i| self.ports.get_mut(i))
    }

    pub fn backed_ports(&self) -> impl Iterator<Item = (PortId, &GpioPort)> {
        BACKED_PORTS.iter().copied().zip(self.ports.iter())
    }

    /// Drive the input register as an external circuit would.
    pub fn set_input(&mut self, port: PortId, pins: PinMask, state: PinState) {
        if let Some(p) = self.port_mut(port) {
            p.set_input(pins, state);
        }
    }

    fn sysclk_for(&self, source: SysclkSource) -> u32 {
        match source {
            SysclkSource::Hsi => HSI_HZ,
            SysclkSource::Hse => HSE_HZ,
            SysclkSource::PllClk => self
                .control
                .last_oscillator_config
                .and_then(|osc| osc.pll.output_hz())
                .unwrap_or(HSI_HZ),
        }
    }
}

impl Hal for MockHal {
    fn platform_init(&mut self) -> HalStatus {
        bump(&mut self.control.platform_init_calls);
        let status = self.status(InitStep::PlatformInit);
        trace!("HAL_Init -> {}", status);
        status
    }

    fn power_config(&mut self, scale: VoltageScale) {
        trace!("PWR voltage scaling {:?}", scale);
        self.control.voltage_scale = Some(scale);
    }

    fn oscillator_config(&mut self, config: &OscillatorConfig) -> HalStatus {
        bump(&mut self.control.oscillator_config_calls);
        let status = self.status(InitStep::OscillatorConfig);
        if status.is_ok() {
            self.control.last_oscillator_config = Some(*config);
        }
        trace!("HAL_RCC_OscConfig -> {}", status);
        status
    }

    fn bus_clock_config(&mut self, config: &BusClockConfig, latency: FlashLatency) -> HalStatus {
        bump(&mut self.control.bus_clock_config_calls);
        let status = self.status(InitStep::BusClockConfig);
        if status.is_ok() {
            let sysclk = self.sysclk_for(config.sysclk_source);
            self.control.clocks = config.clock_tree(sysclk);
            self.control.last_bus_clock_config = Some(*config);
            self.control.flash_latency = Some(latency);
            debug!("System clock now {} Hz", self.control.clocks.hclk_hz);
        }
        trace!("HAL_RCC_ClockConfig -> {}", status);
        status
    }

    fn gpio_clock_enable(&mut self, port: PortId) {
        trace!("{} clock enable", port);
        self.control.gpio_clocks_enabled |= PortSet::from(port);
    }

    fn gpio_init(&mut self, port: PortId, config: &GpioConfig) {
        bump(&mut self.control.gpio_init_calls);
        trace!("HAL_GPIO_Init {} pins {:#06x}", port, config.pins.bits());
        self.control.last_gpio_init = Some((port, *config));
    }

    fn gpio_write(&mut self, port: PortId, pins: PinMask, state: PinState) {
        trace!("HAL_GPIO_WritePin {} {:#06x} {:?}", port, pins.bits(), state);
        if let Some(p) = self.port_mut(port) {
            p.write_pins(pins, state);
        }
    }

    fn gpio_toggle(&mut self, port: PortId, pins: PinMask) {
        bump(&mut self.control.gpio_toggle_count);
        self.control.last_gpio_port = Some(port);
        self.control.last_gpio_pin = pins;
        trace!("HAL_GPIO_TogglePin {} {:#06x}", port, pins.bits());
        if let Some(p) = self.port_mut(port) {
            p.toggle_pins(pins);
        }
    }

    fn gpio_read(&self, port: PortId, pins: PinMask) -> PinState {
        self.port(port)
            .map(|p| p.read_pins(pins))
            .unwrap_or(PinState::Reset)
    }

    fn uart_init(&mut self, handle: &mut UartHandle) -> HalStatus {
        bump(&mut self.control.uart_init_calls);
        self.control.last_uart = Some(*handle);
        let status = self.status(InitStep::UartInit);
        if status.is_ok() {
            if let (Some(instance), Some(config)) = (handle.instance, handle.config) {
                let pclk = self.control.clocks.pclk_hz(instance.bus());
                self.control.uart_brr = config.brr(pclk);
            }
        }
        trace!("HAL_UART_Init -> {}", status);
        status
    }

    fn timer_base_init(&mut self, handle: &mut TimerHandle) -> HalStatus {
        bump(&mut self.control.timer_base_init_calls);
        self.control.last_timer = Some(*handle);
        let status = self.status(InitStep::TimerBaseInit);
        if status.is_ok() {
            if let (Some(instance), Some(config)) = (handle.instance, handle.config) {
                let clk = self.control.clocks.timer_clock_hz(instance.bus());
                self.control.timer_update_hz = Some(config.update_rate_hz(clk));
            }
        }
        trace!("HAL_TIM_Base_Init -> {}", status);
        status
    }

    fn timer_master_config(
        &mut self,
        _handle: &mut TimerHandle,
        config: &MasterConfig,
    ) -> HalStatus {
        bump(&mut self.control.timer_sync_config_calls);
        self.control.last_master_config = Some(*config);
        let status = self.status(InitStep::TimerSyncConfig);
        trace!("HAL_TIMEx_MasterConfigSynchronization -> {}", status);
        status
    }

    fn delay_ms(&mut self, ms: u32) {
        bump(&mut self.control.delay_call_count);
        self.control.last_delay_ms = ms;
        trace!("HAL_Delay({})", ms);
    }

    fn disable_interrupts(&mut self) {
        debug!("Interrupts disabled");
        self.control.interrupts_disabled = true;
        bump(&mut self.control.disable_irq_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::rcc::SYSTEM_CORE_CLOCK_HZ;
    use crate::peripherals::timer::{TimerConfig, TimerInstance};
    use crate::peripherals::uart::{UartConfig, UartInstance};

    #[test]
    fn test_defaults_are_ok_and_zero() {
        let hal = MockHal::new();
        for step in InitStep::ALL {
            assert_eq!(hal.status(step), HalStatus::Ok);
            assert_eq!(hal.control().calls(step), 0);
        }
        assert_eq!(hal.delay_call_count(), 0);
        assert_eq!(hal.gpio_toggle_count(), 0);
        assert_eq!(hal.last_gpio_port(), None);
        assert_eq!(hal.last_gpio_pin(), PinMask::empty());
        assert!(!hal.control().interrupts_disabled);
    }

    #[test]
    fn test_forced_status_is_returned_and_call_recorded() {
        let mut hal = MockHal::new();
        hal.set_platform_init_status(HalStatus::Timeout);
        assert_eq!(hal.platform_init(), HalStatus::Timeout);
        assert_eq!(hal.platform_init(), HalStatus::Timeout);
        assert!(hal.control().platform_init_called());
        assert_eq!(hal.control().platform_init_calls, 2);
    }

    #[test]
    fn test_grouped_status_setters() {
        let mut hal = MockHal::new();
        hal.set_clock_config_status(HalStatus::Error);
        hal.set_timer_init_status(HalStatus::Busy);
        assert_eq!(hal.status(InitStep::OscillatorConfig), HalStatus::Error);
        assert_eq!(hal.status(InitStep::BusClockConfig), HalStatus::Error);
        assert_eq!(hal.status(InitStep::TimerBaseInit), HalStatus::Busy);
        assert_eq!(hal.status(InitStep::TimerSyncConfig), HalStatus::Busy);
        assert_eq!(hal.status(InitStep::UartInit), HalStatus::Ok);
    }

    #[test]
    fn test_unbacked_port_is_inert() {
        let mut hal = MockHal::new();
        hal.gpio_write(PortId::B, PinMask::PIN_0, PinState::Set);
        hal.set_input(PortId::B, PinMask::PIN_0, PinState::Set);
        assert!(hal.port(PortId::B).is_none());
        assert_eq!(hal.gpio_read(PortId::B, PinMask::PIN_0), PinState::Reset);

        // Toggles on a port without storage are still counted.
        hal.gpio_toggle(PortId::B, PinMask::PIN_0);
        assert_eq!(hal.gpio_toggle_count(), 1);
        assert_eq!(hal.last_gpio_port(), Some(PortId::B));
    }

    #[test]
    fn test_clock_tree_follows_successful_config() {
        let mut hal = MockHal::new();
        assert_eq!(hal.system_core_clock(), HSI_HZ);

        hal.oscillator_config(&OscillatorConfig::hsi_pll_168mhz());
        hal.bus_clock_config(&BusClockConfig::pll_168mhz(), FlashLatency::Ws5);
        assert_eq!(hal.system_core_clock(), SYSTEM_CORE_CLOCK_HZ);
        assert_eq!(hal.control().flash_latency, Some(FlashLatency::Ws5));
    }

    #[test]
    fn test_failed_bus_config_keeps_reset_clocks() {
        let mut hal = MockHal::new();
        hal.set_status(InitStep::BusClockConfig, HalStatus::Error);
        hal.oscillator_config(&OscillatorConfig::hsi_pll_168mhz());
        assert_eq!(
            hal.bus_clock_config(&BusClockConfig::pll_168mhz(), FlashLatency::Ws5),
            HalStatus::Error
        );
        assert_eq!(hal.system_core_clock(), HSI_HZ);
        assert!(hal.control().system_clock_config_called());
    }

    #[test]
    fn test_uart_and_timer_derive_rates_from_clock_tree() {
        let mut hal = MockHal::new();
        hal.oscillator_config(&OscillatorConfig::hsi_pll_168mhz());
        hal.bus_clock_config(&BusClockConfig::pll_168mhz(), FlashLatency::Ws5);

        let mut uart = UartHandle::default();
        uart.bind(UartInstance::Uart4, UartConfig::console_115200_8n1());
        assert_eq!(hal.uart_init(&mut uart), HalStatus::Ok);
        assert_eq!(hal.control().uart_brr, Some(0x16C));

        let mut tim = TimerHandle::default();
        tim.bind(TimerInstance::Tim6, TimerConfig::free_running());
        assert_eq!(hal.timer_base_init(&mut tim), HalStatus::Ok);
        assert_eq!(hal.control().timer_update_hz, Some(1281));
    }

    #[test]
    fn test_clock_enable_accumulates() {
        let mut hal = MockHal::new();
        hal.gpio_clock_enable(PortId::C);
        hal.gpio_clock_enable(PortId::H);
        hal.gpio_clock_enable(PortId::C);
        assert_eq!(
            hal.control().gpio_clocks_enabled,
            PortSet::C | PortSet::H
        );
    }

    #[test]
    fn test_reset_restores_everything() {
        let mut hal = MockHal::new();
        hal.set_uart_init_status(HalStatus::Error);
        hal.gpio_write(PortId::D, PinMask::PIN_12, PinState::Set);
        hal.set_input(PortId::A, PinMask::PIN_0, PinState::Set);
        hal.delay_ms(10);
        hal.disable_interrupts();

        hal.reset();

        assert_eq!(hal.control(), &MockControl::default());
        for (_, port) in hal.backed_ports() {
            assert_eq!(port, &GpioPort::default());
        }
    }
}
