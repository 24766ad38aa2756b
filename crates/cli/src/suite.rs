// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Built-in self-test suite run by `bringup selftest`.

use bringup_core::harness::{Assertions, Runner};
use bringup_core::mock::MockHal;
use bringup_core::peripherals::gpio::{PinMask, PinState, PortId};
use bringup_core::peripherals::rcc::SYSTEM_CORE_CLOCK_HZ;
use bringup_core::peripherals::timer::{AutoReloadPreload, CounterMode, TimerInstance};
use bringup_core::peripherals::uart::{Parity, StopBits, UartInstance, WordLength};
use bringup_core::sequencer::{
    FaultHandler, LatchFault, Sequencer, SequencerState, BLINK_PERIOD_MS,
};
use bringup_core::{test_case, Hal, HalStatus, InitStep, PeripheralInitError};

pub const SUITE_NAME: &str = "bringup_selftest";

/// Test fixture: one mock board and the sequencer driving it.
#[derive(Debug, Default)]
pub struct Board {
    pub hal: MockHal,
    pub seq: Sequencer,
    /// Statuses re-applied after every reset.
    pub forced: Vec<(InitStep, HalStatus)>,
}

fn set_up(board: &mut Board) {
    board.hal.reset();
    board.seq.reset();
    for (step, status) in &board.forced {
        board.hal.set_status(*step, *status);
    }
}

fn tear_down(board: &mut Board) {
    tracing::trace!("tear down in state {}", board.seq.state());
}

fn pin_bits(pins: PinMask) -> u32 {
    u32::from(pins.bits())
}

fn odr(hal: &MockHal, port: PortId) -> u32 {
    hal.port(port).map(|p| p.odr()).unwrap_or(0)
}

// System initialization

fn test_hal_init_success(b: &mut Board, t: &mut Assertions) {
    b.hal.set_platform_init_status(HalStatus::Ok);
    let result = b.hal.platform_init();
    t.equal(HalStatus::Ok, result);
    t.is_true(b.hal.control().platform_init_called());
}

fn test_hal_init_failure(b: &mut Board, t: &mut Assertions) {
    b.hal.set_platform_init_status(HalStatus::Error);
    let result = b.hal.platform_init();
    t.equal(HalStatus::Error, result);
    t.is_true(b.hal.control().platform_init_called());
}

fn test_system_clock_config(b: &mut Board, t: &mut Assertions) {
    b.hal.set_clock_config_status(HalStatus::Ok);
    b.seq.configure_system_clock(&mut b.hal);
    t.is_true(b.hal.control().system_clock_config_called());
}

fn test_main_init_sequence_success(b: &mut Board, t: &mut Assertions) {
    b.hal.set_platform_init_status(HalStatus::Ok);
    b.hal.set_clock_config_status(HalStatus::Ok);
    b.hal.set_uart_init_status(HalStatus::Ok);
    b.hal.set_timer_init_status(HalStatus::Ok);

    let result = b.seq.initialize(&mut b.hal);

    t.equal(Ok(()), result);
    let control = b.hal.control();
    t.is_true(control.platform_init_called());
    t.is_true(control.system_clock_config_called());
    t.is_true(control.gpio_init_called());
    t.is_true(control.uart_init_called());
    t.is_true(control.timer_init_called());
}

fn test_main_init_hal_failure(b: &mut Board, t: &mut Assertions) {
    b.hal.set_platform_init_status(HalStatus::Error);
    let result = b.seq.initialize(&mut b.hal);
    t.is_true(result.is_err());
    t.is_true(b.hal.control().platform_init_called());
}

// GPIO

fn test_gpio_init(b: &mut Board, t: &mut Assertions) {
    b.seq.configure_gpio(&mut b.hal);
    t.is_true(b.hal.control().gpio_init_called());
}

fn test_gpio_toggle_pin(b: &mut Board, t: &mut Assertions) {
    let initial = b.hal.gpio_toggle_count();
    b.hal.gpio_toggle(PortId::D, PinMask::PIN_14);
    t.equal(initial + 1, b.hal.gpio_toggle_count());
    t.equal(Some(PortId::D), b.hal.last_gpio_port());
    t.equal(PinMask::PIN_14, b.hal.last_gpio_pin());
}

fn test_gpio_write_pin_set(b: &mut Board, t: &mut Assertions) {
    b.hal.gpio_write(PortId::D, PinMask::PIN_14, PinState::Set);
    t.bits_high(pin_bits(PinMask::PIN_14), odr(&b.hal, PortId::D));
}

fn test_gpio_write_pin_reset(b: &mut Board, t: &mut Assertions) {
    b.hal.gpio_write(PortId::D, PinMask::PIN_14, PinState::Set);
    b.hal.gpio_write(PortId::D, PinMask::PIN_14, PinState::Reset);
    t.bits_low(pin_bits(PinMask::PIN_14), odr(&b.hal, PortId::D));
}

fn test_gpio_read_pin(b: &mut Board, t: &mut Assertions) {
    b.hal.set_input(PortId::D, PinMask::PIN_14, PinState::Set);
    t.equal(PinState::Set, b.hal.gpio_read(PortId::D, PinMask::PIN_14));

    b.hal.set_input(PortId::D, PinMask::PIN_14, PinState::Reset);
    t.equal(PinState::Reset, b.hal.gpio_read(PortId::D, PinMask::PIN_14));
}

// UART

fn test_uart_init_success(b: &mut Board, t: &mut Assertions) {
    b.hal.set_uart_init_status(HalStatus::Ok);
    b.seq.configure_uart(&mut b.hal);

    t.is_true(b.hal.control().uart_init_called());
    let uart = b.seq.uart();
    t.equal(Some(UartInstance::Uart4), uart.instance);
    match uart.config {
        Some(cfg) => {
            t.equal(115_200, cfg.baud_rate);
            t.equal(WordLength::Bits8, cfg.word_length);
            t.equal(StopBits::One, cfg.stop_bits);
            t.equal(Parity::None, cfg.parity);
        }
        None => t.fail("UART handle has no configuration"),
    }
}

fn test_uart_baud_rate_configuration(b: &mut Board, t: &mut Assertions) {
    b.seq.configure_uart(&mut b.hal);
    t.equal(Some(115_200), b.seq.uart().config.map(|c| c.baud_rate));
}

// Timer

fn test_tim6_init_success(b: &mut Board, t: &mut Assertions) {
    b.hal.set_timer_init_status(HalStatus::Ok);
    b.seq.configure_timer(&mut b.hal);

    t.is_true(b.hal.control().timer_init_called());
    let timer = b.seq.timer();
    t.equal(Some(TimerInstance::Tim6), timer.instance);
    match timer.config {
        Some(cfg) => {
            t.equal(0, cfg.prescaler);
            t.equal(65_535, cfg.period);
            t.equal(CounterMode::Up, cfg.counter_mode);
        }
        None => t.fail("timer handle has no configuration"),
    }
}

fn test_timer_configuration_values(b: &mut Board, t: &mut Assertions) {
    b.seq.configure_timer(&mut b.hal);
    t.equal(
        Some(AutoReloadPreload::Disabled),
        b.seq.timer().config.map(|c| c.auto_reload_preload),
    );
}

// Main loop

fn test_main_loop_single_iteration(b: &mut Board, t: &mut Assertions) {
    let toggles = b.hal.gpio_toggle_count();
    let delays = b.hal.delay_call_count();

    b.seq.run_one_step(&mut b.hal);

    t.equal(toggles + 1, b.hal.gpio_toggle_count());
    t.equal(Some(PortId::D), b.hal.last_gpio_port());
    t.equal(PinMask::PIN_14, b.hal.last_gpio_pin());
    t.equal(delays + 1, b.hal.delay_call_count());
    t.equal(BLINK_PERIOD_MS, b.hal.last_delay_ms());
}

fn test_main_loop_multiple_iterations(b: &mut Board, t: &mut Assertions) {
    const ITERATIONS: u32 = 5;
    let toggles = b.hal.gpio_toggle_count();
    let delays = b.hal.delay_call_count();

    for _ in 0..ITERATIONS {
        b.seq.run_one_step(&mut b.hal);
    }

    t.equal(toggles + ITERATIONS, b.hal.gpio_toggle_count());
    t.equal(delays + ITERATIONS, b.hal.delay_call_count());
}

// Delay

fn test_hal_delay_function(b: &mut Board, t: &mut Assertions) {
    let initial = b.hal.delay_call_count();
    b.hal.delay_ms(1000);
    t.equal(initial + 1, b.hal.delay_call_count());
    t.equal(1000, b.hal.last_delay_ms());
}

fn test_different_delay_values(b: &mut Board, t: &mut Assertions) {
    let values = [1u32, 10, 100, 500, 1000, 5000];
    for ms in values {
        b.hal.delay_ms(ms);
        t.equal(ms, b.hal.last_delay_ms());
    }
    t.equal(values.len(), b.hal.delay_call_count() as usize);
}

// Error handling

fn test_error_handler_function(b: &mut Board, t: &mut Assertions) {
    let mut handler = LatchFault::default();
    let fault = PeripheralInitError {
        step: InitStep::UartInit,
        status: HalStatus::Error,
    };

    // Returns on the host instead of spinning.
    handler.on_fault(&mut b.hal, fault);

    t.is_true(b.hal.control().interrupts_disabled);
    t.equal(&[fault][..], handler.faults());
}

// Integration

fn test_system_integration(b: &mut Board, t: &mut Assertions) {
    b.hal.set_platform_init_status(HalStatus::Ok);
    b.hal.set_clock_config_status(HalStatus::Ok);
    b.hal.set_uart_init_status(HalStatus::Ok);
    b.hal.set_timer_init_status(HalStatus::Ok);

    t.equal(Ok(()), b.seq.initialize(&mut b.hal));

    for _ in 0..3 {
        b.seq.run_one_step(&mut b.hal);
    }

    t.equal(3, b.hal.gpio_toggle_count());
    t.equal(3, b.hal.delay_call_count());
    t.equal(500, b.hal.last_delay_ms());
}

fn test_system_with_peripheral_failures(b: &mut Board, t: &mut Assertions) {
    b.hal.set_uart_init_status(HalStatus::Error);
    b.seq.configure_uart(&mut b.hal);

    b.hal.set_timer_init_status(HalStatus::Error);
    b.seq.configure_timer(&mut b.hal);

    // GPIO keeps working after the fault.
    b.hal.gpio_toggle(PortId::D, PinMask::PIN_14);
    t.equal(1, b.hal.gpio_toggle_count());
    t.equal(Some(InitStep::UartInit), b.seq.fault().map(|f| f.step));
}

// Sequencer contract

fn test_default_statuses_reach_steady_state(b: &mut Board, t: &mut Assertions) {
    t.equal(Ok(()), b.seq.initialize(&mut b.hal));
    t.equal(SequencerState::SteadyState, b.seq.state());
    for step in InitStep::ALL {
        t.equal(1, b.hal.control().calls(step));
    }
}

fn test_platform_init_failure_short_circuits(b: &mut Board, t: &mut Assertions) {
    b.hal.set_platform_init_status(HalStatus::Timeout);
    t.is_true(b.seq.initialize(&mut b.hal).is_err());
    let control = b.hal.control();
    t.is_false(control.system_clock_config_called());
    t.is_false(control.gpio_init_called());
    t.is_false(control.uart_init_called());
    t.is_false(control.timer_init_called());
    t.is_false(control.interrupts_disabled);
}

fn test_later_failures_still_return_ok(_b: &mut Board, t: &mut Assertions) {
    let later = [
        InitStep::OscillatorConfig,
        InitStep::BusClockConfig,
        InitStep::UartInit,
        InitStep::TimerBaseInit,
        InitStep::TimerSyncConfig,
    ];
    for step in later {
        let mut hal = MockHal::new();
        let mut seq = Sequencer::new();
        hal.set_status(step, HalStatus::Error);

        t.equal(Ok(()), seq.initialize(&mut hal));
        t.is_true(seq.is_halted());
        t.is_true(hal.control().interrupts_disabled);
    }
}

fn test_halted_sequencer_skips_main_loop(b: &mut Board, t: &mut Assertions) {
    b.hal.set_uart_init_status(HalStatus::Error);
    let _ = b.seq.initialize(&mut b.hal);
    t.equal(0, b.seq.run(&mut b.hal, 3));
    t.equal(0, b.hal.gpio_toggle_count());
}

fn test_toggle_twice_restores_odr(b: &mut Board, t: &mut Assertions) {
    let before = odr(&b.hal, PortId::D);
    b.hal.gpio_toggle(PortId::D, PinMask::PIN_14);
    b.hal.gpio_toggle(PortId::D, PinMask::PIN_14);
    t.equal(before, odr(&b.hal, PortId::D));
}

fn test_read_ignores_output_register(b: &mut Board, t: &mut Assertions) {
    b.hal.gpio_write(PortId::D, PinMask::PIN_13, PinState::Set);
    t.equal(PinState::Reset, b.hal.gpio_read(PortId::D, PinMask::PIN_13));

    b.hal.set_input(PortId::A, PinMask::PIN_0, PinState::Set);
    t.equal(PinState::Set, b.hal.gpio_read(PortId::A, PinMask::PIN_0));
    t.equal(0, odr(&b.hal, PortId::A));
}

fn test_reset_restores_defaults(b: &mut Board, t: &mut Assertions) {
    b.hal.set_clock_config_status(HalStatus::Busy);
    let _ = b.seq.initialize(&mut b.hal);
    b.hal.delay_ms(7);

    b.hal.reset();

    t.equal(0, b.hal.delay_call_count());
    t.equal(0, b.hal.last_delay_ms());
    t.equal(0, b.hal.gpio_toggle_count());
    t.equal(None, b.hal.last_gpio_port());
    t.is_false(b.hal.control().platform_init_called());
    t.is_false(b.hal.control().interrupts_disabled);
    for step in InitStep::ALL {
        t.equal(HalStatus::Ok, b.hal.status(step));
    }
}

fn test_clock_tree_after_bring_up(b: &mut Board, t: &mut Assertions) {
    let _ = b.seq.initialize(&mut b.hal);
    let mhz = f64::from(b.hal.system_core_clock()) / 1e6;
    t.float_within(0.001, 168.0, mhz);
    t.equal(SYSTEM_CORE_CLOCK_HZ, b.hal.system_core_clock());
    t.equal(Some(0x16C), b.hal.control().uart_brr);
    t.bits(0xF000, 0x0000, odr(&b.hal, PortId::D));
}

pub fn runner(forced: Vec<(InitStep, HalStatus)>) -> Runner<Board> {
    let board = Board {
        forced,
        ..Default::default()
    };
    let mut runner = Runner::new(SUITE_NAME, board)
        .before_each(set_up)
        .after_each(tear_down);

    runner.add(test_case!(test_hal_init_success));
    runner.add(test_case!(test_hal_init_failure));
    runner.add(test_case!(test_system_clock_config));
    runner.add(test_case!(test_main_init_sequence_success));
    runner.add(test_case!(test_main_init_hal_failure));

    runner.add(test_case!(test_gpio_init));
    runner.add(test_case!(test_gpio_toggle_pin));
    runner.add(test_case!(test_gpio_write_pin_set));
    runner.add(test_case!(test_gpio_write_pin_reset));
    runner.add(test_case!(test_gpio_read_pin));

    runner.add(test_case!(test_uart_init_success));
    runner.add(test_case!(test_uart_baud_rate_configuration));

    runner.add(test_case!(test_tim6_init_success));
    runner.add(test_case!(test_timer_configuration_values));

    runner.add(test_case!(test_main_loop_single_iteration));
    runner.add(test_case!(test_main_loop_multiple_iterations));

    runner.add(test_case!(test_hal_delay_function));
    runner.add(test_case!(test_different_delay_values));

    runner.add(test_case!(test_error_handler_function));

    runner.add(test_case!(test_system_integration));
    runner.add(test_case!(test_system_with_peripheral_failures));

    runner.add(test_case!(test_default_statuses_reach_steady_state));
    runner.add(test_case!(test_platform_init_failure_short_circuits));
    runner.add(test_case!(test_later_failures_still_return_ok));
    runner.add(test_case!(test_halted_sequencer_skips_main_loop));
    runner.add(test_case!(test_toggle_twice_restores_odr));
    runner.add(test_case!(test_read_ignores_output_register));
    runner.add(test_case!(test_reset_restores_defaults));
    runner.add(test_case!(test_clock_tree_after_bring_up));

    runner
}
