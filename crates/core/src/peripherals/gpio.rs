// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

/// GPIO ports of an STM32F407.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PortId {
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

impl PortId {
    const AHB1_GPIO_BASE: u32 = 0x4002_0000;
    const PORT_STRIDE: u32 = 0x400;

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn base_address(self) -> u32 {
        Self::AHB1_GPIO_BASE + u32::from(self.index()) * Self::PORT_STRIDE
    }

    pub fn letter(self) -> char {
        char::from(b'A' + self.index())
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.letter())
    }
}

impl From<bringup_config::PortName> for PortId {
    fn from(name: bringup_config::PortName) -> Self {
        use bringup_config::PortName;
        match name {
            PortName::A => PortId::A,
            PortName::B => PortId::B,
            PortName::C => PortId::C,
            PortName::D => PortId::D,
            PortName::E => PortId::E,
            PortName::F => PortId::F,
            PortName::G => PortId::G,
            PortName::H => PortId::H,
            PortName::I => PortId::I,
        }
    }
}

bitflags! {
    /// Pin selection within one port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    #[serde(transparent)]
    pub struct PinMask: u16 {
        const PIN_0 = 1 << 0;
        const PIN_1 = 1 << 1;
        const PIN_2 = 1 << 2;
        const PIN_3 = 1 << 3;
        const PIN_4 = 1 << 4;
        const PIN_5 = 1 << 5;
        const PIN_6 = 1 << 6;
        const PIN_7 = 1 << 7;
        const PIN_8 = 1 << 8;
        const PIN_9 = 1 << 9;
        const PIN_10 = 1 << 10;
        const PIN_11 = 1 << 11;
        const PIN_12 = 1 << 12;
        const PIN_13 = 1 << 13;
        const PIN_14 = 1 << 14;
        const PIN_15 = 1 << 15;
    }
}

/// PD12..PD15: the four user LEDs of the discovery board.
pub const LED_PINS: PinMask = PinMask::PIN_12
    .union(PinMask::PIN_13)
    .union(PinMask::PIN_14)
    .union(PinMask::PIN_15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinState {
    #[default]
    Reset,
    Set,
}

impl From<bool> for PinState {
    fn from(high: bool) -> Self {
        if high {
            PinState::Set
        } else {
            PinState::Reset
        }
    }
}

impl From<PinState> for bool {
    fn from(state: PinState) -> Self {
        state == PinState::Set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GpioMode {
    #[default]
    Input,
    OutputPushPull,
    OutputOpenDrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GpioPull {
    #[default]
    None,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GpioSpeed {
    /// 2 MHz
    #[default]
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GpioConfig {
    pub pins: PinMask,
    pub mode: GpioMode,
    pub pull: GpioPull,
    pub speed: GpioSpeed,
}

impl GpioConfig {
    /// Push-pull outputs for the LED pins, no pull resistor, low speed.
    pub fn led_outputs() -> Self {
        Self {
            pins: LED_PINS,
            mode: GpioMode::OutputPushPull,
            pull: GpioPull::None,
            speed: GpioSpeed::Low,
        }
    }
}

/// Register file of one STM32F4 GPIO port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GpioPort {
    moder: u32,    // 0x00: mode register
    otyper: u32,   // 0x04: output type register
    ospeedr: u32,  // 0x08: output speed register
    pupdr: u32,    // 0x0C: pull-up/pull-down register
    idr: u32,      // 0x10: input data register
    odr: u32,      // 0x14: output data register
    bsrr: u32,     // 0x18: last bit set/reset request
    lckr: u32,     // 0x1C: configuration lock register
    afr: [u32; 2], // 0x20-0x24: alternate function registers
}

impl GpioPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn odr(&self) -> u32 {
        self.odr
    }

    pub fn idr(&self) -> u32 {
        self.idr
    }

    pub fn bsrr(&self) -> u32 {
        self.bsrr
    }

    /// Simulate external pin levels. Only the low 16 bits exist.
    pub fn set_idr(&mut self, value: u32) {
        self.idr = value & 0xFFFF;
    }

    pub fn set_input(&mut self, pins: PinMask, state: PinState) {
        match state {
            PinState::Set => self.idr |= u32::from(pins.bits()),
            PinState::Reset => self.idr &= !u32::from(pins.bits()),
        }
    }

    /// BSRR: lower 16 bits set, upper 16 bits reset. Set wins when both are requested.
    pub fn write_bsrr(&mut self, value: u32) {
        self.bsrr = value;
        let set = value & 0xFFFF;
        let reset = (value >> 16) & 0xFFFF;
        self.odr &= !reset;
        self.odr |= set;
    }

    pub fn write_pins(&mut self, pins: PinMask, state: PinState) {
        let bits = u32::from(pins.bits());
        match state {
            PinState::Set => self.write_bsrr(bits),
            PinState::Reset => self.write_bsrr(bits << 16),
        }
    }

    pub fn toggle_pins(&mut self, pins: PinMask) {
        self.odr ^= u32::from(pins.bits());
    }

    /// `Set` only when every selected pin reads high.
    pub fn read_pins(&self, pins: PinMask) -> PinState {
        let bits = u32::from(pins.bits());
        PinState::from(bits != 0 && (self.idr & bits) == bits)
    }
}
