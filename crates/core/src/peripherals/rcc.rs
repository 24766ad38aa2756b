// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Reset and clock control: oscillator, PLL and bus divider settings.

use bitflags::bitflags;
use serde::Serialize;

/// Internal RC oscillator frequency.
pub const HSI_HZ: u32 = 16_000_000;
/// External crystal fitted on the discovery board.
pub const HSE_HZ: u32 = 8_000_000;
pub const HSI_CALIBRATION_DEFAULT: u8 = 16;
/// Core clock once the PLL configuration below is active.
pub const SYSTEM_CORE_CLOCK_HZ: u32 = 168_000_000;
pub const FLASH_LATENCY: FlashLatency = FlashLatency::Ws5;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    #[serde(transparent)]
    pub struct OscillatorType: u32 {
        const HSE = 0x1;
        const HSI = 0x2;
        const LSE = 0x4;
        const LSI = 0x8;
    }
}

bitflags! {
    /// Which clocks a bus clock configuration touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    #[serde(transparent)]
    pub struct ClockType: u32 {
        const SYSCLK = 0x1;
        const HCLK = 0x2;
        const PCLK1 = 0x4;
        const PCLK2 = 0x8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OscState {
    #[default]
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PllState {
    #[default]
    None,
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PllSource {
    #[default]
    Hsi,
    Hse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PllP {
    #[default]
    Div2,
    Div4,
    Div6,
    Div8,
}

impl PllP {
    pub fn divisor(self) -> u32 {
        match self {
            PllP::Div2 => 2,
            PllP::Div4 => 4,
            PllP::Div6 => 6,
            PllP::Div8 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PllConfig {
    pub state: PllState,
    pub source: PllSource,
    pub m: u32,
    pub n: u32,
    pub p: PllP,
    pub q: u32,
}

impl PllConfig {
    /// Main PLL output (`input / M * N / P`), `None` when the PLL is not on or
    /// a factor is zero.
    pub fn output_hz(&self) -> Option<u32> {
        if self.state != PllState::On || self.m == 0 || self.n == 0 {
            return None;
        }
        let input = match self.source {
            PllSource::Hsi => HSI_HZ,
            PllSource::Hse => HSE_HZ,
        };
        let vco = u64::from(input) / u64::from(self.m) * u64::from(self.n);
        u32::try_from(vco / u64::from(self.p.divisor())).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OscillatorConfig {
    pub oscillator_type: OscillatorType,
    pub hse_state: OscState,
    pub lse_state: OscState,
    pub hsi_state: OscState,
    pub hsi_calibration: u8,
    pub lsi_state: OscState,
    pub pll: PllConfig,
}

impl OscillatorConfig {
    /// HSI on, PLL fed from HSI with M=8, N=168, P=/2, Q=4.
    pub fn hsi_pll_168mhz() -> Self {
        Self {
            oscillator_type: OscillatorType::HSI,
            hsi_state: OscState::On,
            hsi_calibration: HSI_CALIBRATION_DEFAULT,
            pll: PllConfig {
                state: PllState::On,
                source: PllSource::Hsi,
                m: 8,
                n: 168,
                p: PllP::Div2,
                q: 4,
            },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SysclkSource {
    #[default]
    Hsi,
    Hse,
    PllClk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AhbDivider {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbDivider {
    pub fn divisor(self) -> u32 {
        match self {
            AhbDivider::Div1 => 1,
            AhbDivider::Div2 => 2,
            AhbDivider::Div4 => 4,
            AhbDivider::Div8 => 8,
            AhbDivider::Div16 => 16,
            AhbDivider::Div64 => 64,
            AhbDivider::Div128 => 128,
            AhbDivider::Div256 => 256,
            AhbDivider::Div512 => 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApbDivider {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbDivider {
    pub fn divisor(self) -> u32 {
        match self {
            ApbDivider::Div1 => 1,
            ApbDivider::Div2 => 2,
            ApbDivider::Div4 => 4,
            ApbDivider::Div8 => 8,
            ApbDivider::Div16 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BusClockConfig {
    pub clock_type: ClockType,
    pub sysclk_source: SysclkSource,
    pub ahb_divider: AhbDivider,
    pub apb1_divider: ApbDivider,
    pub apb2_divider: ApbDivider,
}

impl BusClockConfig {
    /// SYSCLK from the PLL, AHB /1, APB1 /4, APB2 /2.
    pub fn pll_168mhz() -> Self {
        Self {
            clock_type: ClockType::all(),
            sysclk_source: SysclkSource::PllClk,
            ahb_divider: AhbDivider::Div1,
            apb1_divider: ApbDivider::Div4,
            apb2_divider: ApbDivider::Div2,
        }
    }

    pub fn clock_tree(&self, sysclk_hz: u32) -> ClockTree {
        let hclk_hz = sysclk_hz / self.ahb_divider.divisor();
        let pclk1_hz = hclk_hz / self.apb1_divider.divisor();
        let pclk2_hz = hclk_hz / self.apb2_divider.divisor();
        // Timer kernels run at twice the APB clock whenever the APB is divided.
        let timer_hz = |pclk: u32, div: ApbDivider| {
            if div == ApbDivider::Div1 {
                pclk
            } else {
                pclk.saturating_mul(2)
            }
        };
        ClockTree {
            sysclk_hz,
            hclk_hz,
            pclk1_hz,
            pclk2_hz,
            apb1_timer_hz: timer_hz(pclk1_hz, self.apb1_divider),
            apb2_timer_hz: timer_hz(pclk2_hz, self.apb2_divider),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLatency {
    #[default]
    Ws0,
    Ws1,
    Ws2,
    Ws3,
    Ws4,
    Ws5,
    Ws6,
    Ws7,
}

impl FlashLatency {
    pub fn wait_states(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageScale {
    #[default]
    Scale1,
    Scale2,
    Scale3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApbBus {
    #[default]
    Apb1,
    Apb2,
}

/// Derived bus frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockTree {
    pub sysclk_hz: u32,
    pub hclk_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
    pub apb1_timer_hz: u32,
    pub apb2_timer_hz: u32,
}

impl ClockTree {
    /// Everything running straight from HSI, as after reset.
    pub fn reset() -> Self {
        Self {
            sysclk_hz: HSI_HZ,
            hclk_hz: HSI_HZ,
            pclk1_hz: HSI_HZ,
            pclk2_hz: HSI_HZ,
            apb1_timer_hz: HSI_HZ,
            apb2_timer_hz: HSI_HZ,
        }
    }

    pub fn pclk_hz(&self, bus: ApbBus) -> u32 {
        match bus {
            ApbBus::Apb1 => self.pclk1_hz,
            ApbBus::Apb2 => self.pclk2_hz,
        }
    }

    pub fn timer_clock_hz(&self, bus: ApbBus) -> u32 {
        match bus {
            ApbBus::Apb1 => self.apb1_timer_hz,
            ApbBus::Apb2 => self.apb2_timer_hz,
        }
    }
}

impl Default for ClockTree {
    fn default() -> Self {
        Self::reset()
    }
}
