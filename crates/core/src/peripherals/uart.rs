// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::rcc::ApbBus;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UartInstance {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
}

impl UartInstance {
    pub fn base_address(self) -> u32 {
        match self {
            UartInstance::Usart1 => 0x4001_1000,
            UartInstance::Usart2 => 0x4000_4400,
            UartInstance::Usart3 => 0x4000_4800,
            UartInstance::Uart4 => 0x4000_4C00,
            UartInstance::Uart5 => 0x4000_5000,
            UartInstance::Usart6 => 0x4001_1400,
        }
    }

    pub fn bus(self) -> ApbBus {
        match self {
            UartInstance::Usart1 | UartInstance::Usart6 => ApbBus::Apb2,
            _ => ApbBus::Apb1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WordLength {
    Bits8,
    Bits9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UartMode {
    Rx,
    Tx,
    TxRx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HwFlowControl {
    None,
    Rts,
    Cts,
    RtsCts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Oversampling {
    By16,
    By8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UartConfig {
    pub baud_rate: u32,
    pub word_length: WordLength,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub mode: UartMode,
    pub hw_flow_control: HwFlowControl,
    pub oversampling: Oversampling,
}

impl UartConfig {
    /// 115200 baud, 8N1, TX+RX, no flow control, 16x oversampling.
    pub fn console_115200_8n1() -> Self {
        Self {
            baud_rate: 115_200,
            word_length: WordLength::Bits8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            mode: UartMode::TxRx,
            hw_flow_control: HwFlowControl::None,
            oversampling: Oversampling::By16,
        }
    }

    /// Baud rate register value for the given peripheral clock, rounded the
    /// same way the vendor HAL does it (fixed point with two decimal places).
    pub fn brr(&self, pclk_hz: u32) -> Option<u32> {
        if self.baud_rate == 0 {
            return None;
        }
        let (sampling, frac_bits) = match self.oversampling {
            Oversampling::By16 => (4u64, 16u64),
            Oversampling::By8 => (2u64, 8u64),
        };
        let div = u64::from(pclk_hz) * 25 / (sampling * u64::from(self.baud_rate));
        let mantissa = div / 100;
        let fraction = ((div - mantissa * 100) * frac_bits + 50) / 100;
        let value = match self.oversampling {
            Oversampling::By16 => (mantissa << 4) + (fraction & 0xF0) + (fraction & 0x0F),
            Oversampling::By8 => (mantissa << 4) + ((fraction & 0xF8) << 1) + (fraction & 0x07),
        };
        u32::try_from(value).ok()
    }
}

/// Binding of a UART instance to its configuration. Both are empty until the
/// init step fills them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UartHandle {
    pub instance: Option<UartInstance>,
    pub config: Option<UartConfig>,
}

impl UartHandle {
    pub fn bind(&mut self, instance: UartInstance, config: UartConfig) {
        self.instance = Some(instance);
        self.config = Some(config);
    }

    pub fn is_bound(&self) -> bool {
        self.instance.is_some() && self.config.is_some()
    }
}
