// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mock::{MockControl, MockHal};
use crate::peripherals::timer::TimerHandle;
use crate::peripherals::uart::UartHandle;
use crate::sequencer::{FaultHandler, Sequencer, SequencerState};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Debug, Clone)]
pub struct MockSnapshot {
    pub control: MockControl,
    pub system_core_clock_hz: u32,
    /// Register files of the backed ports, keyed `GPIOA`, `GPIOC`, ...
    pub ports: BTreeMap<String, serde_json::Value>,
    pub sequencer: Option<SequencerSnapshot>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SequencerSnapshot {
    pub state: SequencerState,
    pub iterations: u64,
    pub uart: UartHandle,
    pub timer: TimerHandle,
}

impl MockSnapshot {
    pub fn capture(hal: &MockHal) -> serde_json::Result<Self> {
        let mut ports = BTreeMap::new();
        for (id, port) in hal.backed_ports() {
            ports.insert(id.to_string(), serde_json::to_value(port)?);
        }
        Ok(Self {
            control: hal.control().clone(),
            system_core_clock_hz: hal.system_core_clock(),
            ports,
            sequencer: None,
        })
    }

    pub fn with_sequencer<F: FaultHandler>(mut self, seq: &Sequencer<F>) -> Self {
        self.sequencer = Some(SequencerSnapshot {
            state: seq.state(),
            iterations: seq.iterations(),
            uart: *seq.uart(),
            timer: *seq.timer(),
        });
        self
    }
}
