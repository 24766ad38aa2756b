// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::sequencer::SequencerState;
use crate::SequencerObserver;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct LoopMetrics {
    transition_count: AtomicU64,
    fault_count: AtomicU64,
    iteration_count: AtomicU64,
    start_time: Instant,
}

/// Plain copy of the counters, for reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsReport {
    pub transitions: u64,
    pub faults: u64,
    pub iterations: u64,
    pub iterations_per_sec: f64,
}

impl Default for LoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self {
            transition_count: AtomicU64::new(0),
            fault_count: AtomicU64::new(0),
            iteration_count: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn reset(&self) {
        self.transition_count.store(0, Ordering::SeqCst);
        self.fault_count.store(0, Ordering::SeqCst);
        self.iteration_count.store(0, Ordering::SeqCst);
    }

    pub fn get_transitions(&self) -> u64 {
        self.transition_count.load(Ordering::SeqCst)
    }

    pub fn get_faults(&self) -> u64 {
        self.fault_count.load(Ordering::SeqCst)
    }

    pub fn get_iterations(&self) -> u64 {
        self.iteration_count.load(Ordering::SeqCst)
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_iterations() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            transitions: self.get_transitions(),
            faults: self.get_faults(),
            iterations: self.get_iterations(),
            iterations_per_sec: self.get_ips(),
        }
    }
}

impl SequencerObserver for LoopMetrics {
    fn on_transition(&self, _from: SequencerState, to: SequencerState) {
        self.transition_count.fetch_add(1, Ordering::SeqCst);
        if to.is_error() {
            self.fault_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_iteration(&self, _iteration: u64) {
        self.iteration_count.fetch_add(1, Ordering::SeqCst);
    }
}
