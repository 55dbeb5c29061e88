// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The transient-item workload: allocate, hold, release.

use crate::driver::{TickOutcome, WorkloadDriver};
use crate::random::{wall_clock_seeded, WorkloadRng};
use memgate_control::AdmissionGate;
use memgate_core::config::{
    require_nonzero_interval, require_nonzero_size, ConfigError, HOLD_MAX, HOLD_MIN,
    SENTINEL_BYTE, TRANSIENT_TICK_INTERVAL, WORK_ITEM_SIZE,
};
use memgate_core::DegradationContext;
use memgate_data::ManagedHeap;
use rand::Rng;
use std::hint::black_box;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Configuration of the transient-item workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientConfig {
    /// Bytes allocated by each item.
    pub item_size: usize,
    /// Delay between admission attempts.
    pub tick_interval: Duration,
    /// Shortest hold duration.
    pub hold_min: Duration,
    /// Longest hold duration.
    pub hold_max: Duration,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            item_size: WORK_ITEM_SIZE,
            tick_interval: TRANSIENT_TICK_INTERVAL,
            hold_min: HOLD_MIN,
            hold_max: HOLD_MAX,
        }
    }
}

impl TransientConfig {
    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero_size("item size", self.item_size as u64)?;
        require_nonzero_interval("tick interval", self.tick_interval)?;
        if self.hold_min > self.hold_max {
            return Err(ConfigError::InvertedHoldRange {
                min: self.hold_min,
                max: self.hold_max,
            });
        }
        Ok(())
    }
}

/// One admitted unit of transient work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    /// Bytes the item allocates.
    pub size: usize,
    /// How long the item keeps its buffer.
    pub hold: Duration,
}

impl WorkItem {
    /// Runs the item to completion on the current thread.
    ///
    /// The buffer is written in full before the hold and read back after it,
    /// so every page stays resident for the whole hold. The bytes were
    /// accounted by the driver at admission and are released here.
    pub fn run(self, heap: &ManagedHeap, context: &DegradationContext) {
        let mut buffer = heap.alloc(self.size);
        buffer.fill_sentinel(SENTINEL_BYTE);
        context.sleep_while_running(self.hold);
        black_box(buffer.max_byte());
        drop(buffer);

        let counters = context.counters();
        counters.release(self.size as u64);
        counters.mark_completed();
    }
}

/// Launches one independent item per open-gate tick.
pub struct TransientDriver<R: Rng + Send = WorkloadRng> {
    config: TransientConfig,
    heap: ManagedHeap,
    gate: AdmissionGate,
    context: Arc<DegradationContext>,
    rng: R,
    in_flight: Vec<thread::JoinHandle<()>>,
}

impl TransientDriver<WorkloadRng> {
    /// Creates a driver whose hold durations are seeded from the wall clock.
    pub fn new(
        config: TransientConfig,
        heap: ManagedHeap,
        gate: AdmissionGate,
        context: Arc<DegradationContext>,
    ) -> Result<Self, ConfigError> {
        Self::with_rng(config, heap, gate, context, wall_clock_seeded())
    }
}

impl<R: Rng + Send> TransientDriver<R> {
    /// Creates a driver drawing hold durations from `rng`.
    pub fn with_rng(
        config: TransientConfig,
        heap: ManagedHeap,
        gate: AdmissionGate,
        context: Arc<DegradationContext>,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            heap,
            gate,
            context,
            rng,
            in_flight: Vec::new(),
        })
    }

    /// Items launched and not yet joined.
    pub fn in_flight(&mut self) -> usize {
        self.reap();
        self.in_flight.len()
    }

    fn reap(&mut self) {
        let mut i = 0;
        while i < self.in_flight.len() {
            if self.in_flight[i].is_finished() {
                let handle = self.in_flight.swap_remove(i);
                if handle.join().is_err() {
                    log::error!("TransientDriver: work item panicked.");
                }
            } else {
                i += 1;
            }
        }
    }

    fn draw_hold(&mut self) -> Duration {
        let min = self.config.hold_min.as_nanos() as u64;
        let max = self.config.hold_max.as_nanos() as u64;
        Duration::from_nanos(self.rng.random_range(min..=max))
    }
}

impl<R: Rng + Send> WorkloadDriver for TransientDriver<R> {
    fn name(&self) -> &'static str {
        "transient"
    }

    fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }

    fn tick(&mut self) -> io::Result<TickOutcome> {
        self.reap();
        if self.gate.is_degraded() {
            return Ok(TickOutcome::Skipped);
        }

        let item = WorkItem {
            size: self.config.item_size,
            hold: self.draw_hold(),
        };
        self.context.counters().reserve(item.size as u64);

        let heap = self.heap.clone();
        let context = Arc::clone(&self.context);
        let spawned = thread::Builder::new()
            .name("memgate-item".into())
            .spawn(move || item.run(&heap, &context));
        match spawned {
            Ok(handle) => {
                self.in_flight.push(handle);
                Ok(TickOutcome::Admitted)
            }
            Err(e) => {
                self.context.counters().release(item.size as u64);
                log::error!("TransientDriver: failed to launch work item: {e}");
                Err(e)
            }
        }
    }

    fn wait_idle(&mut self) {
        for handle in self.in_flight.drain(..) {
            if handle.join().is_err() {
                log::error!("TransientDriver: work item panicked.");
            }
        }
    }
}
