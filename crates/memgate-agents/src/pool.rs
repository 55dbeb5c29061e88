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

//! The persistent-pool workload: a random walk of fixed-size buffers.

use crate::driver::{TickOutcome, WorkloadDriver};
use crate::random::{seeded, WorkloadRng};
use memgate_control::AdmissionGate;
use memgate_core::config::{
    require_nonzero_interval, require_nonzero_size, require_probability, ConfigError,
    POOL_FREE_PROBABILITY, POOL_SEED, POOL_TICK_INTERVAL, SENTINEL_BYTE, WORK_ITEM_SIZE,
};
use memgate_core::DegradationContext;
use memgate_data::{ManagedBuffer, ManagedHeap};
use rand::distr::Bernoulli;
use rand::Rng;
use std::hint::black_box;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// A growable set of equally sized buffers.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Vec<ManagedBuffer>,
    buffer_size: usize,
}

impl BufferPool {
    /// Creates an empty pool of `buffer_size`-byte buffers.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffers: Vec::new(),
            buffer_size,
        }
    }

    /// Buffers currently held.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if the pool holds no buffer.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Bytes held by the pool.
    pub fn live_bytes(&self) -> u64 {
        self.buffers.len() as u64 * self.buffer_size as u64
    }

    /// Adds a buffer.
    pub fn push(&mut self, buffer: ManagedBuffer) {
        debug_assert_eq!(buffer.len(), self.buffer_size);
        self.buffers.push(buffer);
    }

    /// Removes the buffer at `index`, moving the last buffer into its slot.
    pub fn swap_remove(&mut self, index: usize) -> ManagedBuffer {
        self.buffers.swap_remove(index)
    }
}

/// Configuration of the persistent-pool workload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    /// Size of each buffer.
    pub buffer_size: usize,
    /// Delay between decisions.
    pub tick_interval: Duration,
    /// Probability that a tick frees instead of allocating.
    pub free_probability: f64,
    /// Seed of the random source.
    pub seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: WORK_ITEM_SIZE,
            tick_interval: POOL_TICK_INTERVAL,
            free_probability: POOL_FREE_PROBABILITY,
            seed: POOL_SEED,
        }
    }
}

impl PoolConfig {
    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero_size("buffer size", self.buffer_size as u64)?;
        require_nonzero_interval("tick interval", self.tick_interval)?;
        require_probability("free probability", self.free_probability)
    }
}

/// Grows or shrinks a [`BufferPool`] by one buffer per tick.
///
/// A weighted coin decides each tick: with the free probability one uniformly
/// chosen buffer is dropped, otherwise a new buffer is allocated, written in
/// full, and kept, unless the gate is closed.
pub struct PoolDriver<R: Rng + Send = WorkloadRng> {
    config: PoolConfig,
    heap: ManagedHeap,
    gate: AdmissionGate,
    context: Arc<DegradationContext>,
    coin: Bernoulli,
    rng: R,
    pool: BufferPool,
}

impl PoolDriver<WorkloadRng> {
    /// Creates a driver seeded from the configuration.
    pub fn new(
        config: PoolConfig,
        heap: ManagedHeap,
        gate: AdmissionGate,
        context: Arc<DegradationContext>,
    ) -> Result<Self, ConfigError> {
        Self::with_rng(config, heap, gate, context, seeded(config.seed))
    }
}

impl<R: Rng + Send> PoolDriver<R> {
    /// Creates a driver drawing from `rng`.
    pub fn with_rng(
        config: PoolConfig,
        heap: ManagedHeap,
        gate: AdmissionGate,
        context: Arc<DegradationContext>,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let coin = Bernoulli::new(config.free_probability).map_err(|_| {
            ConfigError::InvalidProbability {
                field: "free probability",
                value: config.free_probability,
            }
        })?;
        Ok(Self {
            config,
            heap,
            gate,
            context,
            coin,
            rng,
            pool: BufferPool::new(config.buffer_size),
        })
    }

    /// The buffers currently held.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    fn free_one(&mut self) -> TickOutcome {
        if self.pool.is_empty() {
            return TickOutcome::Idle;
        }
        let index = self.rng.random_range(0..self.pool.len());
        drop(self.pool.swap_remove(index));
        self.context
            .counters()
            .release(self.config.buffer_size as u64);
        TickOutcome::Freed
    }

    fn allocate_one(&mut self) -> TickOutcome {
        if self.gate.is_degraded() {
            return TickOutcome::Skipped;
        }
        let mut buffer = self.heap.alloc(self.config.buffer_size);
        buffer.fill_sentinel(SENTINEL_BYTE);
        black_box(buffer.max_byte());

        let counters = self.context.counters();
        counters.reserve(self.config.buffer_size as u64);
        counters.mark_completed();
        self.pool.push(buffer);
        TickOutcome::Admitted
    }
}

impl<R: Rng + Send> WorkloadDriver for PoolDriver<R> {
    fn name(&self) -> &'static str {
        "pool"
    }

    fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }

    fn tick(&mut self) -> io::Result<TickOutcome> {
        if self.rng.sample(self.coin) {
            Ok(self.free_one())
        } else {
            Ok(self.allocate_one())
        }
    }
}
