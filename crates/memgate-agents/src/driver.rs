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

//! The tick loop shared by every workload policy.

use memgate_core::DegradationContext;
use std::io;
use std::time::Duration;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// New memory was committed.
    Admitted,
    /// The gate was closed; nothing was committed.
    Skipped,
    /// Memory was given back.
    Freed,
    /// The tick had nothing to do.
    Idle,
}

/// A workload producing memory pressure one tick at a time.
pub trait WorkloadDriver: Send {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Delay before each tick.
    fn tick_interval(&self) -> Duration;

    /// Runs one tick.
    ///
    /// Errors are limited to failing to start work (e.g. a thread spawn).
    fn tick(&mut self) -> io::Result<TickOutcome>;

    /// Waits for work started by earlier ticks to finish.
    fn wait_idle(&mut self) {}
}

/// Tick counts of one [`drive`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSummary {
    /// Ticks run.
    pub ticks: u64,
    /// Ticks that committed memory.
    pub admitted: u64,
    /// Ticks skipped by the gate.
    pub skipped: u64,
    /// Ticks that gave memory back.
    pub freed: u64,
    /// Ticks with nothing to do.
    pub idle: u64,
}

impl DriveSummary {
    fn record(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Admitted => self.admitted += 1,
            TickOutcome::Skipped => self.skipped += 1,
            TickOutcome::Freed => self.freed += 1,
            TickOutcome::Idle => self.idle += 1,
        }
    }
}

/// Ticks `driver` until the context stops or `max_ticks` ticks have run.
///
/// Each iteration sleeps the driver's tick interval first, then ticks.
pub fn drive(
    driver: &mut dyn WorkloadDriver,
    context: &DegradationContext,
    max_ticks: Option<u64>,
) -> io::Result<DriveSummary> {
    let mut summary = DriveSummary::default();
    log::info!("Driving '{}' workload.", driver.name());

    while max_ticks.map_or(true, |max| summary.ticks < max) {
        if !context.sleep_while_running(driver.tick_interval()) {
            break;
        }
        summary.record(driver.tick()?);
    }

    log::info!(
        "Workload '{}' finished: {} ticks, {} admitted, {} skipped, {} freed.",
        driver.name(),
        summary.ticks,
        summary.admitted,
        summary.skipped,
        summary.freed
    );
    Ok(summary)
}
