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

//! The degradation controller: turns heap snapshots into state transitions.

use crate::metrics::ToggleRateTracker;
use crate::service::ControlConfig;
use memgate_core::signal::{CoalescingSender, Delivery, RecvTimeoutError};
use memgate_core::telemetry::{HeapSnapshot, MemoryTelemetryProvider};
use memgate_core::{DegradationContext, DegradationState, DegradedEntry, Transition};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Console marker printed when admission is suspended.
pub const DEGRADED_MARKER: &str = "   --- degraded --- ";

/// Console marker printed when admission resumes.
pub const RECOVERED_MARKER: &str = "   --- permit to proceed --- ";

/// Single writer of the degradation state.
///
/// Each evaluation compares the projected next-collection size of a snapshot
/// with the soft limit. The trigger is a plain level trigger:
///
/// | projected        | state      | outcome                                  |
/// |------------------|------------|------------------------------------------|
/// | `> soft_limit`   | `Normal`   | `Degraded`, recovery trigger notified    |
/// | `<= soft_limit`  | `Degraded` | `Normal`                                 |
/// | otherwise        |            | no change                                |
///
/// Rapid toggling is only measured, never damped.
#[derive(Debug)]
pub struct DegradationController {
    context: Arc<DegradationContext>,
    soft_limit: u64,
    wake_interval: Duration,
    flap_warn_rate: f32,
    toggles: ToggleRateTracker,
    recovery: CoalescingSender<DegradedEntry>,
    evaluations: u64,
}

impl DegradationController {
    /// Creates a controller writing to `context` and signalling degraded
    /// entries through `recovery`.
    pub fn new(
        context: Arc<DegradationContext>,
        config: &ControlConfig,
        recovery: CoalescingSender<DegradedEntry>,
    ) -> Self {
        Self {
            context,
            soft_limit: config.soft_limit,
            wake_interval: config.wake_interval,
            flap_warn_rate: config.flap_warn_rate,
            toggles: ToggleRateTracker::new(config.flap_window),
            recovery,
            evaluations: 0,
        }
    }

    /// Number of snapshots evaluated so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Evaluates one snapshot and applies the resulting transition, if any.
    pub fn evaluate(&mut self, snapshot: &HeapSnapshot) -> Option<Transition> {
        self.evaluations += 1;
        let projected = snapshot.projected_next_collection();
        log::debug!(
            "Controller: cycle {} projected {} bytes vs limit {} ({})",
            snapshot.num_gc,
            projected,
            self.soft_limit,
            self.context.state()
        );
        if log::log_enabled!(log::Level::Trace) {
            match serde_json::to_string(snapshot) {
                Ok(json) => log::trace!("Controller: snapshot {json}"),
                Err(e) => log::trace!("Controller: snapshot not serializable: {e}"),
            }
        }

        let transition = if projected > self.soft_limit {
            self.context
                .transition(DegradationState::Normal, DegradationState::Degraded)
                .then_some(Transition::EnteredDegraded {
                    projected_bytes: projected,
                })
        } else {
            self.context
                .transition(DegradationState::Degraded, DegradationState::Normal)
                .then_some(Transition::Recovered {
                    projected_bytes: projected,
                })
        }?;

        let now = Instant::now();
        match transition {
            Transition::EnteredDegraded { projected_bytes } => {
                log::info!(
                    "Controller: entering degraded mode, projected {} bytes exceeds {}",
                    projected_bytes,
                    self.soft_limit
                );
                let entry = DegradedEntry {
                    entered_at: now,
                    projected_bytes,
                };
                if self.recovery.notify(entry) == Delivery::Coalesced {
                    log::debug!("Controller: recovery already pending, entry coalesced.");
                }
            }
            Transition::Recovered { projected_bytes } => {
                log::info!(
                    "Controller: leaving degraded mode, projected {} bytes within {}",
                    projected_bytes,
                    self.soft_limit
                );
            }
        }

        let rate = self.toggles.record(now);
        if rate > self.flap_warn_rate {
            log::warn!(
                "Controller: degradation state is flapping ({:.1} transitions/s, {} total)",
                rate,
                self.context.transition_count()
            );
        }

        Some(transition)
    }

    /// Console marker for a transition.
    pub fn marker(transition: &Transition) -> &'static str {
        match transition {
            Transition::EnteredDegraded { .. } => DEGRADED_MARKER,
            Transition::Recovered { .. } => RECOVERED_MARKER,
        }
    }

    /// Evaluates a fresh snapshot on every collection edge until the context
    /// stops, printing a marker for each transition.
    ///
    /// A failed marker write stops the context and is returned.
    pub fn run(
        mut self,
        provider: Arc<dyn MemoryTelemetryProvider>,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        let edges = provider.cycle_edges();
        log::info!(
            "Controller started on '{}' telemetry, soft limit {} bytes.",
            provider.provider_id(),
            self.soft_limit
        );

        while self.context.is_running() {
            match edges.recv_timeout(self.wake_interval) {
                Ok(_) => {
                    let snapshot = provider.snapshot();
                    if let Some(transition) = self.evaluate(&snapshot) {
                        if let Err(e) = writeln!(out, "{}", Self::marker(&transition))
                            .and_then(|()| out.flush())
                        {
                            log::error!("Controller: marker output failed: {e}. Stopping.");
                            self.context.stop();
                            return Err(e);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Controller: telemetry edge channel closed.");
                    break;
                }
            }
        }

        log::info!(
            "Controller stopped after {} evaluations.",
            self.evaluations
        );
        Ok(())
    }
}
