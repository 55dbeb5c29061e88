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

//! The shared context of the degradation control loop.

use crate::control::DegradationState;
use crate::counters::WorkCounters;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::WAKE_INTERVAL;

/// Process-wide state shared by every component of the control loop.
///
/// Constructed once, wrapped in an `Arc`, and handed to the controller, the
/// recovery trigger, the admission gate, the workload drivers, and the
/// reporter. Every field is a scalar atomic, so no component ever takes a lock
/// to read or update it.
///
/// The controller is the only writer of the degradation state. The running
/// flag starts set and is cleared exactly once by [`stop`](Self::stop).
#[derive(Debug)]
pub struct DegradationContext {
    state: AtomicU8,
    transitions: AtomicU64,
    counters: WorkCounters,
    running: AtomicBool,
}

impl DegradationContext {
    /// Creates a running context in the `Normal` state with zeroed counters.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(DegradationState::Normal.as_u8()),
            transitions: AtomicU64::new(0),
            counters: WorkCounters::new(),
            running: AtomicBool::new(true),
        }
    }

    /// Returns the current degradation state.
    pub fn state(&self) -> DegradationState {
        DegradationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns `true` while new work admission is suspended.
    pub fn is_degraded(&self) -> bool {
        self.state() == DegradationState::Degraded
    }

    /// Atomically moves the state from `from` to `to`.
    ///
    /// Returns `false`, leaving the state untouched, if the current state was
    /// not `from`.
    pub fn transition(&self, from: DegradationState, to: DegradationState) -> bool {
        if from == to {
            return false;
        }
        let swapped = self
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if swapped {
            self.transitions.fetch_add(1, Ordering::Relaxed);
        }
        swapped
    }

    /// Number of state transitions since construction.
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// The shared work counters.
    pub fn counters(&self) -> &WorkCounters {
        &self.counters
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Asks every loop sharing this context to wind down.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("Degradation context stopped.");
        }
    }

    /// Sleeps for `duration`, waking early if the context is stopped.
    ///
    /// Returns `true` if the full duration elapsed while still running.
    pub fn sleep_while_running(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(WAKE_INTERVAL));
        }
    }
}

impl Default for DegradationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_context_is_normal_and_running() {
        let ctx = DegradationContext::new();
        assert_eq!(ctx.state(), DegradationState::Normal);
        assert!(!ctx.is_degraded());
        assert!(ctx.is_running());
        assert_eq!(ctx.transition_count(), 0);
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let ctx = DegradationContext::new();
        assert!(!ctx.transition(DegradationState::Degraded, DegradationState::Normal));
        assert!(ctx.transition(DegradationState::Normal, DegradationState::Degraded));
        assert!(ctx.is_degraded());
        assert!(!ctx.transition(DegradationState::Normal, DegradationState::Degraded));
        assert_eq!(ctx.transition_count(), 1);
    }

    #[test]
    fn test_same_state_transition_is_rejected() {
        let ctx = DegradationContext::new();
        assert!(!ctx.transition(DegradationState::Normal, DegradationState::Normal));
        assert_eq!(ctx.transition_count(), 0);
    }

    #[test]
    fn test_degraded_write_is_visible_to_other_threads() {
        let ctx = Arc::new(DegradationContext::new());
        let writer = Arc::clone(&ctx);
        thread::spawn(move || {
            writer.transition(DegradationState::Normal, DegradationState::Degraded);
        })
        .join()
        .unwrap();
        assert!(ctx.is_degraded());
    }

    #[test]
    fn test_sleep_wakes_early_on_stop() {
        let ctx = Arc::new(DegradationContext::new());
        let stopper = Arc::clone(&ctx);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stopper.stop();
        });
        let started = Instant::now();
        assert!(!ctx.sleep_while_running(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_sleep_runs_full_duration_while_running() {
        let ctx = DegradationContext::new();
        let started = Instant::now();
        assert!(ctx.sleep_while_running(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
