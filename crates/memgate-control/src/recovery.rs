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

//! The recovery trigger: forces a collection after entering degraded mode.

use memgate_core::signal::{CoalescingReceiver, RecvTimeoutError};
use memgate_core::telemetry::Collector;
use memgate_core::{DegradationContext, DegradedEntry};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Waits out a cooldown after each degraded entry, then forces a collection.
///
/// The forced cycle is best effort. Whether it brought the projected size
/// back under the limit is decided by the controller on the next edge.
///
/// Cycles are paced by allocation, and a degraded workload stops allocating.
/// If a forced cycle leaves the state degraded, nothing else would run a
/// cycle, so the trigger forces another one every cooldown until the
/// controller reports recovery. Retries stay within the episode the last
/// entry opened: a later entry gets its own full cooldown.
pub struct RecoveryTrigger {
    context: Arc<DegradationContext>,
    collector: Arc<dyn Collector>,
    cooldown: Duration,
    wake_interval: Duration,
    forced: u64,
    /// When the last collection was forced, and the transition count at
    /// that moment.
    last_forced: Option<(Instant, u64)>,
}

impl RecoveryTrigger {
    /// Creates a trigger forcing collections through `collector`.
    pub fn new(
        context: Arc<DegradationContext>,
        collector: Arc<dyn Collector>,
        cooldown: Duration,
        wake_interval: Duration,
    ) -> Self {
        Self {
            context,
            collector,
            cooldown,
            wake_interval,
            forced: 0,
            last_forced: None,
        }
    }

    /// Forced collections issued so far.
    pub fn forced_collections(&self) -> u64 {
        self.forced
    }

    /// Handles one degraded entry.
    ///
    /// Returns `false` without collecting if the context stopped during the
    /// cooldown.
    pub fn handle(&mut self, entry: DegradedEntry) -> bool {
        log::debug!(
            "Recovery: degraded at {} projected bytes, cooling down for {:?}",
            entry.projected_bytes,
            self.cooldown
        );
        if !self.context.sleep_while_running(self.cooldown) {
            return false;
        }
        self.force();
        log::info!(
            "Recovery: forced collection #{} issued {:?} after degraded entry.",
            self.forced,
            entry.entered_at.elapsed()
        );
        true
    }

    /// Forces another collection if the state is still in the same degraded
    /// episode a full cooldown after the previous one.
    ///
    /// Returns `true` if a collection was forced.
    pub fn retry_if_still_degraded(&mut self) -> bool {
        let Some((last, episode)) = self.last_forced else {
            return false;
        };
        if self.context.transition_count() != episode
            || !self.context.is_degraded()
            || last.elapsed() < self.cooldown
        {
            return false;
        }
        self.force();
        log::debug!(
            "Recovery: still degraded, forced collection #{}.",
            self.forced
        );
        true
    }

    fn force(&mut self) {
        self.collector.force_collection();
        self.forced += 1;
        self.last_forced = Some((Instant::now(), self.context.transition_count()));
    }

    /// Handles degraded entries until the context stops.
    pub fn run(mut self, entries: CoalescingReceiver<DegradedEntry>) {
        log::info!("Recovery trigger started, cooldown {:?}.", self.cooldown);
        while self.context.is_running() {
            match entries.recv_timeout(self.wake_interval) {
                Ok(entry) => {
                    self.handle(entry);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.retry_if_still_degraded();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::info!(
            "Recovery trigger stopped after {} forced collections.",
            self.forced
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgate_core::DegradationState;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCollector {
        calls: Mutex<Vec<Instant>>,
    }

    impl Collector for RecordingCollector {
        fn force_collection(&self) {
            self.calls.lock().unwrap().push(Instant::now());
        }
    }

    fn entry() -> DegradedEntry {
        DegradedEntry {
            entered_at: Instant::now(),
            projected_bytes: 1,
        }
    }

    #[test]
    fn test_collection_waits_for_cooldown() {
        let context = Arc::new(DegradationContext::new());
        let collector = Arc::new(RecordingCollector::default());
        let cooldown = Duration::from_millis(60);
        let mut trigger = RecoveryTrigger::new(
            context,
            collector.clone(),
            cooldown,
            Duration::from_millis(10),
        );

        let entry = entry();
        assert!(trigger.handle(entry));

        let calls = collector.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(
            calls[0] >= entry.entered_at + cooldown,
            "forced collection issued before the cooldown elapsed"
        );
        assert_eq!(trigger.forced_collections(), 1);
    }

    #[test]
    fn test_stopped_context_skips_collection() {
        let context = Arc::new(DegradationContext::new());
        let collector = Arc::new(RecordingCollector::default());
        let mut trigger = RecoveryTrigger::new(
            Arc::clone(&context),
            collector.clone(),
            Duration::from_secs(5),
            Duration::from_millis(10),
        );
        context.stop();
        assert!(!trigger.handle(entry()));
        assert!(collector.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_retry_waits_for_cooldown_and_degraded_state() {
        let context = Arc::new(DegradationContext::new());
        let collector = Arc::new(RecordingCollector::default());
        let cooldown = Duration::from_millis(30);
        let mut trigger = RecoveryTrigger::new(
            Arc::clone(&context),
            collector.clone(),
            cooldown,
            Duration::from_millis(10),
        );

        // Nothing forced yet, nothing to retry.
        context.transition(DegradationState::Normal, DegradationState::Degraded);
        assert!(!trigger.retry_if_still_degraded());

        assert!(trigger.handle(entry()));
        assert!(!trigger.retry_if_still_degraded(), "retried before the cooldown");

        std::thread::sleep(cooldown);
        assert!(trigger.retry_if_still_degraded());
        assert_eq!(trigger.forced_collections(), 2);

        context.transition(DegradationState::Degraded, DegradationState::Normal);
        std::thread::sleep(cooldown);
        assert!(!trigger.retry_if_still_degraded());
        assert_eq!(collector.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_new_episode_waits_for_its_own_cooldown() {
        let context = Arc::new(DegradationContext::new());
        let collector = Arc::new(RecordingCollector::default());
        let cooldown = Duration::from_millis(50);
        let mut trigger = RecoveryTrigger::new(
            Arc::clone(&context),
            collector.clone(),
            cooldown,
            Duration::from_millis(10),
        );

        context.transition(DegradationState::Normal, DegradationState::Degraded);
        assert!(trigger.handle(entry()));
        context.transition(DegradationState::Degraded, DegradationState::Normal);
        std::thread::sleep(cooldown);

        // Re-entered, but the entry signal has not been handled yet.
        context.transition(DegradationState::Normal, DegradationState::Degraded);
        let reentered = Instant::now();
        assert!(
            !trigger.retry_if_still_degraded(),
            "forced {:?} after a new degraded entry",
            reentered.elapsed()
        );
        assert_eq!(collector.calls.lock().unwrap().len(), 1);

        assert!(trigger.handle(entry()));
        let calls = collector.calls.lock().unwrap();
        assert!(calls[1] >= reentered + cooldown);
    }
}
