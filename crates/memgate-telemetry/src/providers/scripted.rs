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

//! A provider driven entirely by the caller, for tests and replays.

use memgate_core::signal::{coalescing, CoalescingReceiver, CoalescingSender, Delivery};
use memgate_core::telemetry::{CycleEdge, HeapSnapshot, MemoryTelemetryProvider};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Emits scripted snapshots on demand.
///
/// [`emit`](Self::emit) publishes a snapshot and raises an edge, as if a
/// collection cycle had just produced it. Snapshots can also be queued up
/// front with [`with_script`](Self::with_script) and released one per
/// [`advance`](Self::advance).
#[derive(Debug)]
pub struct ScriptedTelemetry {
    current: Mutex<HeapSnapshot>,
    script: Mutex<VecDeque<HeapSnapshot>>,
    sender: CoalescingSender<CycleEdge>,
    receiver: CoalescingReceiver<CycleEdge>,
}

impl ScriptedTelemetry {
    /// Creates a provider reporting an all-zero heap.
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    /// Creates a provider with queued snapshots.
    pub fn with_script(script: impl IntoIterator<Item = HeapSnapshot>) -> Self {
        let (sender, receiver) = coalescing();
        Self {
            current: Mutex::new(HeapSnapshot::default()),
            script: Mutex::new(script.into_iter().collect()),
            sender,
            receiver,
        }
    }

    /// Publishes `snapshot` and raises an edge.
    pub fn emit(&self, snapshot: HeapSnapshot) -> Delivery {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
        self.sender.notify(CycleEdge)
    }

    /// Publishes the next queued snapshot. Returns `false` once the script is
    /// exhausted.
    pub fn advance(&self) -> bool {
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(snapshot) => {
                self.emit(snapshot);
                true
            }
            None => false,
        }
    }

    /// Snapshots still queued.
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for ScriptedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTelemetryProvider for ScriptedTelemetry {
    fn provider_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("scripted")
    }

    fn snapshot(&self) -> HeapSnapshot {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cycle_edges(&self) -> CoalescingReceiver<CycleEdge> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projected(next_gc: u64) -> HeapSnapshot {
        HeapSnapshot {
            next_gc,
            ..Default::default()
        }
    }

    #[test]
    fn test_emit_publishes_and_signals() {
        let telemetry = ScriptedTelemetry::new();
        let edges = telemetry.cycle_edges();
        assert_eq!(telemetry.emit(projected(10)), Delivery::Delivered);
        assert_eq!(telemetry.snapshot().next_gc, 10);
        assert_eq!(edges.try_recv(), Some(CycleEdge));
    }

    #[test]
    fn test_unconsumed_edges_coalesce_but_snapshot_is_latest() {
        let telemetry = ScriptedTelemetry::new();
        telemetry.emit(projected(1));
        assert_eq!(telemetry.emit(projected(2)), Delivery::Coalesced);
        assert_eq!(telemetry.snapshot().next_gc, 2);
    }

    #[test]
    fn test_script_advances_in_order() {
        let telemetry = ScriptedTelemetry::with_script([projected(1), projected(2)]);
        assert_eq!(telemetry.remaining(), 2);
        assert!(telemetry.advance());
        assert_eq!(telemetry.snapshot().next_gc, 1);
        assert!(telemetry.advance());
        assert_eq!(telemetry.snapshot().next_gc, 2);
        assert!(!telemetry.advance());
    }
}
