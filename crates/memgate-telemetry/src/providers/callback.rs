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

//! Cycle detection through a self-re-arming finalizer.

use memgate_core::config::CYCLE_SENTINEL_SIZE;
use memgate_core::signal::{coalescing, CoalescingReceiver, CoalescingSender, Delivery};
use memgate_core::telemetry::{CycleEdge, HeapSnapshot, MemoryTelemetryProvider};
use memgate_data::{ManagedHeap, WeakManagedHeap};
use std::borrow::Cow;

/// Detects collection cycles from inside the heap.
///
/// A small sentinel buffer is allocated and immediately dropped with a
/// finalizer attached. When a cycle reclaims it, the finalizer offers an edge
/// to the coalescing channel and arms a fresh sentinel, so exactly one
/// sentinel is waiting in the heap at any time.
///
/// Detection lags the cycle by nothing more than the finalizer pass, and there
/// is no polling cost. The edge fires from whichever thread ran the cycle.
#[derive(Debug)]
pub struct CycleCallbackProvider {
    heap: ManagedHeap,
    receiver: CoalescingReceiver<CycleEdge>,
    sender: CoalescingSender<CycleEdge>,
}

impl CycleCallbackProvider {
    /// Arms the detector on `heap`.
    pub fn new(heap: ManagedHeap) -> Self {
        let (sender, receiver) = coalescing();
        arm(heap.downgrade(), sender.clone());
        log::info!("CycleCallbackProvider: sentinel armed.");
        Self {
            heap,
            receiver,
            sender,
        }
    }

    /// Number of edges dropped because one was already pending.
    pub fn coalesced_edges(&self) -> u64 {
        self.sender.coalesced_count()
    }
}

/// Allocates a sentinel, attaches the re-arming finalizer, and releases it.
fn arm(heap: WeakManagedHeap, sender: CoalescingSender<CycleEdge>) {
    let Some(strong) = heap.upgrade() else {
        return;
    };
    let mut sentinel = strong.alloc(CYCLE_SENTINEL_SIZE);
    sentinel.set_finalizer(move || {
        if sender.notify(CycleEdge) == Delivery::Coalesced {
            log::trace!("CycleCallbackProvider: edge coalesced into pending notification.");
        }
        arm(heap, sender);
    });
}

impl MemoryTelemetryProvider for CycleCallbackProvider {
    fn provider_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("cycle-callback")
    }

    fn snapshot(&self) -> HeapSnapshot {
        self.heap.snapshot()
    }

    fn cycle_edges(&self) -> CoalescingReceiver<CycleEdge> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgate_data::HeapConfig;

    fn heap() -> ManagedHeap {
        ManagedHeap::new(HeapConfig {
            gc_percent: 100,
            min_heap_bytes: 1 << 30,
        })
    }

    #[test]
    fn test_every_cycle_produces_an_edge() {
        let heap = heap();
        let provider = CycleCallbackProvider::new(heap.clone());
        let edges = provider.cycle_edges();
        assert!(!edges.is_pending());

        heap.collect();
        assert_eq!(edges.try_recv(), Some(CycleEdge));

        // The detector re-armed itself: the next cycle fires again.
        heap.collect();
        assert_eq!(edges.try_recv(), Some(CycleEdge));
    }

    #[test]
    fn test_burst_of_cycles_coalesces() {
        let heap = heap();
        let provider = CycleCallbackProvider::new(heap.clone());
        let edges = provider.cycle_edges();

        for _ in 0..10 {
            heap.collect();
        }
        assert_eq!(edges.try_recv(), Some(CycleEdge));
        assert_eq!(edges.try_recv(), None);
        assert_eq!(provider.coalesced_edges(), 9);
    }

    #[test]
    fn test_exactly_one_sentinel_waits_in_heap() {
        let heap = heap();
        let _provider = CycleCallbackProvider::new(heap.clone());
        assert_eq!(heap.snapshot().heap_unreclaimed, CYCLE_SENTINEL_SIZE as u64);

        heap.collect();
        let snapshot = heap.snapshot();
        assert_eq!(snapshot.heap_unreclaimed, CYCLE_SENTINEL_SIZE as u64);
        assert_eq!(snapshot.heap_inuse, 0);
    }

    #[test]
    fn test_snapshot_reads_the_heap() {
        let heap = heap();
        let provider = CycleCallbackProvider::new(heap.clone());
        let _live = heap.alloc(4096);
        assert_eq!(provider.snapshot().heap_inuse, 4096);
        assert_eq!(provider.provider_id(), "cycle-callback");
    }
}
