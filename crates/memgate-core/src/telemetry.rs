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

//! Heap telemetry types and the capabilities the control loop depends on.
//!
//! The control loop never talks to a concrete heap. It sees three seams:
//!
//! - [`HeapIntrospect`]: read a [`HeapSnapshot`].
//! - [`Collector`]: request an out-of-band collection.
//! - [`MemoryTelemetryProvider`]: snapshots plus the edge-triggered
//!   "a collection cycle completed" channel.

use crate::signal::CoalescingReceiver;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A point-in-time copy of heap statistics.
///
/// The managed-heap fields mirror what a collecting runtime reports; the
/// `process_*` fields come from the global tracking allocator and stay zero
/// when none is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    /// Bytes of heap objects, reachable or not yet reclaimed.
    pub heap_alloc: u64,
    /// Bytes of heap objects still referenced.
    pub heap_inuse: u64,
    /// Bytes released by their owners but not yet reclaimed by a cycle.
    pub heap_unreclaimed: u64,
    /// Number of live heap objects.
    pub heap_objects: u64,
    /// Cumulative bytes ever allocated on the heap.
    pub total_alloc: u64,
    /// Cumulative heap allocations.
    pub mallocs: u64,
    /// Cumulative heap objects reclaimed.
    pub frees: u64,
    /// Heap size at which the next collection cycle will run.
    pub next_gc: u64,
    /// Completed collection cycles.
    pub num_gc: u32,
    /// Completed cycles that were requested explicitly.
    pub num_forced_gc: u32,
    /// Cumulative time spent inside collection cycles, in nanoseconds.
    pub pause_total_ns: u64,
    /// Duration of the most recent cycle, in nanoseconds.
    pub last_pause_ns: u64,
    /// Wall-clock end of the most recent cycle in nanoseconds since the Unix
    /// epoch, or zero if no cycle ran yet.
    pub last_gc_unix_nanos: u64,
    /// Bytes held through the process-wide allocator.
    pub process_current_bytes: u64,
    /// Peak bytes held through the process-wide allocator.
    pub process_peak_bytes: u64,
}

impl HeapSnapshot {
    /// The collector's own estimate of the heap size at which it will next
    /// run. This is the pressure signal compared against the soft limit.
    pub fn projected_next_collection(&self) -> u64 {
        self.next_gc
    }
}

/// Marker sent on every detected collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleEdge;

/// Something that can produce heap snapshots on demand.
///
/// Reading a snapshot is a local memory read and cannot fail.
pub trait HeapIntrospect: Send + Sync {
    /// Captures the current heap statistics.
    fn snapshot(&self) -> HeapSnapshot;
}

/// Something that can run a collection cycle on request.
pub trait Collector: Send + Sync {
    /// Runs a full collection cycle. Best effort: the caller learns about the
    /// outcome through the next telemetry edge, not through a return value.
    fn force_collection(&self);
}

/// The telemetry capability consumed by the degradation controller.
///
/// Implementations differ in how they notice collection cycles (a callback
/// armed inside the heap, a polling thread, a test script), but all deliver
/// edges through a coalescing channel of capacity one.
pub trait MemoryTelemetryProvider: Send + Sync {
    /// A short identifier for logs.
    fn provider_id(&self) -> Cow<'static, str>;

    /// Captures the current heap statistics.
    fn snapshot(&self) -> HeapSnapshot;

    /// Returns the receiving end of the collection-edge channel.
    ///
    /// Every call hands out the same channel. The control loop is expected to
    /// be its only consumer.
    fn cycle_edges(&self) -> CoalescingReceiver<CycleEdge>;
}
