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

//! The managed heap and its buffers.

use super::HeapConfig;
use memgate_core::memory::allocator_stats;
use memgate_core::telemetry::{Collector, HeapIntrospect, HeapSnapshot};
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

type Finalizer = Box<dyn FnOnce() + Send + 'static>;

/// Storage released by its owner, waiting for a cycle.
struct Garbage {
    storage: Box<[u8]>,
    finalizer: Option<Finalizer>,
}

#[derive(Default)]
struct HeapState {
    live_bytes: u64,
    live_objects: u64,
    garbage: Vec<Garbage>,
    garbage_bytes: u64,
    next_gc: u64,
    total_alloc: u64,
    mallocs: u64,
    frees: u64,
    num_gc: u32,
    num_forced_gc: u32,
    pause_total_ns: u64,
    last_pause_ns: u64,
    last_gc_unix_nanos: u64,
}

impl HeapState {
    fn heap_alloc(&self) -> u64 {
        self.live_bytes.saturating_add(self.garbage_bytes)
    }
}

struct HeapShared {
    config: HeapConfig,
    state: Mutex<HeapState>,
}

impl HeapShared {
    // The state holds only counters and owned storage, so a panic while the
    // lock was held cannot leave it logically torn.
    fn lock(&self) -> MutexGuard<'_, HeapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleKind {
    Paced { request: u64 },
    Forced,
}

/// A handle to a managed heap.
///
/// Cloning the handle is cheap; every clone refers to the same heap.
#[derive(Clone)]
pub struct ManagedHeap {
    shared: Arc<HeapShared>,
}

/// A non-owning handle to a managed heap, for callbacks stored inside it.
#[derive(Clone)]
pub struct WeakManagedHeap {
    shared: Weak<HeapShared>,
}

impl WeakManagedHeap {
    /// Returns a strong handle if the heap is still alive.
    pub fn upgrade(&self) -> Option<ManagedHeap> {
        self.shared.upgrade().map(|shared| ManagedHeap { shared })
    }
}

impl fmt::Debug for WeakManagedHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakManagedHeap").finish_non_exhaustive()
    }
}

impl ManagedHeap {
    /// Creates an empty heap whose first cycle runs at `min_heap_bytes`.
    pub fn new(config: HeapConfig) -> Self {
        let state = HeapState {
            next_gc: config.min_heap_bytes,
            ..Default::default()
        };
        Self {
            shared: Arc::new(HeapShared {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Creates a non-owning handle.
    pub fn downgrade(&self) -> WeakManagedHeap {
        WeakManagedHeap {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Allocates a zero-initialised buffer of `size` bytes.
    ///
    /// Runs a collection cycle first if the allocation would push the heap
    /// past its next-cycle target. The zeroed pages are not necessarily
    /// backed by physical memory until written.
    pub fn alloc(&self, size: usize) -> ManagedBuffer {
        self.run_cycle(CycleKind::Paced {
            request: size as u64,
        });

        let storage = vec![0u8; size].into_boxed_slice();
        {
            let mut state = self.shared.lock();
            state.live_bytes = state.live_bytes.saturating_add(size as u64);
            state.live_objects += 1;
            state.total_alloc = state.total_alloc.saturating_add(size as u64);
            state.mallocs += 1;
        }

        ManagedBuffer {
            storage,
            finalizer: None,
            heap: Arc::downgrade(&self.shared),
        }
    }

    /// Runs a full collection cycle now.
    pub fn collect(&self) {
        self.run_cycle(CycleKind::Forced);
    }

    /// Captures the current heap statistics.
    pub fn snapshot(&self) -> HeapSnapshot {
        let process = allocator_stats();
        let state = self.shared.lock();
        HeapSnapshot {
            heap_alloc: state.heap_alloc(),
            heap_inuse: state.live_bytes,
            heap_unreclaimed: state.garbage_bytes,
            heap_objects: state.live_objects,
            total_alloc: state.total_alloc,
            mallocs: state.mallocs,
            frees: state.frees,
            next_gc: state.next_gc,
            num_gc: state.num_gc,
            num_forced_gc: state.num_forced_gc,
            pause_total_ns: state.pause_total_ns,
            last_pause_ns: state.last_pause_ns,
            last_gc_unix_nanos: state.last_gc_unix_nanos,
            process_current_bytes: process.current_bytes,
            process_peak_bytes: process.peak_bytes,
        }
    }

    /// Runs one cycle. Paced cycles are skipped when the request still fits
    /// under the target, which also absorbs racing allocators that all saw
    /// the same overshoot.
    ///
    /// Bookkeeping happens under the lock; releasing storage and running
    /// finalizers happens after it, since finalizers may allocate.
    fn run_cycle(&self, kind: CycleKind) -> bool {
        let started = Instant::now();
        let reclaimed = {
            let mut state = self.shared.lock();
            if let CycleKind::Paced { request } = kind {
                if state.heap_alloc().saturating_add(request) <= state.next_gc {
                    return false;
                }
            }

            let reclaimed = mem::take(&mut state.garbage);
            state.frees += reclaimed.len() as u64;
            state.garbage_bytes = 0;
            state.next_gc = self.shared.config.next_target(state.live_bytes);
            state.num_gc = state.num_gc.wrapping_add(1);
            if kind == CycleKind::Forced {
                state.num_forced_gc = state.num_forced_gc.wrapping_add(1);
            }
            reclaimed
        };

        let reclaimed_objects = reclaimed.len();
        let finalizers: Vec<Finalizer> = reclaimed
            .into_iter()
            .filter_map(|garbage| garbage.finalizer)
            .collect();

        let pause = started.elapsed();
        let next_gc = {
            let mut state = self.shared.lock();
            let pause_ns = u64::try_from(pause.as_nanos()).unwrap_or(u64::MAX);
            state.pause_total_ns = state.pause_total_ns.saturating_add(pause_ns);
            state.last_pause_ns = pause_ns;
            state.last_gc_unix_nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
                .unwrap_or(0);
            state.next_gc
        };

        log::trace!(
            "ManagedHeap: {:?} cycle reclaimed {} objects in {:?}, next target {} bytes",
            kind,
            reclaimed_objects,
            pause,
            next_gc
        );

        for finalizer in finalizers {
            finalizer();
        }
        true
    }
}

impl fmt::Debug for ManagedHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedHeap")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl HeapIntrospect for ManagedHeap {
    fn snapshot(&self) -> HeapSnapshot {
        ManagedHeap::snapshot(self)
    }
}

impl Collector for ManagedHeap {
    fn force_collection(&self) {
        self.collect();
    }
}

/// A byte buffer owned by a [`ManagedHeap`].
///
/// Dropping the buffer hands its storage back to the heap as garbage; the
/// memory stays allocated until a cycle reclaims it.
pub struct ManagedBuffer {
    storage: Box<[u8]>,
    finalizer: Option<Finalizer>,
    heap: Weak<HeapShared>,
}

impl ManagedBuffer {
    /// Attaches a one-shot callback run after a cycle reclaims this buffer.
    ///
    /// Replaces any previously attached finalizer. The callback never runs if
    /// the heap is gone by the time the buffer is dropped.
    pub fn set_finalizer(&mut self, finalizer: impl FnOnce() + Send + 'static) {
        self.finalizer = Some(Box::new(finalizer));
    }

    /// Writes `byte` into every position so each page is physically backed.
    pub fn fill_sentinel(&mut self, byte: u8) {
        self.storage.fill(byte);
    }

    /// Reads every byte back and returns the largest.
    pub fn max_byte(&self) -> u8 {
        self.storage.iter().copied().max().unwrap_or(0)
    }
}

impl Deref for ManagedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage
    }
}

impl DerefMut for ManagedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }
}

impl fmt::Debug for ManagedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedBuffer")
            .field("len", &self.storage.len())
            .field("has_finalizer", &self.finalizer.is_some())
            .finish()
    }
}

impl Drop for ManagedBuffer {
    fn drop(&mut self) {
        let storage = mem::take(&mut self.storage);
        let Some(shared) = self.heap.upgrade() else {
            return;
        };
        let size = storage.len() as u64;
        let mut state = shared.lock();
        state.live_bytes = state.live_bytes.saturating_sub(size);
        state.live_objects = state.live_objects.saturating_sub(1);
        state.garbage_bytes = state.garbage_bytes.saturating_add(size);
        state.garbage.push(Garbage {
            storage,
            finalizer: self.finalizer.take(),
        });
    }
}
