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

//! An implementation of `GlobalAlloc` that maintains the process-wide
//! allocator counters.

use memgate_core::memory::*;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::Ordering;

/// A wrapper around a `GlobalAlloc` implementation that updates the counters
/// in `memgate_core::memory` on every call.
///
/// Registered as the `#[global_allocator]`, it lets every heap snapshot carry
/// the process-level byte counts next to the managed-heap statistics.
///
/// ```rust,ignore
/// use memgate_data::TrackingAllocator;
///
/// #[global_allocator]
/// static GLOBAL: TrackingAllocator = TrackingAllocator::new(std::alloc::System);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator<A = System> {
    inner: A,
}

impl<A> TrackingAllocator<A> {
    /// Creates a new tracking allocator that wraps the given inner allocator.
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

fn record_alloc(size: usize) {
    let result = CURRENTLY_ALLOCATED_BYTES.fetch_update(
        Ordering::Relaxed,
        Ordering::Relaxed,
        |current| current.checked_add(size),
    );
    if let Ok(previous) = result {
        PEAK_ALLOCATED_BYTES.fetch_max((previous + size) as u64, Ordering::Relaxed);
        TOTAL_ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        BYTES_ALLOCATED_LIFETIME.fetch_add(size as u64, Ordering::Relaxed);
    }
}

fn record_dealloc(size: usize) {
    let result = CURRENTLY_ALLOCATED_BYTES.fetch_update(
        Ordering::Relaxed,
        Ordering::Relaxed,
        |current| current.checked_sub(size),
    );
    if result.is_ok() {
        TOTAL_DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
        BYTES_DEALLOCATED_LIFETIME.fetch_add(size as u64, Ordering::Relaxed);
    }
}

// Logging from inside the global allocator would allocate and recurse, so
// counter overflow is silently skipped here rather than reported.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    /// # Safety
    ///
    /// Same contract as [`GlobalAlloc::alloc`].
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    /// # Safety
    ///
    /// Same contract as [`GlobalAlloc::dealloc`].
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        record_dealloc(layout.size());
        self.inner.dealloc(ptr, layout);
    }

    /// # Safety
    ///
    /// Same contract as [`GlobalAlloc::alloc_zeroed`].
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    /// # Safety
    ///
    /// Same contract as [`GlobalAlloc::realloc`].
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let old_size = layout.size();
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            match new_size.cmp(&old_size) {
                std::cmp::Ordering::Greater => {
                    let grown = new_size - old_size;
                    let result = CURRENTLY_ALLOCATED_BYTES.fetch_update(
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                        |current| current.checked_add(grown),
                    );
                    if let Ok(previous) = result {
                        PEAK_ALLOCATED_BYTES
                            .fetch_max((previous + grown) as u64, Ordering::Relaxed);
                        BYTES_ALLOCATED_LIFETIME.fetch_add(grown as u64, Ordering::Relaxed);
                    }
                }
                std::cmp::Ordering::Less => {
                    let shrunk = old_size - new_size;
                    let result = CURRENTLY_ALLOCATED_BYTES.fetch_update(
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                        |current| current.checked_sub(shrunk),
                    );
                    if result.is_ok() {
                        BYTES_DEALLOCATED_LIFETIME.fetch_add(shrunk as u64, Ordering::Relaxed);
                    }
                }
                std::cmp::Ordering::Equal => {}
            }
        }
        new_ptr
    }
}
