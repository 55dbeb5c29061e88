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

//! Process-wide allocator counters.
//!
//! This module defines the counters a registered global allocator is expected
//! to maintain. The tracking allocator in `memgate-data` increments them on
//! every allocation; heap snapshots read them so each snapshot also carries the
//! process-level picture next to the managed-heap figures.
//!
//! Without a tracking allocator installed every counter simply stays at zero.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Bytes currently allocated through the registered global allocator.
pub static CURRENTLY_ALLOCATED_BYTES: AtomicUsize = AtomicUsize::new(0);

/// The highest value [`CURRENTLY_ALLOCATED_BYTES`] ever reached.
pub static PEAK_ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);

/// Number of allocation calls.
pub static TOTAL_ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Number of deallocation calls.
pub static TOTAL_DEALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Cumulative bytes ever allocated.
pub static BYTES_ALLOCATED_LIFETIME: AtomicU64 = AtomicU64::new(0);

/// Cumulative bytes ever deallocated.
pub static BYTES_DEALLOCATED_LIFETIME: AtomicU64 = AtomicU64::new(0);

/// A relaxed, point-in-time read of the allocator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes currently in use.
    pub current_bytes: u64,
    /// Highest simultaneous usage seen.
    pub peak_bytes: u64,
    /// Allocation calls so far.
    pub allocations: u64,
    /// Deallocation calls so far.
    pub deallocations: u64,
    /// Bytes ever allocated.
    pub bytes_allocated_lifetime: u64,
    /// Bytes ever deallocated.
    pub bytes_deallocated_lifetime: u64,
}

impl AllocatorStats {
    /// Allocations not yet matched by a deallocation.
    pub fn live_allocations(&self) -> u64 {
        self.allocations.saturating_sub(self.deallocations)
    }
}

/// Reads every allocator counter.
///
/// The counters are read one by one with `Ordering::Relaxed`, so under
/// concurrent allocation the fields may be mutually inconsistent by a few
/// in-flight operations.
pub fn allocator_stats() -> AllocatorStats {
    AllocatorStats {
        current_bytes: CURRENTLY_ALLOCATED_BYTES.load(Ordering::Relaxed) as u64,
        peak_bytes: PEAK_ALLOCATED_BYTES.load(Ordering::Relaxed),
        allocations: TOTAL_ALLOCATIONS.load(Ordering::Relaxed),
        deallocations: TOTAL_DEALLOCATIONS.load(Ordering::Relaxed),
        bytes_allocated_lifetime: BYTES_ALLOCATED_LIFETIME.load(Ordering::Relaxed),
        bytes_deallocated_lifetime: BYTES_DEALLOCATED_LIFETIME.load(Ordering::Relaxed),
    }
}
