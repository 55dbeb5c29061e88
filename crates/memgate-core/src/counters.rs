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

//! Work accounting shared between the workload drivers and the live reporter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide work counters.
///
/// `outstanding_bytes` tracks the sum of live work allocations and
/// `completed_count` the number of finished units. Both are plain atomics: the
/// drivers are the only writers and the reporter only reads.
#[derive(Debug, Default)]
pub struct WorkCounters {
    outstanding_bytes: AtomicU64,
    completed_count: AtomicU64,
}

impl WorkCounters {
    /// Creates zeroed counters.
    pub const fn new() -> Self {
        Self {
            outstanding_bytes: AtomicU64::new(0),
            completed_count: AtomicU64::new(0),
        }
    }

    /// Accounts for `bytes` of newly admitted work.
    pub fn reserve(&self, bytes: u64) {
        let result = self
            .outstanding_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(bytes)
            });
        if result.is_err() {
            log::error!("Outstanding byte counter overflowed on reserve! Size: {bytes}");
        }
    }

    /// Returns `bytes` of finished or freed work.
    ///
    /// The counter never goes below zero: a release larger than the current
    /// value is refused, logged, and reported as `false`.
    pub fn release(&self, bytes: u64) -> bool {
        let result = self
            .outstanding_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(bytes)
            });
        if result.is_err() {
            log::error!("Outstanding byte counter underflowed on release! Size: {bytes}");
            return false;
        }
        true
    }

    /// Counts one finished unit of work.
    pub fn mark_completed(&self) {
        self.completed_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Bytes currently held by live work.
    pub fn outstanding_bytes(&self) -> u64 {
        self.outstanding_bytes.load(Ordering::SeqCst)
    }

    /// Units of work finished so far.
    pub fn completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::SeqCst)
    }
}
