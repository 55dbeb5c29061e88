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

//! Collection pacing parameters.

use memgate_core::config::{GC_PERCENT, MIN_HEAP_BYTES};

/// Pacing configuration of a [`ManagedHeap`](super::ManagedHeap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Growth allowed between cycles, in percent of the bytes that survived
    /// the previous cycle.
    pub gc_percent: u64,
    /// Lower bound of the next-cycle target. Also the initial target.
    pub min_heap_bytes: u64,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            gc_percent: GC_PERCENT,
            min_heap_bytes: MIN_HEAP_BYTES,
        }
    }
}

impl HeapConfig {
    /// Computes the heap size at which the cycle after this one will run.
    pub fn next_target(&self, live_bytes: u64) -> u64 {
        let growth = live_bytes.saturating_mul(self.gc_percent) / 100;
        live_bytes.saturating_add(growth).max(self.min_heap_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgate_core::config::MIB;

    #[test]
    fn test_target_doubles_live_bytes_by_default() {
        let config = HeapConfig::default();
        assert_eq!(config.next_target(100 * MIB), 200 * MIB);
    }

    #[test]
    fn test_target_never_below_minimum() {
        let config = HeapConfig::default();
        assert_eq!(config.next_target(0), MIN_HEAP_BYTES);
        assert_eq!(config.next_target(MIB), MIN_HEAP_BYTES);
    }

    #[test]
    fn test_custom_percent() {
        let config = HeapConfig {
            gc_percent: 50,
            min_heap_bytes: 0,
        };
        assert_eq!(config.next_target(10 * MIB), 15 * MIB);
        assert_eq!(config.next_target(0), 0);
    }

    #[test]
    fn test_target_saturates() {
        let config = HeapConfig::default();
        assert_eq!(config.next_target(u64::MAX), u64::MAX);
    }
}
