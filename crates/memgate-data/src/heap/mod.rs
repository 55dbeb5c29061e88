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

//! A managed heap with deferred reclamation.
//!
//! Buffers handed out by [`ManagedHeap`] are not freed when their owner drops
//! them. They become unreclaimed garbage until the next collection cycle,
//! exactly like objects in a collecting runtime. Cycles are paced: one runs
//! whenever an allocation would push the heap past the current next-cycle
//! target, and the target is recomputed from the surviving bytes after each
//! cycle. Cycles can also be forced.
//!
//! Buffers may carry a one-shot finalizer that runs after a cycle reclaims
//! them. The cycle-callback telemetry provider builds its edge detector on
//! this.

mod config;
mod managed;

pub use config::HeapConfig;
pub use managed::{ManagedBuffer, ManagedHeap, WeakManagedHeap};
