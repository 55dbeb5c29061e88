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

//! # Memgate Data
//!
//! The memory the control loop watches: a managed heap with deferred
//! reclamation and paced collection cycles, plus a tracking global allocator
//! for process-wide figures.

#![warn(missing_docs)]

pub mod allocators;
pub mod heap;

pub use allocators::TrackingAllocator;
pub use heap::{HeapConfig, ManagedBuffer, ManagedHeap, WeakManagedHeap};
