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

//! # Memgate Core
//!
//! Foundational crate containing the shared types, signalling primitives, and
//! interface contracts of the memory-pressure admission controller.
//!
//! Higher-level crates build on these contracts: `memgate-data` provides the
//! managed heap that implements [`HeapIntrospect`] and [`Collector`],
//! `memgate-telemetry` provides the [`MemoryTelemetryProvider`] implementations,
//! and `memgate-control` runs the degradation control loop over a shared
//! [`DegradationContext`].

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod control;
pub mod counters;
pub mod memory;
pub mod signal;
pub mod telemetry;

pub use context::DegradationContext;
pub use control::{DegradationState, DegradedEntry, Transition};
pub use counters::WorkCounters;
pub use telemetry::{Collector, CycleEdge, HeapIntrospect, HeapSnapshot, MemoryTelemetryProvider};
