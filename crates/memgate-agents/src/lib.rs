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

//! # Memgate Agents
//!
//! Workload drivers producing memory pressure against a managed heap. Every
//! driver consults the admission gate immediately before committing memory
//! and simply skips the tick while the process is degraded.

#![warn(missing_docs)]

pub mod driver;
pub mod policy;
pub mod pool;
pub mod random;
pub mod transient;

pub use driver::{drive, DriveSummary, TickOutcome, WorkloadDriver};
pub use policy::WorkloadPolicy;
pub use pool::{BufferPool, PoolConfig, PoolDriver};
pub use random::WorkloadRng;
pub use transient::{TransientConfig, TransientDriver, WorkItem};
