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

//! # Memgate Control
//!
//! The degradation control loop: a controller that turns heap snapshots into
//! `Normal`/`Degraded` transitions, a recovery trigger that forces collection
//! after entering degraded mode, the admission gate read by the workload, and
//! the service that runs the loops.

#![warn(missing_docs)]

pub mod controller;
pub mod gate;
pub mod metrics;
pub mod recovery;
pub mod service;

pub use controller::{DegradationController, DEGRADED_MARKER, RECOVERED_MARKER};
pub use gate::AdmissionGate;
pub use recovery::RecoveryTrigger;
pub use service::{ControlConfig, GateService};
