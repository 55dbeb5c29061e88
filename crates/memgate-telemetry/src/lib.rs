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

//! # Memgate Telemetry
//!
//! Providers that turn the managed heap's collection cycles into
//! edge-triggered notifications, and the live console reporter.

#![warn(missing_docs)]

pub mod providers;
pub mod reporter;

pub use providers::{
    CycleCallbackProvider, EdgeDetector, PollingProvider, ScriptedTelemetry, TelemetryMode,
};
pub use reporter::{format_status, LiveReporter, ReporterConfig};
