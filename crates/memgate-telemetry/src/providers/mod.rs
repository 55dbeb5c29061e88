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

//! Implementations of [`MemoryTelemetryProvider`](memgate_core::MemoryTelemetryProvider).

mod callback;
mod polling;
mod scripted;

pub use callback::CycleCallbackProvider;
pub use polling::{EdgeDetector, PollingProvider};
pub use scripted::ScriptedTelemetry;

use memgate_core::config::ConfigError;
use std::str::FromStr;

/// How collection cycles are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryMode {
    /// A finalizer re-armed on a sentinel allocation after every cycle.
    #[default]
    Callback,
    /// A thread comparing the cycle count on a fixed interval.
    Polling,
}

impl FromStr for TelemetryMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "callback" => Ok(Self::Callback),
            "polling" | "poll" => Ok(Self::Polling),
            _ => Err(ConfigError::UnknownName {
                kind: "telemetry mode",
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("callback".parse(), Ok(TelemetryMode::Callback));
        assert_eq!("Polling".parse(), Ok(TelemetryMode::Polling));
        assert!("gossip".parse::<TelemetryMode>().is_err());
    }
}
