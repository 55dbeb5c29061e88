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

//! State and event types of the degradation control loop.

use std::fmt;
use std::time::Instant;

/// Whether new work may currently be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DegradationState {
    /// The projected heap size is at or below the soft limit.
    #[default]
    Normal = 0,
    /// The projected heap size exceeds the soft limit; admission is suspended.
    Degraded = 1,
}

impl DegradationState {
    /// Returns the raw representation stored in the shared atomic.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a value previously produced by [`as_u8`](Self::as_u8).
    ///
    /// Any non-zero value reads as `Degraded`.
    pub const fn from_u8(raw: u8) -> Self {
        if raw == 0 {
            Self::Normal
        } else {
            Self::Degraded
        }
    }
}

impl fmt::Display for DegradationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Degraded => f.write_str("degraded"),
        }
    }
}

/// A state change decided by the controller for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `Normal → Degraded`.
    EnteredDegraded {
        /// The projected next-collection size that crossed the limit.
        projected_bytes: u64,
    },
    /// `Degraded → Normal`.
    Recovered {
        /// The projected next-collection size that fell back under the limit.
        projected_bytes: u64,
    },
}

impl Transition {
    /// The state the transition leads to.
    pub fn target(&self) -> DegradationState {
        match self {
            Self::EnteredDegraded { .. } => DegradationState::Degraded,
            Self::Recovered { .. } => DegradationState::Normal,
        }
    }
}

/// Signal sent from the controller to the recovery trigger on `Normal → Degraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradedEntry {
    /// When the controller committed the transition.
    pub entered_at: Instant,
    /// The projected next-collection size that caused it.
    pub projected_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_raw_round_trip() {
        assert_eq!(
            DegradationState::from_u8(DegradationState::Degraded.as_u8()),
            DegradationState::Degraded
        );
        assert_eq!(DegradationState::from_u8(0), DegradationState::Normal);
        assert_eq!(DegradationState::from_u8(7), DegradationState::Degraded);
    }

    #[test]
    fn test_transition_target() {
        let entered = Transition::EnteredDegraded { projected_bytes: 1 };
        let recovered = Transition::Recovered { projected_bytes: 0 };
        assert_eq!(entered.target(), DegradationState::Degraded);
        assert_eq!(recovered.target(), DegradationState::Normal);
    }
}
