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

//! Compile-time defaults and configuration validation errors.
//!
//! Every tunable of the system is a constant here. Typed configuration structs
//! in the higher-level crates build their `Default` implementations from these
//! values and validate themselves into a [`ConfigError`].

use std::time::Duration;

/// One mebibyte, the unit used by the console status line.
pub const MIB: u64 = 1024 * 1024;

/// Size of one transient work item or one pool buffer.
pub const WORK_ITEM_SIZE: usize = 1024 * 1024;

/// Value written into every byte of a freshly allocated buffer so the
/// operating system has to back it with real pages.
pub const SENTINEL_BYTE: u8 = 12;

/// Soft limit used with the transient-item workload.
pub const TRANSIENT_SOFT_LIMIT: u64 = 280 * MIB;

/// Soft limit used with the persistent-pool workload.
pub const POOL_SOFT_LIMIT: u64 = 180 * MIB;

/// Interval between admission attempts of the transient-item workload.
///
/// 1000 items/s with an average hold of ~0.6 s keeps roughly 600 MiB in flight
/// when nothing throttles the producer.
pub const TRANSIENT_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Interval between decisions of the persistent-pool workload.
pub const POOL_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Shortest hold duration of a transient work item.
pub const HOLD_MIN: Duration = Duration::from_millis(20);

/// Longest hold duration of a transient work item.
pub const HOLD_MAX: Duration = Duration::from_millis(1200);

/// Delay between entering degraded mode and forcing a collection.
pub const RECOVERY_COOLDOWN: Duration = Duration::from_secs(2);

/// Probability that a pool tick frees a buffer instead of allocating one.
pub const POOL_FREE_PROBABILITY: f64 = 0.499;

/// Seed of the persistent-pool workload's random source.
pub const POOL_SEED: u64 = 0x6d65_6d67_6174_6501;

/// Interval of the live status line.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Interval of the polling telemetry provider.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Heap growth allowed between two collection cycles, in percent of the
/// bytes that survived the previous cycle.
pub const GC_PERCENT: u64 = 100;

/// Lower bound of the next-collection target.
pub const MIN_HEAP_BYTES: u64 = 4 * MIB;

/// Size of the short-lived sentinel allocation watched by the cycle detector.
pub const CYCLE_SENTINEL_SIZE: usize = 256;

/// Window over which state toggles are counted.
pub const FLAP_WINDOW: Duration = Duration::from_secs(1);

/// Toggles per second above which the controller reports flapping.
pub const FLAP_WARN_RATE: f32 = 4.0;

/// Upper bound on how long a blocked loop waits before re-checking shutdown.
pub const WAKE_INTERVAL: Duration = Duration::from_millis(50);

/// An invalid configuration value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A size that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroSize {
        /// The offending field.
        field: &'static str,
    },
    /// An interval that must be positive was zero.
    #[error("{field} must be a non-zero duration")]
    ZeroInterval {
        /// The offending field.
        field: &'static str,
    },
    /// The hold-duration range has its bounds inverted.
    #[error("hold range is inverted: min {min:?} > max {max:?}")]
    InvertedHoldRange {
        /// Configured lower bound.
        min: Duration,
        /// Configured upper bound.
        max: Duration,
    },
    /// A probability outside `[0, 1]`.
    #[error("{field} must lie in [0, 1], got {value}")]
    InvalidProbability {
        /// The offending field.
        field: &'static str,
        /// The configured value.
        value: f64,
    },
    /// An unrecognised name on the command line.
    #[error("unknown {kind} '{name}'")]
    UnknownName {
        /// What was being parsed (`workload`, `telemetry`, ...).
        kind: &'static str,
        /// The rejected input.
        name: String,
    },
}

/// Rejects zero sizes.
pub fn require_nonzero_size(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroSize { field });
    }
    Ok(())
}

/// Rejects zero intervals.
pub fn require_nonzero_interval(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::ZeroInterval { field });
    }
    Ok(())
}

/// Rejects probabilities outside `[0, 1]`, including NaN.
pub fn require_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidProbability { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_bounds() {
        assert!(require_probability("p", 0.0).is_ok());
        assert!(require_probability("p", 1.0).is_ok());
        assert!(require_probability("p", 1.5).is_err());
        assert!(require_probability("p", f64::NAN).is_err());
    }

    #[test]
    fn test_zero_checks() {
        assert_eq!(
            require_nonzero_size("item_size", 0),
            Err(ConfigError::ZeroSize { field: "item_size" })
        );
        assert!(require_nonzero_interval("tick", Duration::ZERO).is_err());
        assert!(require_nonzero_interval("tick", Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn test_error_messages_name_the_field() {
        let err = ConfigError::InvalidProbability {
            field: "free_probability",
            value: 2.0,
        };
        assert_eq!(err.to_string(), "free_probability must lie in [0, 1], got 2");
    }

    #[test]
    fn test_defaults_are_consistent() {
        assert!(HOLD_MIN <= HOLD_MAX);
        assert!(POOL_SOFT_LIMIT < TRANSIENT_SOFT_LIMIT);
        assert!(require_probability("free", POOL_FREE_PROBABILITY).is_ok());
    }
}
