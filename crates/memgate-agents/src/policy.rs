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

//! Selection of the workload policy at startup.

use memgate_core::config::{ConfigError, POOL_SOFT_LIMIT, TRANSIENT_SOFT_LIMIT};
use std::fmt;
use std::str::FromStr;

/// The workload run by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkloadPolicy {
    /// Independent allocate/hold/release items.
    #[default]
    Transient,
    /// A persistent pool growing and shrinking at random.
    Pool,
}

impl WorkloadPolicy {
    /// The soft limit tuned for this workload.
    pub fn default_soft_limit(self) -> u64 {
        match self {
            Self::Transient => TRANSIENT_SOFT_LIMIT,
            Self::Pool => POOL_SOFT_LIMIT,
        }
    }

    /// The name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Pool => "pool",
        }
    }
}

impl fmt::Display for WorkloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkloadPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transient" => Ok(Self::Transient),
            "pool" => Ok(Self::Pool),
            _ => Err(ConfigError::UnknownName {
                kind: "workload",
                name: s.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies() {
        assert_eq!("transient".parse(), Ok(WorkloadPolicy::Transient));
        assert_eq!("Pool".parse(), Ok(WorkloadPolicy::Pool));
        assert!("heap".parse::<WorkloadPolicy>().is_err());
        assert_eq!(WorkloadPolicy::default(), WorkloadPolicy::Transient);
    }

    #[test]
    fn test_per_policy_limits() {
        assert_eq!(WorkloadPolicy::Transient.default_soft_limit(), TRANSIENT_SOFT_LIMIT);
        assert_eq!(WorkloadPolicy::Pool.default_soft_limit(), POOL_SOFT_LIMIT);
    }
}
