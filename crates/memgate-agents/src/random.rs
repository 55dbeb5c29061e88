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

//! Seedable randomness for the workload drivers.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// The random source injected into the drivers.
///
/// ChaCha8 gives the same sequence for the same seed on every platform, so a
/// seeded scenario replays exactly.
pub type WorkloadRng = ChaCha8Rng;

/// A generator replaying the sequence of `seed`.
pub fn seeded(seed: u64) -> WorkloadRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// A generator seeded from the wall clock.
pub fn wall_clock_seeded() -> WorkloadRng {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    log::debug!("Workload RNG seeded from wall clock: {seed:#x}");
    seeded(seed)
}
