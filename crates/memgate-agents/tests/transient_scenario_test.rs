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

use memgate_agents::random::seeded;
use memgate_agents::{TickOutcome, TransientConfig, TransientDriver, WorkloadDriver};
use memgate_control::{ControlConfig, GateService};
use memgate_core::config::MIB;
use memgate_core::DegradationContext;
use memgate_data::{HeapConfig, ManagedHeap};
use memgate_telemetry::CycleCallbackProvider;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(10);
const HOLD: Duration = Duration::from_millis(400);

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_limit_below_one_item_admits_one_at_a_time() {
    // No minimum target: the projected size follows the live bytes exactly.
    let heap = ManagedHeap::new(HeapConfig {
        gc_percent: 100,
        min_heap_bytes: 0,
    });
    let context = Arc::new(DegradationContext::new());
    let provider = Arc::new(CycleCallbackProvider::new(heap.clone()));

    // The cooldown is long enough that only the test forces cycles.
    let config = ControlConfig {
        cooldown: Duration::from_secs(60),
        wake_interval: Duration::from_millis(10),
        ..ControlConfig::for_soft_limit(MIB / 2)
    };
    let mut service = GateService::new(
        config,
        Arc::clone(&context),
        provider,
        Arc::new(heap.clone()),
    );
    service
        .start_with_output(Box::new(io::sink()))
        .expect("service should start");

    let mut driver = TransientDriver::with_rng(
        TransientConfig {
            item_size: MIB as usize,
            tick_interval: Duration::from_millis(1),
            hold_min: HOLD,
            hold_max: HOLD,
        },
        heap.clone(),
        service.gate(),
        Arc::clone(&context),
        seeded(9),
    )
    .expect("transient config should be valid");
    let counters = context.counters();

    assert_eq!(driver.tick().unwrap(), TickOutcome::Admitted);
    assert_eq!(counters.outstanding_bytes(), MIB);

    // The item's buffer is live; the next cycle projects past the limit.
    wait_until("item allocation", || heap.snapshot().heap_inuse >= MIB);
    heap.collect();
    wait_until("degraded state", || context.is_degraded());

    while counters.completed_count() == 0 {
        assert_eq!(
            driver.tick().unwrap(),
            TickOutcome::Skipped,
            "second item admitted while the first is still held"
        );
        thread::sleep(Duration::from_millis(5));
    }

    // Completion alone does not reopen the gate: the buffer is garbage until
    // a cycle reclaims it.
    for _ in 0..5 {
        assert_eq!(driver.tick().unwrap(), TickOutcome::Skipped);
    }
    assert_eq!(counters.outstanding_bytes(), 0);

    heap.collect();
    wait_until("normal state", || !context.is_degraded());
    assert_eq!(driver.tick().unwrap(), TickOutcome::Admitted);

    driver.wait_idle();
    assert_eq!(counters.outstanding_bytes(), 0);
    assert_eq!(counters.completed_count(), 2);
    assert_eq!(context.transition_count(), 2);
    service.stop().expect("marker output should not fail");
}
