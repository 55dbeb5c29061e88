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

// memgate
// Runs a synthetic workload against the managed heap, throttled by the
// degradation control loop.
//
// Usage: memgate [transient|pool] [callback|polling]

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use memgate_agents::{
    drive, PoolConfig, PoolDriver, TransientConfig, TransientDriver, WorkloadDriver,
    WorkloadPolicy,
};
use memgate_control::{ControlConfig, GateService};
use memgate_core::telemetry::MemoryTelemetryProvider;
use memgate_core::DegradationContext;
use memgate_data::{HeapConfig, ManagedHeap, TrackingAllocator};
use memgate_telemetry::{
    CycleCallbackProvider, LiveReporter, PollingProvider, ReporterConfig, TelemetryMode,
};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator::new(std::alloc::System);

fn telemetry(mode: TelemetryMode, heap: &ManagedHeap) -> Result<Arc<dyn MemoryTelemetryProvider>> {
    Ok(match mode {
        TelemetryMode::Callback => Arc::new(CycleCallbackProvider::new(heap.clone())),
        TelemetryMode::Polling => {
            let mut provider = PollingProvider::with_default_interval(Arc::new(heap.clone()));
            provider
                .start()
                .context("failed to start the polling provider")?;
            Arc::new(provider)
        }
    })
}

fn workload(
    policy: WorkloadPolicy,
    heap: &ManagedHeap,
    service: &GateService,
    context: &Arc<DegradationContext>,
) -> Result<Box<dyn WorkloadDriver>> {
    Ok(match policy {
        WorkloadPolicy::Transient => Box::new(
            TransientDriver::new(
                TransientConfig::default(),
                heap.clone(),
                service.gate(),
                Arc::clone(context),
            )
            .context("invalid transient workload configuration")?,
        ),
        WorkloadPolicy::Pool => Box::new(
            PoolDriver::new(
                PoolConfig::default(),
                heap.clone(),
                service.gate(),
                Arc::clone(context),
            )
            .context("invalid pool workload configuration")?,
        ),
    })
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let policy: WorkloadPolicy = args
        .next()
        .map(|arg| arg.parse())
        .transpose()
        .context("failed to parse the workload policy")?
        .unwrap_or_default();
    let mode: TelemetryMode = args
        .next()
        .map(|arg| arg.parse())
        .transpose()
        .context("failed to parse the telemetry mode")?
        .unwrap_or_default();
    log::info!("Starting memgate: workload '{policy}', telemetry {mode:?}.");

    let heap = ManagedHeap::new(HeapConfig::default());
    let context = Arc::new(DegradationContext::new());
    let provider = telemetry(mode, &heap)?;

    let control = ControlConfig::for_soft_limit(policy.default_soft_limit());
    control
        .validate()
        .context("invalid control configuration")?;
    let mut service = GateService::new(
        control,
        Arc::clone(&context),
        provider,
        Arc::new(heap.clone()),
    );
    service.start().context("failed to start the gate service")?;

    let reporter_config = ReporterConfig::default();
    reporter_config
        .validate()
        .context("invalid reporter configuration")?;
    let reporter = LiveReporter::new(reporter_config)
        .spawn(Arc::clone(&context), Box::new(io::stdout()))
        .context("failed to spawn the live reporter")?;

    let mut driver = workload(policy, &heap, &service, &context)?;
    let driven = drive(driver.as_mut(), &context, None);

    // The workload only returns once something stopped the context or a
    // tick failed; make sure every loop winds down either way.
    context.stop();
    driver.wait_idle();
    let markers = service.stop();
    let reported = reporter
        .join()
        .map_err(|_| anyhow::anyhow!("live reporter panicked"))?;

    driven.context("workload failed")?;
    markers.context("transition marker output failed")?;
    reported.context("status output failed")?;
    log::info!("memgate stopped.");
    Ok(())
}
