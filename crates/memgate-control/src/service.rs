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

//! The service running the controller and recovery loops.

use crate::controller::DegradationController;
use crate::gate::AdmissionGate;
use crate::recovery::RecoveryTrigger;
use memgate_core::config::{
    require_nonzero_interval, require_nonzero_size, ConfigError, FLAP_WARN_RATE, FLAP_WINDOW,
    RECOVERY_COOLDOWN, TRANSIENT_SOFT_LIMIT, WAKE_INTERVAL,
};
use memgate_core::signal::coalescing;
use memgate_core::telemetry::{Collector, MemoryTelemetryProvider};
use memgate_core::DegradationContext;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Configuration of the degradation control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlConfig {
    /// Projected next-collection size above which admission is suspended.
    pub soft_limit: u64,
    /// Delay between a degraded entry and the forced collection.
    pub cooldown: Duration,
    /// Longest time a loop blocks before re-checking shutdown.
    pub wake_interval: Duration,
    /// Window of the toggle-rate metric.
    pub flap_window: Duration,
    /// Toggles per second above which flapping is reported.
    pub flap_warn_rate: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            soft_limit: TRANSIENT_SOFT_LIMIT,
            cooldown: RECOVERY_COOLDOWN,
            wake_interval: WAKE_INTERVAL,
            flap_window: FLAP_WINDOW,
            flap_warn_rate: FLAP_WARN_RATE,
        }
    }
}

impl ControlConfig {
    /// Default configuration with a different soft limit.
    pub fn for_soft_limit(soft_limit: u64) -> Self {
        Self {
            soft_limit,
            ..Self::default()
        }
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero_size("soft limit", self.soft_limit)?;
        require_nonzero_interval("wake interval", self.wake_interval)?;
        require_nonzero_interval("flap window", self.flap_window)
    }
}

/// Runs the degradation control loop on background threads.
///
/// `start` spawns the controller and the recovery trigger, wired together by
/// a single-slot coalescing channel. `stop` clears the shared running flag
/// and joins both threads. Dropping the service stops it.
pub struct GateService {
    config: ControlConfig,
    context: Arc<DegradationContext>,
    provider: Arc<dyn MemoryTelemetryProvider>,
    collector: Arc<dyn Collector>,
    controller: Option<thread::JoinHandle<io::Result<()>>>,
    recovery: Option<thread::JoinHandle<()>>,
}

impl GateService {
    /// Creates a stopped service.
    pub fn new(
        config: ControlConfig,
        context: Arc<DegradationContext>,
        provider: Arc<dyn MemoryTelemetryProvider>,
        collector: Arc<dyn Collector>,
    ) -> Self {
        Self {
            config,
            context,
            provider,
            collector,
            controller: None,
            recovery: None,
        }
    }

    /// A gate over the service's context.
    pub fn gate(&self) -> AdmissionGate {
        AdmissionGate::new(Arc::clone(&self.context))
    }

    /// Returns `true` while the loops are running.
    pub fn is_running(&self) -> bool {
        self.controller.is_some() && self.context.is_running()
    }

    /// Starts the loops, printing transition markers to stdout.
    pub fn start(&mut self) -> io::Result<()> {
        self.start_with_output(Box::new(io::stdout()))
    }

    /// Starts the loops, printing transition markers to `out`.
    pub fn start_with_output(&mut self, mut out: Box<dyn Write + Send>) -> io::Result<()> {
        if self.controller.is_some() {
            return Ok(());
        }

        let (entry_tx, entry_rx) = coalescing();

        let trigger = RecoveryTrigger::new(
            Arc::clone(&self.context),
            Arc::clone(&self.collector),
            self.config.cooldown,
            self.config.wake_interval,
        );
        let recovery = thread::Builder::new()
            .name("memgate-recovery".into())
            .spawn(move || trigger.run(entry_rx))?;

        let controller = DegradationController::new(Arc::clone(&self.context), &self.config, entry_tx);
        let provider = Arc::clone(&self.provider);
        let spawned = thread::Builder::new()
            .name("memgate-controller".into())
            .spawn(move || controller.run(provider, out.as_mut()));
        let controller = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.context.stop();
                let _ = recovery.join();
                return Err(e);
            }
        };

        self.recovery = Some(recovery);
        self.controller = Some(controller);
        log::info!("Gate service started.");
        Ok(())
    }

    /// Stops the loops and waits for them to exit.
    ///
    /// Returns the controller's marker-output error, if it had one.
    pub fn stop(&mut self) -> io::Result<()> {
        self.context.stop();
        let mut result = Ok(());
        if let Some(handle) = self.controller.take() {
            match handle.join() {
                Ok(outcome) => result = outcome,
                Err(_) => log::error!("Gate service: controller thread panicked."),
            }
        }
        if let Some(handle) = self.recovery.take() {
            if handle.join().is_err() {
                log::error!("Gate service: recovery thread panicked.");
            }
        }
        result
    }
}

impl Drop for GateService {
    fn drop(&mut self) {
        if self.controller.is_some() || self.recovery.is_some() {
            if let Err(e) = self.stop() {
                log::error!("Gate service stopped with error: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ControlConfig::default().validate().is_ok());
        assert_eq!(ControlConfig::default().soft_limit, TRANSIENT_SOFT_LIMIT);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert_eq!(
            ControlConfig::for_soft_limit(0).validate(),
            Err(ConfigError::ZeroSize {
                field: "soft limit"
            })
        );
    }

    #[test]
    fn test_zero_wake_interval_is_rejected() {
        let config = ControlConfig {
            wake_interval: Duration::ZERO,
            ..ControlConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
