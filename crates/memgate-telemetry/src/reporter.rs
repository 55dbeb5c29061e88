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

//! Periodic console status line.

use memgate_core::config::{ConfigError, MIB, REPORT_INTERVAL};
use memgate_core::DegradationContext;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Configuration of the [`LiveReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Delay between two status lines.
    pub interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: REPORT_INTERVAL,
        }
    }
}

impl ReporterConfig {
    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        memgate_core::config::require_nonzero_interval("report interval", self.interval)
    }
}

/// Formats one status line: outstanding memory in whole mebibytes and the
/// number of completed work items.
pub fn format_status(outstanding_bytes: u64, completed: u64) -> String {
    format!("  Total: {}M (done: {})", outstanding_bytes / MIB, completed)
}

/// Writes the work counters to a sink on a fixed interval.
///
/// The reporter only reads the atomic counters of the shared context. A write
/// failure stops the whole context: the reporter is the diagnostic output of
/// the process, so losing it is fatal.
#[derive(Debug, Clone, Copy)]
pub struct LiveReporter {
    config: ReporterConfig,
}

impl LiveReporter {
    /// Creates a reporter.
    pub fn new(config: ReporterConfig) -> Self {
        Self { config }
    }

    /// Writes one status line.
    pub fn report_once(&self, out: &mut dyn Write, context: &DegradationContext) -> io::Result<()> {
        let counters = context.counters();
        writeln!(
            out,
            "{}",
            format_status(counters.outstanding_bytes(), counters.completed_count())
        )?;
        out.flush()
    }

    /// Reports until the context stops or a write fails.
    pub fn run(&self, out: &mut dyn Write, context: &DegradationContext) -> io::Result<()> {
        while context.is_running() {
            if let Err(e) = self.report_once(out, context) {
                log::error!("LiveReporter: status output failed: {e}. Stopping.");
                context.stop();
                return Err(e);
            }
            context.sleep_while_running(self.config.interval);
        }
        Ok(())
    }

    /// Runs the reporter on its own thread.
    pub fn spawn(
        self,
        context: Arc<DegradationContext>,
        mut out: Box<dyn Write + Send>,
    ) -> io::Result<thread::JoinHandle<io::Result<()>>> {
        thread::Builder::new()
            .name("memgate-reporter".into())
            .spawn(move || self.run(out.as_mut(), &context))
    }
}

impl Default for LiveReporter {
    fn default() -> Self {
        Self::new(ReporterConfig::default())
    }
}
