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

//! Cycle detection by polling the cycle counter.

use memgate_core::config::POLL_INTERVAL;
use memgate_core::signal::{coalescing, CoalescingReceiver, CoalescingSender};
use memgate_core::telemetry::{CycleEdge, HeapIntrospect, HeapSnapshot, MemoryTelemetryProvider};
use std::borrow::Cow;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Turns successive snapshots into edges: an edge is any change of the
/// cumulative cycle count since the previous observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeDetector {
    last_num_gc: u32,
}

impl EdgeDetector {
    /// Starts from the cycle count of `baseline`.
    pub fn new(baseline: &HeapSnapshot) -> Self {
        Self {
            last_num_gc: baseline.num_gc,
        }
    }

    /// Returns `true` if at least one cycle completed since the last call.
    pub fn observe(&mut self, snapshot: &HeapSnapshot) -> bool {
        if snapshot.num_gc == self.last_num_gc {
            return false;
        }
        self.last_num_gc = snapshot.num_gc;
        true
    }
}

/// A portable provider that samples the heap on a fixed interval.
///
/// Several cycles between two polls collapse into one edge, and detection
/// lags a cycle by up to one interval.
pub struct PollingProvider {
    source: Arc<dyn HeapIntrospect>,
    interval: Duration,
    sender: CoalescingSender<CycleEdge>,
    receiver: CoalescingReceiver<CycleEdge>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PollingProvider {
    /// Creates a stopped provider sampling `source` every `interval`.
    pub fn new(source: Arc<dyn HeapIntrospect>, interval: Duration) -> Self {
        let (sender, receiver) = coalescing();
        Self {
            source,
            interval,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Creates a stopped provider with the default poll interval.
    pub fn with_default_interval(source: Arc<dyn HeapIntrospect>) -> Self {
        Self::new(source, POLL_INTERVAL)
    }

    /// Starts the polling thread. Does nothing if already running.
    pub fn start(&mut self) -> io::Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let interval = self.interval;
        let mut detector = EdgeDetector::new(&source.snapshot());

        let spawned = thread::Builder::new()
            .name("memgate-telemetry-poll".into())
            .spawn(move || {
                log::info!("PollingProvider thread started (interval {:?}).", interval);

                while running.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    if detector.observe(&source.snapshot()) {
                        sender.notify(CycleEdge);
                    }
                }
                log::info!("PollingProvider thread stopped.");
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Stops the polling thread and waits for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl MemoryTelemetryProvider for PollingProvider {
    fn provider_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("polling")
    }

    fn snapshot(&self) -> HeapSnapshot {
        self.source.snapshot()
    }

    fn cycle_edges(&self) -> CoalescingReceiver<CycleEdge> {
        self.receiver.clone()
    }
}

impl Drop for PollingProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memgate_data::{HeapConfig, ManagedHeap};
    use std::time::Instant;

    #[test]
    fn test_detector_fires_on_count_change_only() {
        let mut detector = EdgeDetector::new(&HeapSnapshot::default());
        let mut snapshot = HeapSnapshot::default();
        assert!(!detector.observe(&snapshot));

        snapshot.num_gc = 3;
        assert!(detector.observe(&snapshot));
        assert!(!detector.observe(&snapshot));

        // Wrapping counters still register as a change.
        snapshot.num_gc = 0;
        assert!(detector.observe(&snapshot));
    }

    #[test]
    fn test_polling_thread_reports_cycles() {
        let heap = ManagedHeap::new(HeapConfig::default());
        let mut provider =
            PollingProvider::new(Arc::new(heap.clone()), Duration::from_millis(5));
        let edges = provider.cycle_edges();
        provider.start().unwrap();

        heap.collect();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while Instant::now() < deadline {
            if edges.recv_timeout(Duration::from_millis(50)).is_ok() {
                seen = true;
                break;
            }
        }
        provider.stop();
        assert!(seen, "a forced cycle should be observed by the poller");
    }

    #[test]
    fn test_quiet_heap_produces_no_edges() {
        let heap = ManagedHeap::new(HeapConfig::default());
        let mut provider =
            PollingProvider::new(Arc::new(heap.clone()), Duration::from_millis(5));
        let edges = provider.cycle_edges();
        provider.start().unwrap();

        thread::sleep(Duration::from_millis(50));
        provider.stop();
        assert!(!edges.is_pending());
    }
}
