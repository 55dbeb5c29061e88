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

//! Rolling storage for the flapping metric.

use std::time::{Duration, Instant};

/// The last `N` values pushed, oldest first.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    slots: [T; N],
    next: usize,
    len: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            slots: [T::default(); N],
            next: 0,
            len: 0,
        }
    }

    /// Appends `value`, evicting the oldest value once full.
    pub fn push(&mut self, value: T) {
        self.slots[self.next] = value;
        self.next = (self.next + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    /// Values currently held.
    pub fn count(&self) -> usize {
        self.len
    }

    /// Iterates from the oldest value to the newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // Until the buffer wraps, the oldest value sits in slot 0.
        let oldest = if self.len < N { 0 } else { self.next };
        (0..self.len).map(move |offset| &self.slots[(oldest + offset) % N])
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Capacity of the transition history. Rates above `TOGGLE_HISTORY` per
/// window are reported as exactly that many.
const TOGGLE_HISTORY: usize = 64;

/// Measures how often the degradation state toggles.
///
/// The level trigger has no hysteresis, so a projected heap size hovering at
/// the soft limit makes the state flip on every cycle. The tracker keeps the
/// timestamps of recent transitions and reports transitions per second over a
/// sliding window.
#[derive(Debug, Clone)]
pub struct ToggleRateTracker {
    origin: Instant,
    window: Duration,
    stamps: RingBuffer<f64, TOGGLE_HISTORY>,
}

impl ToggleRateTracker {
    /// Creates a tracker averaging over `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            origin: Instant::now(),
            window,
            stamps: RingBuffer::new(),
        }
    }

    /// Records a transition at `at` and returns the current rate.
    pub fn record(&mut self, at: Instant) -> f32 {
        self.stamps
            .push(at.saturating_duration_since(self.origin).as_secs_f64());
        self.rate_at(at)
    }

    /// Transitions per second within the window ending at `now`.
    pub fn rate_at(&self, now: Instant) -> f32 {
        let window = self.window.as_secs_f64();
        if window <= 0.0 {
            return 0.0;
        }
        let now = now.saturating_duration_since(self.origin).as_secs_f64();
        let recent = self
            .stamps
            .iter()
            .filter(|stamp| now - **stamp <= window)
            .count();
        (recent as f64 / window) as f32
    }

    /// Transitions recorded so far, capped at the history size.
    pub fn recorded(&self) -> usize {
        self.stamps.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_wraps_in_chronological_order() {
        let mut rb = RingBuffer::<u32, 3>::new();
        rb.push(1);
        rb.push(2);
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        rb.push(3);
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        rb.push(4);
        assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(rb.count(), 3);
    }

    #[test]
    fn test_rate_counts_only_recent_transitions() {
        let mut tracker = ToggleRateTracker::new(Duration::from_secs(1));
        let start = Instant::now();
        tracker.record(start);
        tracker.record(start + Duration::from_millis(100));
        let rate = tracker.record(start + Duration::from_millis(200));
        assert!((rate - 3.0).abs() < 0.001);

        // Two seconds later every recorded transition has left the window.
        assert_eq!(tracker.rate_at(start + Duration::from_secs(3)), 0.0);
    }

    #[test]
    fn test_rate_is_per_second() {
        let mut tracker = ToggleRateTracker::new(Duration::from_secs(2));
        let start = Instant::now();
        let mut rate = 0.0;
        for i in 0..8 {
            rate = tracker.record(start + Duration::from_millis(i * 100));
        }
        assert!((rate - 4.0).abs() < 0.001);
        assert_eq!(tracker.recorded(), 8);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = ToggleRateTracker::new(Duration::from_secs(1));
        let now = Instant::now();
        for _ in 0..(TOGGLE_HISTORY * 2) {
            tracker.record(now);
        }
        assert_eq!(tracker.recorded(), TOGGLE_HISTORY);
    }
}
