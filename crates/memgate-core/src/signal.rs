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

//! Single-slot, non-blocking signalling channels.
//!
//! A coalescing channel holds at most one pending signal. Sending never blocks:
//! if a signal is already waiting, the new one is dropped. The consumer is
//! therefore never more than one signal behind and the producer never waits,
//! at the price of exactly-once delivery. Consumers that re-read shared state
//! on every wakeup lose nothing by this.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use crossbeam_channel::RecvTimeoutError;

/// Creates a coalescing channel.
pub fn coalescing<T>() -> (CoalescingSender<T>, CoalescingReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        CoalescingSender {
            tx,
            coalesced: Arc::new(AtomicU64::new(0)),
        },
        CoalescingReceiver { rx },
    )
}

/// What happened to a signal handed to [`CoalescingSender::notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The slot was free; the signal is now pending.
    Delivered,
    /// A signal was already pending; this one was dropped.
    Coalesced,
    /// Every receiver is gone.
    Disconnected,
}

/// The producing half of a coalescing channel.
#[derive(Debug)]
pub struct CoalescingSender<T> {
    tx: Sender<T>,
    coalesced: Arc<AtomicU64>,
}

impl<T> Clone for CoalescingSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            coalesced: Arc::clone(&self.coalesced),
        }
    }
}

impl<T> CoalescingSender<T> {
    /// Offers a signal without blocking.
    pub fn notify(&self, signal: T) -> Delivery {
        match self.tx.try_send(signal) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                Delivery::Coalesced
            }
            Err(TrySendError::Disconnected(_)) => Delivery::Disconnected,
        }
    }

    /// Number of signals dropped because one was already pending.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

/// The consuming half of a coalescing channel.
#[derive(Debug)]
pub struct CoalescingReceiver<T> {
    rx: Receiver<T>,
}

impl<T> Clone for CoalescingReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> CoalescingReceiver<T> {
    /// Blocks until a signal arrives. Returns `None` once every sender is gone.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Blocks for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Takes the pending signal, if any.
    pub fn try_recv(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Returns `true` if a signal is waiting.
    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_burst_coalesces_into_one_pending_signal() {
        let (tx, rx) = coalescing::<u32>();
        let outcomes: Vec<_> = (0..100).map(|i| tx.notify(i)).collect();

        assert_eq!(outcomes[0], Delivery::Delivered);
        assert!(outcomes[1..].iter().all(|d| *d == Delivery::Coalesced));
        assert_eq!(tx.coalesced_count(), 99);

        // The first signal survives, the rest were dropped.
        assert_eq!(rx.try_recv(), Some(0));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_slot_frees_after_receive() {
        let (tx, rx) = coalescing::<()>();
        assert_eq!(tx.notify(()), Delivery::Delivered);
        assert!(rx.is_pending());
        assert_eq!(rx.recv(), Some(()));
        assert!(!rx.is_pending());
        assert_eq!(tx.notify(()), Delivery::Delivered);
    }

    #[test]
    fn test_notify_never_blocks_producer() {
        let (tx, rx) = coalescing::<()>();
        let producer = thread::spawn(move || {
            for _ in 0..10_000 {
                tx.notify(());
            }
            tx.coalesced_count()
        });
        let coalesced = producer.join().unwrap();
        assert_eq!(coalesced, 9_999);
        assert_eq!(rx.try_recv(), Some(()));
    }

    #[test]
    fn test_disconnected_sender_ends_recv() {
        let (tx, rx) = coalescing::<()>();
        drop(tx);
        assert_eq!(rx.recv(), None);
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_disconnected_receiver_is_reported() {
        let (tx, rx) = coalescing::<()>();
        drop(rx);
        assert_eq!(tx.notify(()), Delivery::Disconnected);
    }
}
