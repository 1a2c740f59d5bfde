//! # Message Channel - Bounded Typed FIFO with Reject-New Overflow
//!
//! This module provides the typed, bounded, FIFO queue used for all
//! command/result delivery between tasks. It wraps the embassy channel with
//! the delivery rules the appliance depends on:
//!
//! - Overflow policy is reject-new: a producer that hits a full queue gets
//!   the item handed back inside the error, never a silent drop.
//! - Every blocking entry point takes a timeout; nothing waits forever.
//! - Closing the channel (shutdown path) makes pending and subsequent
//!   receives report `Closed` so the consumer task can exit its loop.
//!
//! ## Architecture
//!
//! One channel has exactly one logical consumer task and any number of
//! producers. Submission order is preserved per producer; producers must not
//! assume ordering against each other. Per-channel counters (sent, received,
//! rejected, peak depth) feed the `status` verb.
//!
//! ## Blocking behavior
//!
//! `send` with a zero timeout degenerates to a pure try-send and reports
//! `Full` immediately. A nonzero timeout waits for a slot using the channel's
//! readiness poll; expiry hands the item back as `Timeout`. Blocked senders
//! observe a close at their next wakeup or timeout boundary.

use core::cell::Cell;
use core::future::poll_fn;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Instant};
use log::{log, Level};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Error returned by `send` and `try_send`. The rejected item rides along so
/// the producer can retry or decide to drop it deliberately.
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SendError<T> {
    /// The queue had no free slot and the timeout was zero.
    Full(T),
    /// The queue stayed full for the whole timeout.
    Timeout(T),
    /// The channel was closed by the shutdown path.
    Closed(T),
}

/// Error returned by `receive`.
#[cfg_attr(feature = "std", derive(Debug))]
#[derive(PartialEq, Eq)]
pub enum ReceiveError {
    /// No item arrived within the timeout.
    Timeout,
    /// The channel was closed; the consumer should exit its loop.
    Closed,
}

/// Snapshot of a channel's delivery counters.
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ChannelStats {
    pub sent: u32,
    pub received: u32,
    pub rejected: u32,
    pub peak_depth: u32,
}

/// Typed bounded FIFO with reject-new overflow and close semantics.
///
/// `N` is the capacity, fixed at creation. The struct is const-constructible
/// so instances can live in statics on embedded builds.
pub struct MessageChannel<T: 'static, const N: usize> {
    name: &'static str,
    queue: Channel<CriticalSectionRawMutex, T, N>,
    closed: AtomicBool,
    close_wake: Signal<CriticalSectionRawMutex, ()>,
    sent: AtomicU32,
    received: AtomicU32,
    rejected: AtomicU32,
    peak_depth: AtomicU32,
    // Highest correlation-free diagnostic: who consumes this channel.
    consumer: BlockingMutex<CriticalSectionRawMutex, Cell<Option<&'static str>>>,
}

impl<T: 'static, const N: usize> MessageChannel<T, N> {
    pub const fn new(name: &'static str) -> Self {
        MessageChannel {
            name,
            queue: Channel::new(),
            closed: AtomicBool::new(false),
            close_wake: Signal::new(),
            sent: AtomicU32::new(0),
            received: AtomicU32::new(0),
            rejected: AtomicU32::new(0),
            peak_depth: AtomicU32::new(0),
            consumer: BlockingMutex::new(Cell::new(None)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Records which task drains this channel. Purely diagnostic; the
    /// one-consumer rule is a convention enforced by the boot wiring.
    pub fn bind_consumer(&self, task_name: &'static str) {
        self.consumer.lock(|c| c.set(Some(task_name)));
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn depth(&self) -> usize {
        self.queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            peak_depth: self.peak_depth.load(Ordering::Relaxed),
        }
    }

    /// Non-blocking send. This is the producer-side boundary call used by the
    /// command router; a full queue is reported immediately.
    pub fn try_send(&self, item: T) -> Result<(), SendError<T>> {
        match self.try_push(item) {
            Err(SendError::Full(item)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Full(item))
            }
            other => other,
        }
    }

    /// Push attempt that never touches the rejection counter. Callers that
    /// may still wait for a slot count a rejection only on the path that
    /// actually returns an error.
    fn try_push(&self, item: T) -> Result<(), SendError<T>> {
        if self.is_closed() {
            return Err(SendError::Closed(item));
        }
        match self.queue.try_send(item) {
            Ok(()) => {
                self.note_sent();
                Ok(())
            }
            Err(TrySendError::Full(item)) => Err(SendError::Full(item)),
        }
    }

    /// Sends an item, waiting up to `timeout` for a free slot.
    ///
    /// A zero timeout reports `Full` without waiting. On expiry the item is
    /// handed back inside `Timeout`. Producers that cannot afford to wait use
    /// [`try_send`](Self::try_send) instead. A send that waits and then
    /// succeeds is not a rejection; each failed send counts exactly once.
    pub async fn send(&self, item: T, timeout: Duration) -> Result<(), SendError<T>> {
        let mut pending = match self.try_push(item) {
            Ok(()) => return Ok(()),
            Err(SendError::Full(item)) if timeout.as_ticks() > 0 => item,
            Err(err) => {
                if matches!(err, SendError::Full(_)) {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                }
                return Err(err);
            }
        };

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.as_ticks() == 0 {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(SendError::Timeout(pending));
            }
            let ready = with_timeout(remaining, poll_fn(|cx| self.queue.poll_ready_to_send(cx))).await;
            if self.is_closed() {
                return Err(SendError::Closed(pending));
            }
            if ready.is_err() {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(SendError::Timeout(pending));
            }
            // Readiness can race against another producer; retry.
            match self.queue.try_send(pending) {
                Ok(()) => {
                    self.note_sent();
                    return Ok(());
                }
                Err(TrySendError::Full(item)) => pending = item,
            }
        }
    }

    /// Receives the next item, waiting up to `timeout`.
    ///
    /// After `close` every call reports `Closed`, including calls that were
    /// already parked waiting.
    pub async fn receive(&self, timeout: Duration) -> Result<T, ReceiveError> {
        if self.is_closed() {
            return Err(ReceiveError::Closed);
        }
        match with_timeout(timeout, select(self.queue.receive(), self.close_wake.wait())).await {
            Ok(Either::First(item)) => {
                self.received.fetch_add(1, Ordering::Relaxed);
                Ok(item)
            }
            Ok(Either::Second(())) => Err(ReceiveError::Closed),
            Err(_) => Err(ReceiveError::Timeout),
        }
    }

    /// Non-blocking receive.
    pub fn try_receive(&self) -> Option<T> {
        match self.queue.try_receive() {
            Ok(item) => {
                self.received.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            Err(_) => None,
        }
    }

    /// Drains everything currently queued without blocking.
    ///
    /// Bounded to one capacity's worth of items so a producer sending
    /// concurrently cannot keep the drain loop alive forever.
    pub fn try_receive_all(&self) -> heapless::Vec<T, N> {
        let mut drained = heapless::Vec::new();
        for _ in 0..N {
            match self.try_receive() {
                // Vec is sized to the channel capacity, push cannot fail here.
                Some(item) => {
                    if drained.push(item).is_err() {
                        break;
                    }
                }
                None => break,
            }
        }
        drained
    }

    /// Closes the channel. Called by the shutdown path only; wakes a parked
    /// receive so the consumer observes `Closed` promptly.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_wake.signal(());
        log!(Level::Debug, "channel '{}' closed", self.name);
    }

    fn note_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.peak_depth.fetch_max(self.queue.len() as u32, Ordering::Relaxed);
    }
}
