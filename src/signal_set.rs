//! # Signal Set - Multi-Bit Event Notification
//!
//! One-to-many condition signaling: any task can raise or clear bits, any
//! number of consumers can wait for any/all of a mask with a timeout. The
//! payload is the bits themselves; consumers that need data read the guarded
//! state after the wakeup.
//!
//! ## Pulse bits
//!
//! Some bits (scan complete, connectivity changed) are pulses: they may be
//! cleared again before a slow consumer polls the current value. Raises are
//! therefore fanned out through a pubsub channel carrying the raised mask, so
//! every waiter subscribed at raise time observes the edge even if the level
//! is already gone. Waiters subscribe before sampling the current value,
//! which closes the lost-wakeup window.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::pubsub::{PubSubBehavior, PubSubChannel, WaitResult};
use embassy_time::{with_timeout, Duration, Instant};

/// Upper bound on tasks concurrently parked in `wait_any`/`wait_all`.
const MAX_WAITERS: usize = 8;
/// Raises buffered per waiter before it is considered lagged.
const PULSE_BUFFER: usize = 4;

/// Error returned by the wait operations.
#[cfg_attr(feature = "std", derive(Debug))]
#[derive(PartialEq, Eq)]
pub enum WaitError {
    /// None of the awaited bits were raised within the timeout.
    Timeout,
    /// All waiter slots are taken; one task too many is parked here.
    ResourceExhausted,
}

/// Bit-field condition variable with timeout-bounded waits.
///
/// Const-constructible so instances can live in statics on embedded builds.
pub struct SignalSet {
    bits: BlockingMutex<CriticalSectionRawMutex, Cell<u32>>,
    pulses: PubSubChannel<CriticalSectionRawMutex, u32, PULSE_BUFFER, MAX_WAITERS, 1>,
}

impl SignalSet {
    pub const fn new() -> Self {
        SignalSet {
            bits: BlockingMutex::new(Cell::new(0)),
            pulses: PubSubChannel::new(),
        }
    }

    /// Current value of all bits.
    pub fn value(&self) -> u32 {
        self.bits.lock(|b| b.get())
    }

    /// Sets `mask` bits and wakes every current waiter with the raised mask.
    pub fn raise(&self, mask: u32) {
        self.bits.lock(|b| b.set(b.get() | mask));
        self.pulses.publish_immediate(mask);
    }

    /// Clears `mask` bits. Clearing never wakes anyone.
    pub fn clear(&self, mask: u32) {
        self.bits.lock(|b| b.set(b.get() & !mask));
    }

    /// Waits until any bit in `mask` is set or raised, returning the matched
    /// bits. Returns `Timeout` with no matched bits if none arrives in time.
    pub async fn wait_any(&self, mask: u32, timeout: Duration) -> Result<u32, WaitError> {
        let mut sub = self.pulses.subscriber().map_err(|_| WaitError::ResourceExhausted)?;
        let hit = self.value() & mask;
        if hit != 0 {
            return Ok(hit);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.as_ticks() == 0 {
                return Err(WaitError::Timeout);
            }
            match with_timeout(remaining, sub.next_message()).await {
                Ok(WaitResult::Message(raised)) => {
                    let hit = raised & mask;
                    if hit != 0 {
                        return Ok(hit);
                    }
                }
                // Lagged: pulses were overwritten, fall back to the level.
                Ok(WaitResult::Lagged(_)) => {
                    let hit = self.value() & mask;
                    if hit != 0 {
                        return Ok(hit);
                    }
                }
                Err(_) => return Err(WaitError::Timeout),
            }
        }
    }

    /// Waits until every bit in `mask` has been set or raised at least once
    /// since entry. Pulse bits count even if cleared again before return.
    pub async fn wait_all(&self, mask: u32, timeout: Duration) -> Result<(), WaitError> {
        let mut sub = self.pulses.subscriber().map_err(|_| WaitError::ResourceExhausted)?;
        let mut seen = self.value() & mask;
        if seen == mask {
            return Ok(());
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.as_ticks() == 0 {
                return Err(WaitError::Timeout);
            }
            match with_timeout(remaining, sub.next_message()).await {
                Ok(WaitResult::Message(raised)) => seen |= raised & mask,
                Ok(WaitResult::Lagged(_)) => seen |= self.value() & mask,
                Err(_) => return Err(WaitError::Timeout),
            }
            if seen == mask {
                return Ok(());
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::test_support::run;
    use embassy_futures::join::join;
    use embassy_futures::yield_now;

    const B1: u32 = 1 << 0;
    const B2: u32 = 1 << 1;
    const B3: u32 = 1 << 2;

    #[test]
    fn wait_any_returns_already_set_bits() {
        run(|| async {
            let signals = SignalSet::new();
            signals.raise(B2);
            let matched = signals.wait_any(B1 | B2, Duration::from_millis(10)).await;
            assert_eq!(matched, Ok(B2));
        });
    }

    #[test]
    fn wait_any_wakes_on_raise_from_other_task() {
        run(|| async {
            let signals = SignalSet::new();
            let waiter = signals.wait_any(B1 | B2, Duration::from_millis(500));
            let raiser = async {
                yield_now().await;
                signals.raise(B1);
            };
            let (matched, ()) = join(waiter, raiser).await;
            assert_eq!(matched, Ok(B1));
        });
    }

    #[test]
    fn wait_any_times_out_with_no_matched_bits() {
        run(|| async {
            let signals = SignalSet::new();
            signals.raise(B3);
            let res = signals.wait_any(B1 | B2, Duration::from_millis(5)).await;
            assert_eq!(res, Err(WaitError::Timeout));
        });
    }

    #[test]
    fn pulse_observed_even_if_cleared_before_wakeup_completes() {
        run(|| async {
            let signals = SignalSet::new();
            let waiter = signals.wait_any(B1, Duration::from_millis(500));
            let pulser = async {
                yield_now().await;
                signals.raise(B1);
                signals.clear(B1);
            };
            let (matched, ()) = join(waiter, pulser).await;
            assert_eq!(matched, Ok(B1));
            assert_eq!(signals.value() & B1, 0);
        });
    }

    #[test]
    fn wait_all_accumulates_bits_across_raises() {
        run(|| async {
            let signals = SignalSet::new();
            signals.raise(B1);
            let waiter = signals.wait_all(B1 | B2, Duration::from_millis(500));
            let raiser = async {
                yield_now().await;
                signals.raise(B2);
            };
            let (res, ()) = join(waiter, raiser).await;
            assert_eq!(res, Ok(()));
        });
    }

    #[test]
    fn wait_all_times_out_when_one_bit_never_arrives() {
        run(|| async {
            let signals = SignalSet::new();
            signals.raise(B1);
            let res = signals.wait_all(B1 | B2, Duration::from_millis(5)).await;
            assert_eq!(res, Err(WaitError::Timeout));
        });
    }

    #[test]
    fn clear_removes_bits_without_waking() {
        let signals = SignalSet::new();
        signals.raise(B1 | B2);
        signals.clear(B1);
        assert_eq!(signals.value(), B2);
    }
}
