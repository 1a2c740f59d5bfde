//! # Guarded Region - Timeout-Bounded Mutual Exclusion
//!
//! Wraps one piece of shared state in a mutex whose every acquisition is
//! bounded by a timeout. Release is tied to the guard's scope, so the region
//! is freed on every exit path including early returns.
//!
//! The current owner is tracked by task id. Re-entrant acquisition by the
//! same task deadlocks by construction, so it panics in debug builds to
//! catch the call site; release builds fall through to the timeout.
//!
//! Holders must bound their critical section to sub-millisecond work (no
//! awaits, no I/O while the guard is alive); readers that need the value for
//! longer take a [`snapshot`](GuardedRegion::snapshot) instead.

use core::cell::Cell;
use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration};
use portable_atomic::{AtomicU32, Ordering};

use crate::task_supervisor::TaskId;

/// Error returned by `acquire` and `snapshot`.
#[cfg_attr(feature = "std", derive(Debug))]
#[derive(PartialEq, Eq)]
pub enum AcquireError {
    /// The region stayed held for the whole timeout.
    Timeout,
}

/// Mutual-exclusion wrapper around a value of type `T`.
pub struct GuardedRegion<T: 'static> {
    name: &'static str,
    inner: Mutex<CriticalSectionRawMutex, T>,
    owner: BlockingMutex<CriticalSectionRawMutex, Cell<Option<TaskId>>>,
    timeouts: AtomicU32,
}

/// Scoped ownership of a region. Dropping the guard releases the region.
pub struct RegionGuard<'a, T: 'static> {
    region: &'a GuardedRegion<T>,
    // Option so Drop can release the mutex after clearing the owner.
    inner: Option<MutexGuard<'a, CriticalSectionRawMutex, T>>,
}

impl<T: 'static> GuardedRegion<T> {
    pub const fn new(name: &'static str, value: T) -> Self {
        GuardedRegion {
            name,
            inner: Mutex::new(value),
            owner: BlockingMutex::new(Cell::new(None)),
            timeouts: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Task currently holding the region, if any.
    pub fn owner(&self) -> Option<TaskId> {
        self.owner.lock(|o| o.get())
    }

    /// Number of acquisitions that expired without getting the region.
    pub fn timeout_count(&self) -> u32 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Acquires the region for `owner`, waiting at most `timeout`.
    pub async fn acquire(&self, owner: TaskId, timeout: Duration) -> Result<RegionGuard<'_, T>, AcquireError> {
        #[cfg(debug_assertions)]
        if self.owner() == Some(owner) {
            panic!("re-entrant acquire of region '{}' by task {}", self.name, owner.0);
        }
        match with_timeout(timeout, self.inner.lock()).await {
            Ok(guard) => {
                self.owner.lock(|o| o.set(Some(owner)));
                Ok(RegionGuard {
                    region: self,
                    inner: Some(guard),
                })
            }
            Err(_) => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                Err(AcquireError::Timeout)
            }
        }
    }

    /// Clones the protected value out under the guard. The region is held
    /// only for the copy, never across the caller's awaits.
    pub async fn snapshot(&self, owner: TaskId, timeout: Duration) -> Result<T, AcquireError>
    where
        T: Clone,
    {
        let guard = self.acquire(owner, timeout).await?;
        Ok(guard.clone())
    }
}

impl<T: 'static> Deref for RegionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Invariant: inner is Some until Drop.
        self.inner.as_ref().unwrap()
    }
}

impl<T: 'static> DerefMut for RegionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner.as_mut().unwrap()
    }
}

impl<T: 'static> Drop for RegionGuard<'_, T> {
    fn drop(&mut self) {
        self.region.owner.lock(|o| o.set(None));
        self.inner = None;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::test_support::run;
    use embassy_futures::join::join;
    use embassy_futures::yield_now;

    const TASK_A: TaskId = TaskId(1);
    const TASK_B: TaskId = TaskId(2);

    #[test]
    fn acquire_and_release_through_scope() {
        run(|| async {
            let region = GuardedRegion::new("counter", 0u32);
            {
                let mut guard = region.acquire(TASK_A, Duration::from_millis(10)).await.expect("free");
                *guard += 1;
                assert_eq!(region.owner(), Some(TASK_A));
            }
            assert_eq!(region.owner(), None);
            assert_eq!(region.snapshot(TASK_B, Duration::from_millis(10)).await, Ok(1));
        });
    }

    #[test]
    fn second_task_times_out_while_held() {
        run(|| async {
            let region = GuardedRegion::new("held", ());
            let _guard = region.acquire(TASK_A, Duration::from_millis(10)).await.expect("free");
            let res = region.acquire(TASK_B, Duration::from_millis(5)).await;
            assert!(matches!(res, Err(AcquireError::Timeout)));
            assert_eq!(region.timeout_count(), 1);
        });
    }

    #[test]
    fn ownership_is_never_observed_by_two_tasks_at_once() {
        run(|| async {
            let region: &GuardedRegion<u32> = Box::leak(Box::new(GuardedRegion::new("contended", 0u32)));
            let writer = |id: TaskId| async move {
                for _ in 0..50 {
                    let mut guard = region.acquire(id, Duration::from_millis(100)).await.expect("bounded hold");
                    let before = *guard;
                    yield_now().await; // widen the window a competing holder would need
                    *guard = before + 1;
                    assert_eq!(region.owner(), Some(id));
                    drop(guard);
                    yield_now().await;
                }
            };
            join(writer(TASK_A), writer(TASK_B)).await;
            assert_eq!(region.snapshot(TASK_A, Duration::from_millis(10)).await, Ok(100));
        });
    }

    #[test]
    #[should_panic(expected = "re-entrant acquire")]
    fn reentrant_acquire_panics_in_debug() {
        run(|| async {
            let region = GuardedRegion::new("reentrant", ());
            let _guard = region.acquire(TASK_A, Duration::from_millis(10)).await.expect("free");
            let _ = region.acquire(TASK_A, Duration::from_millis(1)).await;
        });
    }

    #[test]
    fn waiter_gets_region_when_holder_releases() {
        run(|| async {
            let region = GuardedRegion::new("handover", 0u32);
            let holder = async {
                let mut guard = region.acquire(TASK_A, Duration::from_millis(10)).await.expect("free");
                *guard = 7;
                yield_now().await;
                // guard drops here
            };
            let waiter = async {
                yield_now().await;
                region.snapshot(TASK_B, Duration::from_millis(100)).await
            };
            let ((), snap) = join(holder, waiter).await;
            assert_eq!(snap, Ok(7));
        });
    }
}
