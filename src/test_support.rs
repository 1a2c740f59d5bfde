//! Executor-backed harness for async unit tests.
//!
//! embassy-time's timer queue is serviced by the embassy executor, so any
//! future that parks on `Timer` or `with_timeout` has to be polled by one.
//! `run` spins up a dedicated executor thread, builds the test future on
//! that thread (fixtures holding non-Send statics are fine) and ships the
//! outcome back, re-raising panics so `#[should_panic]` keeps working.

use core::any::Any;
use core::future::Future;
use core::pin::Pin;

use std::panic::AssertUnwindSafe;
use std::sync::mpsc;

use embassy_executor::Executor;
use futures::FutureExt;

type Outcome = Result<(), Box<dyn Any + Send>>;

#[embassy_executor::task(pool_size = 32)]
async fn case_task(case: Pin<Box<dyn Future<Output = ()>>>, done: mpsc::Sender<Outcome>) {
    let outcome = AssertUnwindSafe(case).catch_unwind().await;
    let _ = done.send(outcome);
}

/// Runs one async test case to completion on its own embassy executor.
///
/// The closure is invoked on the executor thread, so the future it returns
/// may hold non-Send fixture state. A panic inside the case is re-raised
/// here with its original payload.
pub(crate) fn run<F>(case: impl FnOnce() -> F + Send + 'static)
where
    F: Future<Output = ()> + 'static,
{
    let (done, finished) = mpsc::channel();
    std::thread::spawn(move || {
        let executor = Box::leak(Box::new(Executor::new()));
        executor.run(move |spawner| {
            let future: Pin<Box<dyn Future<Output = ()>>> = Box::pin(case());
            spawner
                .spawn(case_task(future, done))
                .expect("case task pool exhausted");
        });
    });
    match finished.recv() {
        Ok(Ok(())) => {}
        Ok(Err(payload)) => std::panic::resume_unwind(payload),
        Err(_) => panic!("test executor thread exited before reporting an outcome"),
    }
}
