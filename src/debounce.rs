//! Trailing-edge debouncing of action calls.
//!
//! Calls that arrive within the window of each other form a burst. The burst
//! runs once, `window` after its last call, with the payload of that last
//! call. Every caller of the burst gets its own future and all of them
//! settle with the outcome of the single run.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;

type Run = Box<dyn FnOnce(Value) -> BoxFuture<'static, Result<Value>> + Send>;

struct Burst {
    payload: Value,
    run: Run,
    waiters: Vec<oneshot::Sender<Result<Value>>>,
    deadline: Instant,
}

/// Coalesces rapid calls into one execution per burst.
///
/// Cloning shares the pending burst.
#[derive(Clone)]
pub struct Debouncer {
    window: Duration,
    pending: Arc<Mutex<Option<Burst>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True while a burst is waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Join the current burst, or start one, with `run` as the latest call.
    ///
    /// Must be called from within a tokio runtime; the timer is spawned on it.
    pub fn call<F>(&self, payload: Value, run: F) -> BoxFuture<'static, Result<Value>>
    where
        F: FnOnce(Value) -> BoxFuture<'static, Result<Value>> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                return futures::future::ready(Err(Error::Configuration(
                    "debounced actions require a running tokio runtime".to_string(),
                )))
                .boxed()
            }
        };

        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + self.window;
        {
            let mut pending = self.pending.lock();
            match pending.as_mut() {
                Some(burst) => {
                    burst.payload = payload;
                    burst.run = Box::new(run);
                    burst.deadline = deadline;
                    burst.waiters.push(tx);
                    log::trace!("debounce: call joined burst of {}", burst.waiters.len());
                }
                None => {
                    *pending = Some(Burst {
                        payload,
                        run: Box::new(run),
                        waiters: vec![tx],
                        deadline,
                    });
                    runtime.spawn(fire(Arc::clone(&self.pending)));
                }
            }
        }

        async move {
            rx.await.unwrap_or_else(|_| {
                Err(Error::Aborted(
                    "debounced execution ended without an outcome".to_string(),
                ))
            })
        }
        .boxed()
    }
}

/// Wait out the burst's deadline, which later calls keep pushing back, then run it.
async fn fire(pending: Arc<Mutex<Option<Burst>>>) {
    let mut deadline = match pending.lock().as_ref() {
        Some(burst) => burst.deadline,
        None => return,
    };
    let burst = loop {
        tokio::time::sleep_until(deadline).await;
        let mut guard = pending.lock();
        match guard.as_ref().map(|burst| burst.deadline) {
            None => return,
            Some(latest) if latest > deadline => deadline = latest,
            Some(_) => match guard.take() {
                Some(burst) => break burst,
                None => return,
            },
        }
    };

    log::trace!("debounce: firing burst of {}", burst.waiters.len());
    let outcome = (burst.run)(burst.payload).await;
    for waiter in burst.waiters {
        let _ = waiter.send(outcome.clone());
    }
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting(
        runs: &Arc<AtomicUsize>,
    ) -> impl FnOnce(Value) -> BoxFuture<'static, Result<Value>> + Send + 'static {
        let runs = Arc::clone(runs);
        move |payload| {
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(payload)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn burst_runs_once_with_last_payload() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let runs = Arc::new(AtomicUsize::new(0));

        let first = debouncer.call(json!(1), counting(&runs));
        sleep(Duration::from_millis(10)).await;
        let second = debouncer.call(json!(2), counting(&runs));
        sleep(Duration::from_millis(10)).await;
        let third = debouncer.call(json!(3), counting(&runs));
        assert!(debouncer.is_pending());

        let outcomes = futures::future::join_all([first, second, third]).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        for outcome in outcomes {
            assert_eq!(outcome.unwrap(), json!(3));
        }
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn separate_bursts_run_separately() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let runs = Arc::new(AtomicUsize::new(0));

        assert_eq!(debouncer.call(json!("a"), counting(&runs)).await.unwrap(), json!("a"));
        assert_eq!(debouncer.call(json!("b"), counting(&runs)).await.unwrap(), json!("b"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejection_reaches_every_caller() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let fail = |_: Value| -> BoxFuture<'static, Result<Value>> {
            futures::future::ready(Err(Error::action("boom"))).boxed()
        };
        let first = debouncer.call(Value::Null, fail);
        let second = debouncer.call(Value::Null, fail);
        assert_eq!(first.await, Err(Error::Action("boom".to_string())));
        assert_eq!(second.await, Err(Error::Action("boom".to_string())));
    }

    #[test]
    fn runtime_is_required() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let outcome = futures::executor::block_on(
            debouncer.call(Value::Null, |_| futures::future::ready(Ok(Value::Null)).boxed()),
        );
        assert!(matches!(outcome, Err(Error::Configuration(_))));
    }
}
