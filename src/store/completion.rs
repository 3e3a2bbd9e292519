use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;

/// Completion handle of a dispatched action.
///
/// The action is already running when the handle is returned; awaiting the
/// handle only observes the outcome. Dropping it detaches the action.
pub struct Completion {
    inner: BoxFuture<'static, Result<Value>>,
}

impl Completion {
    /// A handle that is already settled.
    pub fn ready(outcome: Result<Value>) -> Self {
        Self {
            inner: futures::future::ready(outcome).boxed(),
        }
    }

    /// Spawn `task` on `runtime` and track its outcome.
    pub(crate) fn spawn<F>(runtime: &Handle, task: F) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        let handle = runtime.spawn(task);
        Self {
            inner: async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(Error::Aborted(e.to_string())),
                }
            }
            .boxed(),
        }
    }
}

impl Future for Completion {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Runtime handle for spawning action tasks.
pub(crate) fn current_runtime(kind: &str) -> Result<Handle> {
    Handle::try_current().map_err(|_| {
        Error::Configuration(format!(
            "dispatching `{kind}` requires a running tokio runtime"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ready_completion_settles() {
        let done = Completion::ready(Ok(json!(1)));
        assert_eq!(done.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn spawned_completion_runs_without_await() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let completion = Completion::spawn(&Handle::current(), async move {
            let _ = tx.send(());
            Ok(json!("done"))
        });
        drop(completion);
        assert!(rx.await.is_ok());
    }

    #[test]
    fn runtime_is_required() {
        assert!(matches!(
            current_runtime("foo"),
            Err(Error::Configuration(_))
        ));
    }
}
