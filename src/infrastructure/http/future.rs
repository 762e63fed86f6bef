//! Eagerly started request handle for callback and reactive call sites.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::errors::ApiError;

/// A request that was started when the handle was created.
///
/// Await it like any future, or hand it a callback with
/// [`on_complete`](Self::on_complete). Dropping the handle does not cancel
/// the request.
#[must_use = "the request runs regardless, but its result is lost unless awaited or given a callback"]
pub struct ApiFuture<T> {
    state: FutureState<T>,
}

enum FutureState<T> {
    Ready(Option<Result<T, ApiError>>),
    Spawned(JoinHandle<Result<T, ApiError>>),
}

// `T` is only ever moved out of the handle, never pinned.
impl<T> Unpin for ApiFuture<T> {}

impl<T: Send + 'static> ApiFuture<T> {
    /// Starts `request` on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub(crate) fn spawn<F>(request: F) -> Self
    where
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        Self {
            state: FutureState::Spawned(tokio::spawn(request)),
        }
    }

    /// Creates an already resolved handle.
    pub fn ready(result: Result<T, ApiError>) -> Self {
        Self {
            state: FutureState::Ready(Some(result)),
        }
    }

    /// Runs `callback` with the result once the request completes.
    ///
    /// The callback runs on whichever tokio worker finishes the request, not
    /// on the caller's thread or task. Callers that own single-threaded state
    /// must forward the result themselves, for example over a channel drained
    /// by their own loop.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(Result<T, ApiError>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) });
    }

    /// Runs `success` or `failure` once the request completes.
    ///
    /// Both run on a tokio worker, as with [`on_complete`](Self::on_complete).
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn finish<S, E>(self, success: S, failure: E)
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
    {
        self.on_complete(move |result| match result {
            Ok(value) => success(value),
            Err(e) => failure(e),
        });
    }
}

impl<T> Future for ApiFuture<T> {
    type Output = Result<T, ApiError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            FutureState::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(ApiError::local("request already completed"))),
            ),
            FutureState::Spawned(handle) => match Pin::new(handle).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(e)) => {
                    warn!(error = %e, "Request task did not complete");
                    Poll::Ready(Err(ApiError::local(format!("request task failed: {e}"))))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<T> std::fmt::Debug for ApiFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            FutureState::Ready(_) => "ready",
            FutureState::Spawned(_) => "spawned",
        };
        f.debug_struct("ApiFuture")
            .field("state", &state)
            .finish()
    }
}
