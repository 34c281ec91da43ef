//! Cancellation and no-progress timeout around request and response bodies.

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use log::debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::BodyStream;
use crate::error::{LinkError, Result};

/// Timestamp of the last forward progress of one call.
///
/// Shared between a streamed request body and the wait for response
/// headers, so a slow but moving upload does not time out.
#[derive(Debug, Clone)]
pub(crate) struct Progress(Arc<Mutex<Instant>>);

impl Progress {
    pub(crate) fn start() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    pub(crate) fn touch(&self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub(crate) fn last(&self) -> Instant {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn cancelled_error(query_id: &str) -> LinkError {
    LinkError::Cancelled(format!("Query {} was cancelled", query_id))
}

pub(crate) fn timeout_error(query_id: &str, timeout: Duration) -> LinkError {
    LinkError::TimeoutError(format!("Query {} made no progress for {:?}", query_id, timeout))
}

/// Await `fut` unless the token fires or `progress` stalls for `timeout`.
pub(crate) async fn wait_for<F, T>(
    fut: F,
    cancel: Option<&CancellationToken>,
    progress: &Progress,
    timeout: Duration,
    query_id: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::pin!(fut);
    // A token nobody holds never fires
    let token = cancel.cloned().unwrap_or_default();

    loop {
        let deadline = progress.last() + timeout;
        tokio::select! {
            biased;

            _ = token.cancelled() => return Err(cancelled_error(query_id)),

            out = &mut fut => return out,

            _ = tokio::time::sleep_until(deadline) => {
                if progress.last() + timeout <= Instant::now() {
                    return Err(timeout_error(query_id, timeout));
                }
            }
        }
    }
}

/// Per-stream guard settings.
pub(crate) struct StreamGuard {
    pub cancel: Option<CancellationToken>,
    pub timeout: Duration,
    pub query_id: String,
    /// Shared clock to touch on every chunk; a fresh one when `None`
    pub progress: Option<Progress>,
    /// Released when the stream ends, fails, times out or is dropped
    pub permit: Option<OwnedSemaphorePermit>,
}

struct GuardState {
    inner: Option<BodyStream>,
    permit: Option<OwnedSemaphorePermit>,
    /// Set by the watchdog, returned by the next read
    failure: Option<LinkError>,
    waker: Option<Waker>,
    done: bool,
}

impl GuardState {
    /// Drop the body and its slot; the next read returns `error`.
    fn fail(&mut self, error: LinkError) {
        if self.done || self.failure.is_some() {
            return;
        }
        self.inner = None;
        self.permit = None;
        self.failure = Some(error);
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.inner = None;
        self.permit = None;
        self.waker = None;
    }
}

fn lock(state: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Body wrapped by [`guard_stream`].
///
/// A watchdog task runs from creation until the body ends or is dropped.
/// It fires when the token is cancelled or when no chunk has been read for
/// the timeout, whether or not anyone is polling. Firing drops the inner
/// body and releases the permit.
pub(crate) struct GuardedBody {
    state: Arc<Mutex<GuardState>>,
    progress: Progress,
    cancel: Option<CancellationToken>,
    query_id: String,
    stop: CancellationToken,
}

/// Wrap a body so it observes cancellation and the no-progress timeout.
/// The first error is yielded once, then the stream ends.
///
/// Must be called inside a tokio runtime.
pub(crate) fn guard_stream(inner: BodyStream, guard: StreamGuard) -> GuardedBody {
    let StreamGuard {
        cancel,
        timeout,
        query_id,
        progress,
        permit,
    } = guard;
    let progress = progress.unwrap_or_else(Progress::start);
    let state = Arc::new(Mutex::new(GuardState {
        inner: Some(inner),
        permit,
        failure: None,
        waker: None,
        done: false,
    }));
    let stop = CancellationToken::new();

    tokio::spawn(watchdog(
        state.clone(),
        progress.clone(),
        cancel.clone().unwrap_or_default(),
        timeout,
        query_id.clone(),
        stop.clone(),
    ));

    GuardedBody {
        state,
        progress,
        cancel,
        query_id,
        stop,
    }
}

async fn watchdog(
    state: Arc<Mutex<GuardState>>,
    progress: Progress,
    cancel: CancellationToken,
    timeout: Duration,
    query_id: String,
    stop: CancellationToken,
) {
    loop {
        let deadline = progress.last() + timeout;
        tokio::select! {
            biased;

            _ = stop.cancelled() => return,

            _ = cancel.cancelled() => {
                lock(&state).fail(cancelled_error(&query_id));
                return;
            }

            _ = tokio::time::sleep_until(deadline) => {
                if progress.last() + timeout <= Instant::now() {
                    debug!("[LINK_HTTP] query_id={} body idle for {:?}, released", query_id, timeout);
                    lock(&state).fail(timeout_error(&query_id, timeout));
                    return;
                }
            }
        }
    }
}

impl Stream for GuardedBody {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut state = lock(&this.state);

        if let Some(error) = state.failure.take() {
            state.finish();
            this.stop.cancel();
            return Poll::Ready(Some(Err(error)));
        }
        if state.done {
            return Poll::Ready(None);
        }
        if this.cancel.as_ref().map_or(false, |token| token.is_cancelled()) {
            state.finish();
            this.stop.cancel();
            return Poll::Ready(Some(Err(cancelled_error(&this.query_id))));
        }

        let polled = match state.inner.as_mut() {
            Some(inner) => inner.poll_next_unpin(cx),
            None => Poll::Ready(None),
        };
        match polled {
            Poll::Ready(Some(Ok(chunk))) => {
                this.progress.touch();
                Poll::Ready(Some(Ok(chunk)))
            },
            Poll::Ready(Some(Err(e))) => {
                state.finish();
                this.stop.cancel();
                Poll::Ready(Some(Err(e)))
            },
            Poll::Ready(None) => {
                state.finish();
                this.stop.cancel();
                Poll::Ready(None)
            },
            Poll::Pending => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            },
        }
    }
}

impl Drop for GuardedBody {
    fn drop(&mut self) {
        self.stop.cancel();
        lock(&self.state).finish();
    }
}
