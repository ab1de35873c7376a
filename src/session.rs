//! Streaming session state and cancellation.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::consumer::StreamError;
use crate::options::FailureDisplay;

/// Generic notice shown in place of (or after) the answer when a stream
/// fails. Raw error text is never written into the visible buffer.
pub const FAILURE_NOTICE: &str =
    "Something went wrong while generating the explanation. Please try again.";

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No stream was started (prompt gate rejected the request).
    Idle,
    /// Request accepted; waiting for the first chunk.
    Pending,
    /// At least one chunk has arrived.
    Streaming,
    /// Stream ended normally (sentinel or end of body).
    Done,
    /// Cancelled, either explicitly or by a superseding request.
    Aborted,
    /// Stream ended on an error other than cancellation.
    Failed,
}

impl SessionStatus {
    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }

    /// Whether a stream task is (potentially) still running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Streaming)
    }
}

struct Inner {
    request_id: Option<String>,
    text: Mutex<String>,
    error: Mutex<Option<StreamError>>,
    status: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
}

/// Handle to one logical streaming interaction, from request to terminal
/// state.
///
/// Cheap to clone; all clones observe the same state. The accumulated
/// text is append-only and mutated exclusively by the stream task that
/// owns the session, so readers only ever see prefixes of the final
/// answer.
#[derive(Clone)]
pub struct StreamSession {
    inner: Arc<Inner>,
}

impl StreamSession {
    pub(crate) fn new(request_id: Option<String>) -> Self {
        Self::with_status(request_id, SessionStatus::Pending)
    }

    /// A session that never started; returned when the prompt gate
    /// rejects a request.
    pub(crate) fn idle(request_id: Option<String>) -> Self {
        Self::with_status(request_id, SessionStatus::Idle)
    }

    fn with_status(request_id: Option<String>, status: SessionStatus) -> Self {
        let (status, _) = watch::channel(status);
        Self {
            inner: Arc::new(Inner {
                request_id,
                text: Mutex::new(String::new()),
                error: Mutex::new(None),
                status,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// The request id this session was started with, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.inner.request_id.as_deref()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    /// Snapshot of the accumulated answer text.
    pub fn text(&self) -> String {
        self.inner.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Human-readable error for a `Failed` session.
    pub fn error(&self) -> Option<String> {
        self.inner
            .error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|e| e.to_string())
    }

    /// Cancel the stream.
    ///
    /// Idempotent: a no-op on `Idle` and on already-terminal sessions.
    /// Cancellation never writes into the accumulated text.
    pub fn cancel(&self) {
        let aborted = self.inner.status.send_if_modified(|status| {
            if status.is_active() {
                *status = SessionStatus::Aborted;
                true
            } else {
                false
            }
        });
        if aborted {
            self.inner.cancel.cancel();
            debug!(request_id = ?self.inner.request_id, "stream cancelled");
        }
    }

    /// Wait until the session settles (terminal state, or `Idle` for a
    /// session that never started) and return that status.
    pub async fn wait(&self) -> SessionStatus {
        let mut rx = self.inner.status.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() || status == SessionStatus::Idle {
                return status;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// First chunk arrived.
    pub(crate) fn mark_streaming(&self) {
        self.inner.status.send_if_modified(|status| {
            if *status == SessionStatus::Pending {
                *status = SessionStatus::Streaming;
                true
            } else {
                false
            }
        });
    }

    /// Append incremental answer text. Ignored once cancelled; a
    /// superseded session must not keep mutating what the UI shows.
    pub(crate) fn append(&self, content: &str) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner
            .text
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(content);
    }

    /// Transition to `Done` unless the session already settled.
    pub(crate) fn complete(&self) {
        self.transition(SessionStatus::Done);
    }

    /// Transition to `Aborted` unless the session already settled.
    pub(crate) fn abort(&self) {
        self.transition(SessionStatus::Aborted);
    }

    /// Record a fatal error and transition to `Failed`.
    ///
    /// If the session was cancelled while the error was in flight, the
    /// cancellation wins and no notice is written.
    pub(crate) fn fail(&self, error: StreamError, display: FailureDisplay) {
        if self.inner.cancel.is_cancelled() {
            self.transition(SessionStatus::Aborted);
            return;
        }

        {
            let mut text = self.inner.text.lock().unwrap_or_else(|e| e.into_inner());
            match display {
                FailureDisplay::Replace => {
                    text.clear();
                    text.push_str(FAILURE_NOTICE);
                }
                FailureDisplay::Annotate => {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str(FAILURE_NOTICE);
                }
            }
        }
        *self.inner.error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self.transition(SessionStatus::Failed);
    }

    fn transition(&self, next: SessionStatus) {
        self.inner.status.send_if_modified(|status| {
            if status.is_active() {
                *status = next;
                true
            } else {
                false
            }
        });
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("request_id", &self.inner.request_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let session = StreamSession::new(None);
        session.append("partial");
        session.cancel();
        assert_eq!(session.status(), SessionStatus::Aborted);
        session.cancel();
        assert_eq!(session.status(), SessionStatus::Aborted);
        assert_eq!(session.text(), "partial");
    }

    #[test]
    fn cancel_after_done_is_noop() {
        let session = StreamSession::new(None);
        session.append("answer");
        session.complete();
        session.cancel();
        assert_eq!(session.status(), SessionStatus::Done);
        assert_eq!(session.text(), "answer");
    }

    #[test]
    fn cancel_on_idle_is_noop() {
        let session = StreamSession::idle(None);
        session.cancel();
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn append_after_cancel_is_ignored() {
        let session = StreamSession::new(None);
        session.append("a");
        session.cancel();
        session.append("b");
        assert_eq!(session.text(), "a");
    }

    #[test]
    fn fail_replaces_text_by_default() {
        let session = StreamSession::new(None);
        session.append("partial answer");
        session.fail(StreamError::NoResponseBody, FailureDisplay::Replace);
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.text(), FAILURE_NOTICE);
        assert!(session.error().is_some());
    }

    #[test]
    fn fail_annotate_keeps_partial_text() {
        let session = StreamSession::new(None);
        session.append("partial answer");
        session.fail(StreamError::NoResponseBody, FailureDisplay::Annotate);
        assert_eq!(
            session.text(),
            format!("partial answer\n\n{FAILURE_NOTICE}")
        );
    }

    #[test]
    fn fail_after_cancel_stays_aborted() {
        let session = StreamSession::new(None);
        session.append("partial");
        session.cancel();
        session.fail(StreamError::NoResponseBody, FailureDisplay::Replace);
        assert_eq!(session.status(), SessionStatus::Aborted);
        assert_eq!(session.text(), "partial");
    }

    #[tokio::test]
    async fn wait_returns_immediately_for_idle() {
        let session = StreamSession::idle(None);
        assert_eq!(session.wait().await, SessionStatus::Idle);
    }
}
