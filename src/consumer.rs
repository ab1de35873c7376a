//! The streaming response consumer.
//!
//! Turns the chat-streaming endpoint's chunked SSE body into incremental
//! appends on a [`StreamSession`], with cooperative cancellation. At most
//! one session per consumer is active at a time: starting a new stream
//! cancels the previous one before the new task may emit any text, so two
//! in-flight answers can never interleave in the visible buffer.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::AuthProvider;
use crate::http::{add_headers, build_http_client};
use crate::model::{ExplainEvent, StreamRequest};
use crate::options::{ErrorFramePolicy, StreamOptions};
use crate::session::StreamSession;
use crate::sse::{self, FrameDecoder};

/// Path of the chat-streaming endpoint, relative to the API base URL.
const STREAM_PATH: &str = "/api/v1/assistant/stream";

/// Errors that can end a stream.
///
/// Cancellation is deliberately absent: an aborted stream is a normal
/// outcome (`SessionStatus::Aborted`), never an error.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("response exposed no streamable body")]
    NoResponseBody,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("stream stalled: no data received within {0:?}")]
    StallTimeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Boxed stream of raw body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Opens the chunked response body for one streaming request.
///
/// The HTTP implementation is [`HttpStreamTransport`]; tests substitute
/// scripted transports to exercise the decode loop without a network.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Issue the request and return its body as a chunk stream.
    ///
    /// `headers` are the authentication headers for this request. A
    /// transport that cannot produce a streamable body must return
    /// [`StreamError::NoResponseBody`].
    async fn open(
        &self,
        request: &StreamRequest,
        headers: HashMap<String, String>,
    ) -> Result<ByteStream, StreamError>;
}

/// reqwest-backed transport: one POST per stream, body consumed via
/// `bytes_stream`.
pub struct HttpStreamTransport {
    client: reqwest::Client,
    options: StreamOptions,
}

impl HttpStreamTransport {
    /// Build a transport (and its HTTP client) from the given options.
    pub fn new(options: &StreamOptions) -> Result<Self, StreamError> {
        Ok(Self {
            client: build_http_client(options)?,
            options: options.clone(),
        })
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn open(
        &self,
        request: &StreamRequest,
        headers: HashMap<String, String>,
    ) -> Result<ByteStream, StreamError> {
        let url = format!(
            "{}{}",
            self.options.base_url.trim_end_matches('/'),
            STREAM_PATH
        );

        let mut req = self.client.post(&url).header(CONTENT_TYPE, "application/json");
        for (key, value) in &headers {
            req = req.header(key, value);
        }
        req = add_headers(req, &self.options.extra_headers);

        let response = req.json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Transport(format!("HTTP {status}: {body}")));
        }

        if response.content_length() == Some(0) {
            return Err(StreamError::NoResponseBody);
        }

        Ok(Box::pin(response.bytes_stream().map_err(StreamError::Http)))
    }
}

/// Consumes the explanation endpoint's SSE stream into sessions.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use hackitech_assistant::auth::BearerToken;
/// use hackitech_assistant::consumer::StreamingResponseConsumer;
/// use hackitech_assistant::model::StreamRequest;
/// use hackitech_assistant::options::StreamOptions;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let consumer = StreamingResponseConsumer::new(
///     StreamOptions::default(),
///     Arc::new(BearerToken::new("session-token")),
/// )?;
///
/// let session = consumer.start(StreamRequest::new("Explain SQL injection"));
/// session.wait().await;
/// println!("{}", session.text());
/// # Ok(())
/// # }
/// ```
pub struct StreamingResponseConsumer<T: StreamTransport> {
    transport: Arc<T>,
    auth: Arc<dyn AuthProvider>,
    options: StreamOptions,
    active: Mutex<Option<StreamSession>>,
}

impl StreamingResponseConsumer<HttpStreamTransport> {
    /// Create a consumer over HTTP with the given options and injected
    /// auth provider.
    pub fn new(options: StreamOptions, auth: Arc<dyn AuthProvider>) -> Result<Self, StreamError> {
        let transport = HttpStreamTransport::new(&options)?;
        Ok(Self::with_transport(transport, options, auth))
    }
}

impl<T: StreamTransport> StreamingResponseConsumer<T> {
    /// Create a consumer over a custom transport.
    pub fn with_transport(
        transport: T,
        options: StreamOptions,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            auth,
            options,
            active: Mutex::new(None),
        }
    }

    /// Start streaming an explanation.
    ///
    /// Prompts of `min_prompt_len` characters or fewer never reach the
    /// network: the returned session stays `Idle` and any active session
    /// is left undisturbed. A start whose request id matches the active
    /// session returns that session instead of restarting. Otherwise the
    /// active session is cancelled first, then a new stream task is
    /// spawned onto the tokio runtime.
    pub fn start(&self, request: StreamRequest) -> StreamSession {
        if request.prompt.chars().count() <= self.options.min_prompt_len {
            debug!(request_id = ?request.request_id, "prompt below minimum length, not streaming");
            return StreamSession::idle(request.request_id);
        }

        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(prev) = active.as_ref() {
            if prev.status().is_active()
                && prev.request_id().is_some()
                && prev.request_id() == request.request_id.as_deref()
            {
                debug!(request_id = ?request.request_id, "duplicate trigger, reusing active session");
                return prev.clone();
            }
            // At-most-one-active: the old stream stops appending before
            // the new one can emit anything.
            prev.cancel();
        }

        let session = StreamSession::new(request.request_id.clone());
        *active = Some(session.clone());

        let transport = Arc::clone(&self.transport);
        let auth = Arc::clone(&self.auth);
        let options = self.options.clone();
        let task_session = session.clone();
        tokio::spawn(async move {
            run_stream(transport, auth, options, request, task_session).await;
        });

        session
    }

    /// Cancel the in-flight stream, if any.
    pub fn cancel(&self, session: &StreamSession) {
        session.cancel();
    }

    /// The most recently started session, if any.
    pub fn active_session(&self) -> Option<StreamSession> {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Release the consumer's in-flight stream. Called on `Drop`, so an
    /// owner tearing the consumer down always aborts the request.
    pub fn dispose(&self) {
        if let Some(session) = self.active.lock().unwrap_or_else(|e| e.into_inner()).take() {
            session.cancel();
        }
    }
}

impl<T: StreamTransport> Drop for StreamingResponseConsumer<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// How the decode loop ended.
enum StreamEnd {
    Done,
    Cancelled,
}

/// Outcome of applying a single frame.
#[derive(PartialEq)]
enum FrameOutcome {
    Continue,
    Done,
}

async fn run_stream<T: StreamTransport>(
    transport: Arc<T>,
    auth: Arc<dyn AuthProvider>,
    options: StreamOptions,
    request: StreamRequest,
    session: StreamSession,
) {
    let cancel = session.cancel_token();

    // Auth failures abort the attempt before any network call.
    let headers = match auth.auth_headers().await {
        Ok(headers) => headers,
        Err(e) => {
            warn!(error = %e, "auth provider failed, not opening stream");
            return session.fail(e, options.failure_display);
        }
    };

    let chunks = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            session.abort();
            return;
        }
        opened = transport.open(&request, headers) => match opened {
            Ok(chunks) => chunks,
            Err(e) => return session.fail(e, options.failure_display),
        },
    };

    debug!(request_id = ?session.request_id(), "stream opened");

    match drive(chunks, &session, &options).await {
        Ok(StreamEnd::Done) => session.complete(),
        Ok(StreamEnd::Cancelled) => session.abort(),
        Err(e) => {
            warn!(error = %e, "stream failed");
            session.fail(e, options.failure_display);
        }
    }
}

/// The frame decoding loop.
///
/// Chunks are processed strictly in arrival order; the session text is
/// only ever appended from here. Cancellation is checked before every
/// chunk read.
async fn drive(
    mut chunks: ByteStream,
    session: &StreamSession,
    options: &StreamOptions,
) -> Result<StreamEnd, StreamError> {
    let cancel = session.cancel_token();
    let mut decoder = FrameDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
            next = next_chunk(&mut chunks, options.idle_timeout) => next?,
        };

        match next {
            Some(chunk) => {
                session.mark_streaming();
                decoder.push(&chunk);
                while let Some(frame) = decoder.next_frame() {
                    // The sentinel ends the stream immediately; frames
                    // trailing it in the buffer are never processed.
                    if apply_frame(&frame, session, options)? == FrameOutcome::Done {
                        return Ok(StreamEnd::Done);
                    }
                }
            }
            None => {
                // Natural end of body, possibly with an unterminated
                // final frame still buffered.
                if let Some(frame) = decoder.finish() {
                    apply_frame(&frame, session, options)?;
                }
                return Ok(StreamEnd::Done);
            }
        }
    }
}

async fn next_chunk(
    chunks: &mut ByteStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>, StreamError> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, chunks.next())
            .await
            .map_err(|_| StreamError::StallTimeout(limit))?,
        None => chunks.next().await,
    };
    next.transpose()
}

fn apply_frame(
    frame: &str,
    session: &StreamSession,
    options: &StreamOptions,
) -> Result<FrameOutcome, StreamError> {
    let payload = sse::frame_payload(frame);
    if payload.is_empty() {
        return Ok(FrameOutcome::Continue);
    }

    let event = match ExplainEvent::parse(payload) {
        Ok(Some(event)) => event,
        Ok(None) => return Ok(FrameOutcome::Done),
        Err(e) => {
            // Malformed frames are isolated; they never end the stream.
            warn!(error = %e, frame = payload, "skipping malformed frame");
            return Ok(FrameOutcome::Continue);
        }
    };

    if let Some(content) = event.content {
        session.append(&content);
    }

    if let Some(message) = event.error {
        match options.error_frames {
            ErrorFramePolicy::Stop => return Err(StreamError::Server(message)),
            ErrorFramePolicy::Report => {
                warn!(%message, "server reported in-band error, continuing");
            }
        }
    }

    Ok(FrameOutcome::Continue)
}
