//! # hackitech-assistant - Explanation Streaming Client
//!
//! Client library for HackiTech's AI explanation assistant: it consumes
//! the backend's chat-streaming endpoint and exposes the answer as it is
//! generated, one incremental append at a time.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental SSE frame decoding, safe across arbitrary chunk and
//!   UTF-8 boundaries
//! - Session handles with cooperative cancellation; starting a new
//!   stream supersedes the previous one
//! - Injected authentication (no ambient token state)
//! - Configurable policies for in-band server errors and failure display
//!
//! ## Architecture
//!
//! One [`consumer::StreamingResponseConsumer`] owns the HTTP call, the
//! byte-to-text decode loop and the at-most-one-active-session rule.
//! Each `start` returns a [`session::StreamSession`] handle whose text
//! and status the host UI polls or awaits; the stream task is the only
//! writer.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use hackitech_assistant::auth::BearerToken;
//! use hackitech_assistant::consumer::StreamingResponseConsumer;
//! use hackitech_assistant::model::StreamRequest;
//! use hackitech_assistant::options::StreamOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let consumer = StreamingResponseConsumer::new(
//!         StreamOptions::default(),
//!         Arc::new(BearerToken::new(std::env::var("HACKITECH_TOKEN")?)),
//!     )?;
//!
//!     let session = consumer.start(StreamRequest::new(
//!         "Explain how a reflected XSS payload reaches the victim",
//!     ));
//!
//!     session.wait().await;
//!     println!("{}", session.text());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod consumer;
pub mod http;
pub mod model;
pub mod options;
pub mod session;
pub mod sse;

// Re-exports for convenience
pub use auth::{AuthProvider, BearerToken};
pub use consumer::{StreamError, StreamTransport, StreamingResponseConsumer};
pub use model::{ExplainEvent, StreamRequest};
pub use options::StreamOptions;
pub use session::{SessionStatus, StreamSession};
