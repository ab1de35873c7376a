//! Injected authentication for the streaming endpoint.
//!
//! The consumer never reads ambient token state; it asks an
//! [`AuthProvider`] for headers before each request, so tests and hosts
//! can supply their own token source (refresh flows included) without
//! touching globals.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::consumer::StreamError;
use crate::options::SecretString;

/// Produces the authentication headers for one streaming request.
///
/// Awaited before any network call; a failure here fails the session
/// without opening a connection.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Return the headers to attach, typically `{"Authorization": "Bearer ..."}`.
    async fn auth_headers(&self) -> Result<HashMap<String, String>, StreamError>;
}

/// Static bearer-token provider.
///
/// # Example
/// ```
/// use hackitech_assistant::auth::BearerToken;
///
/// let auth = BearerToken::new("session-token");
/// ```
pub struct BearerToken {
    token: SecretString,
}

impl BearerToken {
    /// Create a provider around a fixed token.
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for BearerToken {
    async fn auth_headers(&self) -> Result<HashMap<String, String>, StreamError> {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.token.expose_secret()),
        );
        Ok(headers)
    }
}
