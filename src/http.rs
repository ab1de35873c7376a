//! HTTP client construction for the streaming transport.

use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;

use crate::options::StreamOptions;

/// Build a configured HTTP client from stream options.
///
/// Applies common configuration like timeouts and proxies.
pub fn build_http_client(options: &StreamOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &options.proxy {
        if let Ok(proxy) = reqwest::Proxy::all(proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified.
pub fn add_headers(
    mut request: RequestBuilder,
    headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}
