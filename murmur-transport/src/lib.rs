#![deny(missing_docs)]
//! Chunk-delivering HTTP transport for murmur.
//!
//! A [`Transport`] performs one request and hands every piece of the
//! response body to a caller-supplied sink as soon as it arrives, in order,
//! exactly once. The sink answers [`Flow::Continue`] or [`Flow::Abort`];
//! aborting ends the request promptly with [`TransportError::Aborted`].
//!
//! [`HttpTransport`] is the `reqwest` implementation. Tests substitute a
//! scripted transport so stream handling can be exercised without sockets.

mod error;
mod http;

use std::fmt;
use std::future::Future;
use std::time::Duration;

pub use http::HttpTransport;
pub use murmur_types::TransportError;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// What the byte sink wants the transport to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep delivering.
    Continue,
    /// Stop reading and fail the request with [`TransportError::Aborted`].
    Abort,
}

/// One request description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Extra headers, sent in order.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
    /// Ceiling for the whole exchange, body streaming included.
    pub timeout: Duration,
}

impl HttpRequest {
    /// A body-less `GET`.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    /// A `POST` with a JSON body and `Content-Type: application/json`.
    pub fn post_json(url: impl Into<String>, body: Vec<u8>, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body),
            timeout,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Performs HTTP requests, streaming the response body into a sink.
///
/// Uses RPITIT and is not object-safe; engine components are generic over
/// `T: Transport`.
pub trait Transport: Send + Sync {
    /// Perform `request`, calling `on_bytes` with each contiguous slice of
    /// the response body in arrival order.
    ///
    /// A non-success status fails with [`TransportError::Status`] without
    /// calling `on_bytes`. Returning [`Flow::Abort`] from `on_bytes` ends
    /// the request with [`TransportError::Aborted`].
    fn perform(
        &self,
        request: HttpRequest,
        on_bytes: &mut (dyn FnMut(&[u8]) -> Flow + Send),
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Perform `request` and collect the whole body.
    fn fetch(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send {
        async move {
            let mut body = Vec::new();
            self.perform(request, &mut |chunk: &[u8]| {
                body.extend_from_slice(chunk);
                Flow::Continue
            })
            .await?;
            Ok(body)
        }
    }
}
