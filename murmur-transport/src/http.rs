//! `reqwest`-backed [`Transport`].

use crate::error::{map_http_status, map_reqwest_error};
use crate::{Flow, HttpRequest, Method, Transport, TransportError};

/// HTTP transport over a shared [`reqwest::Client`].
///
/// The body is read with [`reqwest::Response::chunk`], so each delivery is
/// whatever the connection produced, of arbitrary size and alignment.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport over an existing client (custom TLS, proxies, ...).
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn perform(
        &self,
        request: HttpRequest,
        on_bytes: &mut (dyn FnMut(&[u8]) -> Flow + Send),
    ) -> Result<(), TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        tracing::debug!(method = %method, url = %url, ?timeout, "sending request");

        let mut builder = self.client.request(method, &url).timeout(timeout);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(url = %url, status = status.as_u16(), "request rejected");
            return Err(map_http_status(status, body));
        }

        let mut delivered = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?
        {
            delivered += chunk.len();
            if on_bytes(&chunk) == Flow::Abort {
                tracing::debug!(url = %url, delivered, "request aborted by sink");
                return Err(TransportError::Aborted);
            }
        }

        tracing::debug!(url = %url, delivered, "request complete");
        Ok(())
    }
}
