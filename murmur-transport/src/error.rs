//! Mapping `reqwest` failures onto [`TransportError`].

use std::time::Duration;

use murmur_types::TransportError;

/// Map a [`reqwest::Error`] to a [`TransportError`].
///
/// `timeout` is the ceiling that was configured for the request; reqwest
/// does not report it back.
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::ConnectFailed(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Map a non-success response to [`TransportError::Status`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: String) -> TransportError {
    TransportError::Status {
        status: status.as_u16(),
        body,
    }
}
