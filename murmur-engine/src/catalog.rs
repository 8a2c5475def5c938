//! Model catalog fetching.

use std::sync::Arc;
use std::time::Duration;

use murmur_transport::{HttpRequest, Transport};
use murmur_types::{Catalog, EngineEvent, FetchError};

use crate::EventSender;
use crate::wire::parse_catalog;

/// Fetches `/api/tags` and turns it into a [`Catalog`].
pub struct CatalogFetcher<T> {
    transport: Arc<T>,
    url: String,
    timeout: Duration,
}

impl<T: Transport> CatalogFetcher<T> {
    /// Fetcher for the tags endpoint at `url`.
    pub fn new(transport: Arc<T>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            url: url.into(),
            timeout,
        }
    }

    /// `GET` the tags endpoint and parse every entry.
    ///
    /// # Errors
    ///
    /// [`FetchError::Transport`] if the request fails, [`FetchError::Parse`]
    /// if any part of the body is not a valid catalog.
    pub async fn fetch(&self) -> Result<Catalog, FetchError> {
        let body = self
            .transport
            .fetch(HttpRequest::get(self.url.as_str(), self.timeout))
            .await?;
        parse_catalog(&body)
    }

    /// Fetch and publish the outcome as a single event.
    ///
    /// Runs on a worker; the result only reaches client state through
    /// `events`.
    pub(crate) async fn run(self, events: EventSender) {
        let event = match self.fetch().await {
            Ok(catalog) => {
                tracing::debug!(url = %self.url, models = catalog.len(), "catalog fetched");
                EngineEvent::CatalogReplaced(catalog)
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "catalog fetch failed");
                EngineEvent::CatalogUnavailable(e.to_string())
            }
        };
        let _ = events.send(event);
    }
}
