//! ScriptedTransport: replays fixed byte deliveries per route.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use murmur_transport::{Flow, HttpRequest, Transport, TransportError};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
enum Step {
    Chunk(Vec<u8>),
    Pause(Duration),
    Gate(Arc<Notify>),
}

/// What one route answers: a sequence of deliveries, then an outcome.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<Step>,
    outcome: Result<(), TransportError>,
}

impl Script {
    /// Deliver each chunk in order, then complete successfully.
    pub fn chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            steps: chunks.into_iter().map(|c| Step::Chunk(c.into())).collect(),
            outcome: Ok(()),
        }
    }

    /// Fail immediately, delivering nothing.
    pub fn fail(error: TransportError) -> Self {
        Self {
            steps: Vec::new(),
            outcome: Err(error),
        }
    }

    /// Append one delivery.
    #[must_use]
    pub fn then_chunk(mut self, chunk: impl Into<Vec<u8>>) -> Self {
        self.steps.push(Step::Chunk(chunk.into()));
        self
    }

    /// Sleep before the next step.
    #[must_use]
    pub fn then_pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    /// Block until `gate` is notified.
    #[must_use]
    pub fn then_wait(mut self, gate: Arc<Notify>) -> Self {
        self.steps.push(Step::Gate(gate));
        self
    }

    /// End with `error` after the deliveries instead of succeeding.
    #[must_use]
    pub fn then_fail(mut self, error: TransportError) -> Self {
        self.outcome = Err(error);
        self
    }
}

/// A [`Transport`] answering from scripts matched by URL suffix.
///
/// Every request is recorded. A URL no route matches fails with a 404
/// status, like a server without that endpoint.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Vec<(String, Script)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer URLs ending in `suffix` with `script`.
    #[must_use]
    pub fn route(mut self, suffix: impl Into<String>, script: Script) -> Self {
        self.routes.push((suffix.into(), script));
        self
    }

    /// Every request performed so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for ScriptedTransport {
    async fn perform(
        &self,
        request: HttpRequest,
        on_bytes: &mut (dyn FnMut(&[u8]) -> Flow + Send),
    ) -> Result<(), TransportError> {
        let script = self
            .routes
            .iter()
            .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
            .map(|(_, script)| script.clone());
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let Some(script) = script else {
            return Err(TransportError::Status {
                status: 404,
                body: format!("no route for {url}"),
            });
        };

        for step in script.steps {
            match step {
                Step::Chunk(bytes) => {
                    if on_bytes(&bytes) == Flow::Abort {
                        return Err(TransportError::Aborted);
                    }
                }
                Step::Pause(duration) => tokio::time::sleep(duration).await,
                Step::Gate(gate) => gate.notified().await,
            }
        }
        script.outcome
    }
}
