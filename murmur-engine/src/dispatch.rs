//! Chat stream dispatch: one streaming `/api/chat` request per generation.
//!
//! [`ChatStream`] is the byte sink handed to the transport. It reassembles
//! lines, decodes each as one NDJSON record, and publishes deltas and the
//! terminal event for its generation. Every event is tagged with the
//! generation so the consumer can drop leftovers from an earlier one.
//!
//! Per line, in this order:
//! 1. cancellation raised: publish `Cancelled`, stop
//! 2. not JSON: skip
//! 3. `message.content` is a string: publish `Delta`
//! 4. `done == true`: publish `Done`, stop
//!
//! Exactly one terminal event is published per generation.

use std::sync::Arc;
use std::time::Duration;

use murmur_transport::{Flow, HttpRequest, Transport, TransportError};
use murmur_types::{ChatMessage, EngineEvent, GenerationId, InferenceOptions};
use tokio_util::sync::CancellationToken;

use crate::EventSender;
use crate::compose::PromptComposer;
use crate::lines::LineReassembler;
use crate::wire::{ChatRequest, parse_stream_line};

/// Reason published when the body ends without `done: true`.
pub const INCOMPLETE_STREAM: &str = "stream ended before completion";

/// Byte sink for one chat generation.
pub struct ChatStream {
    lines: LineReassembler,
    decoder: Decoder,
}

struct Decoder {
    generation: GenerationId,
    cancel: CancellationToken,
    events: EventSender,
    terminated: bool,
}

impl Decoder {
    fn publish(&self, event: EngineEvent) {
        // The consumer may already be gone; nothing left to tell.
        let _ = self.events.send(event);
    }

    fn terminate(&mut self, event: EngineEvent) -> Flow {
        self.publish(event);
        self.terminated = true;
        Flow::Abort
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        if self.cancel.is_cancelled() {
            tracing::debug!(generation = %self.generation, "cancellation observed");
            return self.terminate(EngineEvent::Cancelled {
                generation: self.generation,
            });
        }

        let Some(record) = parse_stream_line(line) else {
            tracing::debug!(generation = %self.generation, line, "skipping malformed stream line");
            return Flow::Continue;
        };

        if let Some(text) = record.content {
            self.publish(EngineEvent::Delta {
                generation: self.generation,
                text,
            });
        }

        if record.done {
            return self.terminate(EngineEvent::Done {
                generation: self.generation,
            });
        }
        Flow::Continue
    }
}

impl ChatStream {
    /// Sink for `generation`, observing `cancel` and publishing to `events`.
    pub fn new(
        generation: GenerationId,
        cancel: CancellationToken,
        events: EventSender,
        line_capacity: usize,
    ) -> Self {
        Self {
            lines: LineReassembler::with_capacity(line_capacity),
            decoder: Decoder {
                generation,
                cancel,
                events,
                terminated: false,
            },
        }
    }

    /// Whether a terminal event has been published.
    pub fn is_terminated(&self) -> bool {
        self.decoder.terminated
    }

    /// Consume one delivery from the transport.
    ///
    /// Returns [`Flow::Abort`] once a terminal event has been published.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Flow {
        if self.decoder.terminated {
            return Flow::Abort;
        }
        match self.lines.feed(chunk) {
            Ok(lines) => {
                for line in lines {
                    if self.decoder.handle_line(&line) == Flow::Abort {
                        return Flow::Abort;
                    }
                }
                Flow::Continue
            }
            Err(overflow) => {
                tracing::warn!(
                    generation = %self.decoder.generation,
                    buffered = overflow.buffered,
                    incoming = overflow.incoming,
                    capacity = overflow.capacity,
                    "line buffer overflow, delivery dropped"
                );
                Flow::Continue
            }
        }
    }

    /// Settle the generation once the transport has returned.
    ///
    /// Publishes the terminal event if none went out yet. A raised
    /// cancellation flag wins over a transport error, so a stop requested
    /// while the server stalled still keeps the partial reply. Otherwise a
    /// transport error becomes `Failed`; a body that ended without `done`
    /// is first given its unterminated last line, then becomes `Cancelled`
    /// if the flag is raised or `Failed` otherwise.
    pub fn finish(mut self, result: Result<(), TransportError>) {
        if self.decoder.terminated {
            return;
        }
        let generation = self.decoder.generation;
        match result {
            Err(e) if self.decoder.cancel.is_cancelled() => {
                tracing::debug!(%generation, error = %e, "chat request ended after cancellation");
                self.decoder.terminate(EngineEvent::Cancelled { generation });
            }
            Err(e) => {
                tracing::debug!(%generation, error = %e, "chat request failed");
                self.decoder.terminate(EngineEvent::Failed {
                    generation,
                    reason: e.to_string(),
                });
            }
            Ok(()) => {
                if let Some(line) = self.lines.finish() {
                    if self.decoder.handle_line(&line) == Flow::Abort {
                        return;
                    }
                }
                let event = if self.decoder.cancel.is_cancelled() {
                    EngineEvent::Cancelled { generation }
                } else {
                    tracing::debug!(%generation, "stream ended without done");
                    EngineEvent::Failed {
                        generation,
                        reason: INCOMPLETE_STREAM.to_owned(),
                    }
                };
                self.decoder.terminate(event);
            }
        }
    }
}

/// Everything a chat worker needs, moved onto the worker.
pub(crate) struct ChatJob<T> {
    pub transport: Arc<T>,
    pub url: String,
    pub timeout: Duration,
    pub line_capacity: usize,
    pub generation: GenerationId,
    pub model: String,
    /// Conversation before this turn.
    pub history: Vec<ChatMessage>,
    pub user_text: String,
    pub options: InferenceOptions,
    pub composer: PromptComposer<T>,
    pub cancel: CancellationToken,
    pub events: EventSender,
}

impl<T: Transport> ChatJob<T> {
    /// Compose the user turn, post the request and stream the reply.
    pub(crate) async fn run(self) {
        let generation = self.generation;
        let content = self.composer.compose(&self.user_text).await;
        let _ = self.events.send(EngineEvent::UserMessagePrepared {
            generation,
            content: content.clone(),
        });

        let mut stream = ChatStream::new(
            generation,
            self.cancel.clone(),
            self.events.clone(),
            self.line_capacity,
        );

        if self.cancel.is_cancelled() {
            stream.decoder.terminate(EngineEvent::Cancelled { generation });
            return;
        }

        let mut messages = self.history;
        messages.push(ChatMessage::user(content));
        let body = match serde_json::to_vec(&ChatRequest {
            model: &self.model,
            messages: &messages,
            options: &self.options,
            stream: true,
        }) {
            Ok(body) => body,
            Err(e) => {
                stream.decoder.terminate(EngineEvent::Failed {
                    generation,
                    reason: format!("could not encode request: {e}"),
                });
                return;
            }
        };

        tracing::debug!(
            %generation,
            model = %self.model,
            url = %self.url,
            messages = messages.len(),
            "starting chat stream"
        );

        let result = self
            .transport
            .perform(
                HttpRequest::post_json(self.url.as_str(), body, self.timeout),
                &mut |chunk: &[u8]| stream.on_chunk(chunk),
            )
            .await;
        stream.finish(result);
        tracing::debug!(%generation, "chat stream finished");
    }
}
