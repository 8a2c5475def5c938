//! Events flowing from network workers to the single consumer.

use std::fmt;

use crate::catalog::Catalog;

/// Identifies one chat generation.
///
/// Ids increase monotonically per client, so events from a generation that
/// is no longer current can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationId(u64);

impl GenerationId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Whether a chat generation is in flight.
///
/// `Cancelling` is a view over `Generating` with the cancellation flag
/// raised: the worker keeps running until it next checks the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationState {
    /// No generation in flight; a new one may start.
    #[default]
    Idle,
    /// A generation is streaming.
    Generating,
    /// A generation is streaming and has been asked to stop.
    Cancelling,
}

impl GenerationState {
    /// Whether a generation is in flight, cancelling or not.
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Severity attached to a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Connected, models available.
    Success,
    /// Disconnected or something failed.
    Error,
    /// Neutral information.
    Info,
}

/// Everything a worker can report to the consumer.
///
/// Workers never touch client state; they only enqueue these. The consumer
/// applies them in arrival order. Events of one generation arrive in the
/// order they were produced: any number of [`Delta`](EngineEvent::Delta)s
/// followed by exactly one terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The user turn as it was actually sent (after prompt enrichment).
    UserMessagePrepared {
        /// Owning generation.
        generation: GenerationId,
        /// Final user message content.
        content: String,
    },
    /// A fragment of assistant text. May be empty.
    Delta {
        /// Owning generation.
        generation: GenerationId,
        /// The fragment.
        text: String,
    },
    /// The server signalled `done: true`.
    Done {
        /// Owning generation.
        generation: GenerationId,
    },
    /// The worker observed the cancellation flag and stopped.
    Cancelled {
        /// Owning generation.
        generation: GenerationId,
    },
    /// The request failed at the transport level.
    Failed {
        /// Owning generation.
        generation: GenerationId,
        /// Human-readable cause.
        reason: String,
    },
    /// A catalog fetch parsed every entry; replace the current catalog.
    CatalogReplaced(Catalog),
    /// A catalog fetch failed; keep the current catalog.
    CatalogUnavailable(String),
    /// A finished conversation could not be written to the store.
    SaveFailed {
        /// Id of the conversation.
        conversation: String,
        /// Store error, rendered.
        reason: String,
    },
}

impl EngineEvent {
    /// The generation a chat event belongs to; `None` for catalog and
    /// persistence events.
    pub fn generation(&self) -> Option<GenerationId> {
        match self {
            Self::UserMessagePrepared { generation, .. }
            | Self::Delta { generation, .. }
            | Self::Done { generation }
            | Self::Cancelled { generation }
            | Self::Failed { generation, .. } => Some(*generation),
            Self::CatalogReplaced(_) | Self::CatalogUnavailable(_) | Self::SaveFailed { .. } => {
                None
            }
        }
    }

    /// Whether this event ends its generation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::Cancelled { .. } | Self::Failed { .. }
        )
    }
}
