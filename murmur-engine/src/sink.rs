//! The consumer-side observer of engine activity.

use murmur_types::{Catalog, ChatMessage, GenerationState, StatusKind};

/// Receives engine notifications on the consumer task.
///
/// Every method is called from [`ChatClient`](crate::ChatClient) while it
/// applies an event, after client state has been updated, so an
/// implementation can read a consistent state from the client afterwards.
/// Implementations must not block for long: nothing else is applied while
/// a callback runs.
pub trait EventSink {
    /// The user turn was recorded, with any inlined context.
    fn on_user_message(&mut self, _message: &ChatMessage) {}

    /// A fragment of the assistant reply arrived. May be empty.
    fn on_delta(&mut self, text: &str);

    /// The server finished the reply; `message` is what was recorded.
    fn on_generation_finished(&mut self, message: &ChatMessage);

    /// The generation was cancelled; `message` holds the partial reply.
    fn on_generation_cancelled(&mut self, message: &ChatMessage);

    /// The request failed; nothing was recorded for the reply.
    fn on_generation_failed(&mut self, reason: &str);

    /// A new catalog is in place, with the resulting selection.
    fn on_catalog_replaced(&mut self, catalog: &Catalog, selected: Option<&str>);

    /// A one-line status for display.
    fn on_status(&mut self, text: &str, kind: StatusKind);

    /// The generation state changed.
    fn on_generation_state(&mut self, _state: GenerationState) {}
}
