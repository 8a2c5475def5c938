//! `/api/tags` and `/api/chat` wire types.
//!
//! Requests are serialized from borrowed data so a chat snapshot is not
//! copied twice. Streamed chat records are read loosely (any JSON object,
//! fields optional) because the server adds fields freely:
//! ```text
//! {"model":"llama3.2","message":{"role":"assistant","content":"Hel"},"done":false}
//! {"model":"llama3.2","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}
//! ```

use murmur_types::{Catalog, ChatMessage, FetchError, InferenceOptions, Model};
use serde::{Deserialize, Serialize};

/// `/api/chat` request body.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub options: &'a InferenceOptions,
    pub stream: bool,
}

/// `/api/tags` response body.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelRecord>,
}

/// One entry of the `models` array. Only `name` is used.
#[derive(Debug, Deserialize)]
struct ModelRecord {
    name: String,
}

/// Decode a `/api/tags` body into a catalog.
///
/// All or nothing: a missing `models` array or any record without a string
/// `name` rejects the whole body.
pub(crate) fn parse_catalog(body: &[u8]) -> Result<Catalog, FetchError> {
    let tags: TagsResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(tags
        .models
        .into_iter()
        .map(|record| Model::new(record.name))
        .collect())
}

/// What one streamed chat line contributed.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct StreamRecord {
    /// `message.content`, when present as a string (empty included).
    pub content: Option<String>,
    /// `done == true`.
    pub done: bool,
}

/// Parse one NDJSON line. `None` if the line is not JSON.
pub(crate) fn parse_stream_line(line: &str) -> Option<StreamRecord> {
    let json: serde_json::Value = serde_json::from_str(line).ok()?;
    Some(StreamRecord {
        content: json["message"]["content"].as_str().map(str::to_owned),
        done: json["done"].as_bool().unwrap_or(false),
    })
}
