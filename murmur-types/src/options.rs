//! Request tuning: inference options and engine settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default inference server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Sampling and context options forwarded verbatim in the `options` object
/// of every `/api/chat` request.
///
/// No validation happens client-side; the server enforces its own limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOptions {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling probability.
    pub top_p: f64,
    /// Top-k sampling.
    pub top_k: u32,
    /// Random seed.
    pub seed: i64,
    /// Context window size in tokens.
    #[serde(rename = "num_ctx")]
    pub context_size: u32,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            top_k: 40,
            seed: 0,
            context_size: 2048,
        }
    }
}

/// Where and how the engine talks to the inference server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Server base URL without a trailing path, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Ceiling for one chat request, streaming included.
    pub request_timeout: Duration,
    /// Ceiling for one catalog fetch.
    pub catalog_timeout: Duration,
    /// Capacity of the per-request line buffer in bytes.
    pub line_capacity: usize,
}

impl EngineSettings {
    /// `GET` endpoint listing installed models.
    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url.trim_end_matches('/'))
    }

    /// `POST` endpoint for chat completions.
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            request_timeout: Duration::from_secs(30),
            catalog_timeout: Duration::from_secs(5),
            line_capacity: 8192,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_serialize_with_wire_names() {
        let json = serde_json::to_value(InferenceOptions::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "temperature": 0.8,
                "top_p": 0.9,
                "top_k": 40,
                "seed": 0,
                "num_ctx": 2048,
            })
        );
    }

    #[test]
    fn endpoint_urls() {
        let settings = EngineSettings {
            base_url: "http://host:1234/".into(),
            ..Default::default()
        };
        assert_eq!(settings.tags_url(), "http://host:1234/api/tags");
        assert_eq!(settings.chat_url(), "http://host:1234/api/chat");
    }

    #[test]
    fn default_settings_match_server_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.catalog_timeout, Duration::from_secs(5));
        assert_eq!(settings.line_capacity, 8192);
    }
}
