//! Prompt enrichment: inline the content of linked URLs and `@file` mentions.
//!
//! Runs on the chat worker because it performs I/O. The composed text is
//! what gets sent and recorded as the user turn:
//!
//! ```text
//! Content from URL https://example.com:
//!
//! <page text>
//!
//! ---
//!
//! Content from file notes.md:
//!
//! <file text>
//!
//! ---
//!
//! User message: <typed text>
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use murmur_transport::{HttpRequest, Transport};
use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[\w.\-/:?=&%#]+").unwrap_or_else(|e| panic!("invalid URL regex: {e}"))
});

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@[\w.\-]+").unwrap_or_else(|e| panic!("invalid mention regex: {e}"))
});

/// Sent with URL fetches; some sites refuse clients without one.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 1024;

/// Builds the outgoing user message from what was typed.
pub struct PromptComposer<T> {
    transport: Arc<T>,
    fetch_urls: bool,
    url_timeout: Duration,
    base_dir: PathBuf,
}

impl<T> Clone for PromptComposer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            fetch_urls: self.fetch_urls,
            url_timeout: self.url_timeout,
            base_dir: self.base_dir.clone(),
        }
    }
}

impl<T: Transport> PromptComposer<T> {
    /// Composer that fetches URLs and resolves mentions against the
    /// current directory.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            fetch_urls: true,
            url_timeout: Duration::from_secs(30),
            base_dir: PathBuf::from("."),
        }
    }

    /// Enable or disable inlining of the first linked URL.
    #[must_use]
    pub fn fetch_urls(mut self, enabled: bool) -> Self {
        self.fetch_urls = enabled;
        self
    }

    /// Timeout for the URL fetch.
    #[must_use]
    pub fn url_timeout(mut self, timeout: Duration) -> Self {
        self.url_timeout = timeout;
        self
    }

    /// Directory `@file` mentions are resolved against.
    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Produce the message to send for `text`.
    ///
    /// Failures to fetch or read are logged and skipped; the typed text is
    /// always part of the result.
    pub async fn compose(&self, text: &str) -> String {
        let mut prepended = String::new();

        if self.fetch_urls {
            if let Some(url) = find_url(text) {
                match self
                    .transport
                    .fetch(HttpRequest::get(url, self.url_timeout).header("User-Agent", USER_AGENT))
                    .await
                {
                    Ok(body) => {
                        let page = strip_html(&String::from_utf8_lossy(&body));
                        let _ = write!(prepended, "Content from URL {url}:\n\n{page}\n\n---\n\n");
                    }
                    Err(e) => tracing::warn!(url, error = %e, "could not fetch linked URL"),
                }
            }
        }

        for name in file_mentions(text) {
            let path = self.base_dir.join(name);
            match tokio::fs::read(&path).await {
                Ok(bytes) if is_binary(&bytes) => {
                    let _ = write!(
                        prepended,
                        "Content from binary file {name} was not included.\n\n"
                    );
                }
                Ok(bytes) => {
                    let contents = String::from_utf8_lossy(&bytes);
                    let _ = write!(
                        prepended,
                        "Content from file {name}:\n\n{contents}\n\n---\n\n"
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read mentioned file")
                }
            }
        }

        if prepended.is_empty() {
            text.to_owned()
        } else {
            format!("{prepended}User message: {text}")
        }
    }
}

/// First `http://` or `https://` URL in `text`.
pub fn find_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

/// File names mentioned as `@name`, in order, without the `@`.
pub fn file_mentions(text: &str) -> Vec<&str> {
    MENTION_RE
        .find_iter(text)
        .map(|m| &m.as_str()[1..])
        .collect()
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// Drop everything between `<` and `>`.
fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text
}
