//! Pipeline stages for turning a PDF into two spoken renditions.
//!
//! Each submodule implements one step and hides its external collaborator
//! behind a trait.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ translate ──▶ speech (original) ──▶ speech (translated)
//! (pdfium)    (HTTP, retry)  (HTTP, retry)         (HTTP, retry)
//! ```
//!
//! 1. [`extract`]: concatenate per-page text; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 2. [`translate`]: one translation call under the retry policy
//! 3. [`speech`]: chunked TTS calls under the retry policy, written to
//!    an output slot
//! 4. [`languages`]: the language table offered on the upload form

pub mod extract;
pub mod languages;
pub mod speech;
pub mod translate;

use crate::error::Pdf2VoiceError;
use reqwest::Client;
use std::time::Duration;

/// User-Agent sent to both backends.
pub const USER_AGENT: &str = concat!("pdf2voice/", env!("CARGO_PKG_VERSION"));

/// Maximum characters of an error body kept in [`crate::error::BackendError`].
const SNIPPET_CHARS: usize = 200;

/// Build the shared HTTP client with a per-call timeout.
///
/// A call exceeding `timeout_secs` surfaces from reqwest as a timeout,
/// which the retry layer treats as transient.
pub fn http_client(timeout_secs: u64) -> Result<Client, Pdf2VoiceError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Pdf2VoiceError::HttpClient(e.to_string()))
}

/// First few hundred characters of a response body, for error messages.
pub(crate) fn snippet(body: &str) -> String {
    let mut out: String = body.chars().take(SNIPPET_CHARS).collect();
    if body.chars().count() > SNIPPET_CHARS {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 1);
        assert!(s.ends_with('…'));
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn http_client_builds() {
        assert!(http_client(5).is_ok());
    }
}
