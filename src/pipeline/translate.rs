//! Translation: send extracted text to the translation backend under the
//! retry policy.
//!
//! [`GoogleTranslator`] talks to the public Google Translate web endpoint:
//!
//! ```text
//! POST {base}/translate_a/single?client=gtx&sl=auto&tl=<dest>&dt=t
//! body: q=<text>
//! → [[["Bonjour le monde","Hello world",null,null,10]],null,"en",...]
//! ```
//!
//! The first element lists translated segments; their first fields are
//! concatenated in order.

use crate::error::BackendError;
use crate::pipeline::snippet;
use crate::progress::PipelineProgressCallback;
use crate::retry::{RetryOutcome, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info};

const BACKEND: &str = "translate";

/// One translation call, no retries.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, text: &str, dest: &str) -> Result<String, BackendError>;
}

/// Run `backend` under `policy`.
///
/// Empty text is returned unchanged without contacting the backend.
pub async fn translate_with_retry(
    backend: &dyn TranslationBackend,
    text: &str,
    dest: &str,
    policy: &RetryPolicy,
    progress: &dyn PipelineProgressCallback,
) -> RetryOutcome<String> {
    if text.is_empty() {
        debug!("nothing to translate");
        return RetryOutcome::Success {
            value: String::new(),
            attempts: 0,
        };
    }

    info!(dest, chars = text.chars().count(), "translating");
    policy
        .run(BACKEND, progress, move |_| backend.translate(text, dest))
        .await
}

/// [`TranslationBackend`] backed by the Google Translate web endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    http: Client,
    base_url: String,
}

impl GoogleTranslator {
    /// `http` should carry the per-request timeout; see [`crate::pipeline::http_client`].
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslator {
    async fn translate(&self, text: &str, dest: &str) -> Result<String, BackendError> {
        let url = format!("{}/translate_a/single", self.base_url);

        let response = self
            .http
            .post(&url)
            .query(&[("client", "gtx"), ("sl", "auto"), ("tl", dest), ("dt", "t")])
            .form(&[("q", text)])
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, &e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited { backend: BACKEND });
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, &e))?;

        if !status.is_success() {
            return Err(BackendError::Http {
                backend: BACKEND,
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let translated = parse_translation(&body)?;
        debug!(chars = translated.chars().count(), "translation received");
        Ok(translated)
    }
}

/// Join the translated segments of a `translate_a/single` response.
fn parse_translation(body: &str) -> Result<String, BackendError> {
    let protocol = |detail: String| BackendError::Protocol {
        backend: BACKEND,
        detail,
    };

    let value: Value =
        serde_json::from_str(body).map_err(|e| protocol(format!("invalid JSON: {e}")))?;

    let segments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| protocol(format!("no segment list in {}", snippet(body))))?;

    let mut out = String::new();
    for segment in segments {
        if let Some(part) = segment.get(0).and_then(Value::as_str) {
            out.push_str(part);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[test]
    fn parse_joins_segments_in_order() {
        let body = r#"[[["Bonjour. ","Hello. ",null,null,10],["Le monde","The world",null,null,10]],null,"en"]"#;
        assert_eq!(parse_translation(body).unwrap(), "Bonjour. Le monde");
    }

    #[test]
    fn parse_skips_transliteration_rows() {
        let body = r#"[[["Привет","Hello",null,null,1],[null,null,"Privet"]],null,"en"]"#;
        assert_eq!(parse_translation(body).unwrap(), "Привет");
    }

    #[test]
    fn parse_rejects_unexpected_shape() {
        let err = parse_translation(r#"{"error":"nope"}"#).unwrap_err();
        assert!(matches!(err, BackendError::Protocol { .. }));
        assert!(parse_translation("not json").is_err());
    }

    struct FlakyTranslator {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl TranslationBackend for FlakyTranslator {
        async fn translate(&self, text: &str, dest: &str) -> Result<String, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(BackendError::Timeout { backend: BACKEND })
            } else {
                Ok(format!("[{dest}] {text}"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_backend_result_exactly() {
        let backend = FlakyTranslator {
            calls: AtomicU32::new(0),
            failures: 0,
        };
        let start = Instant::now();
        let outcome = translate_with_retry(
            &backend,
            "Hello world",
            "fr",
            &RetryPolicy::default(),
            &NoopProgressCallback,
        )
        .await;
        assert_eq!(outcome.ok().as_deref(), Some("[fr] Hello world"));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_on_every_attempt_exhaust() {
        let backend = FlakyTranslator {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        };
        let start = Instant::now();
        let outcome = translate_with_retry(
            &backend,
            "Hello",
            "de",
            &RetryPolicy::default(),
            &NoopProgressCallback,
        )
        .await;
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_skips_backend() {
        let backend = FlakyTranslator {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        };
        let outcome =
            translate_with_retry(&backend, "", "fr", &RetryPolicy::default(), &NoopProgressCallback)
                .await;
        assert_eq!(outcome.ok().as_deref(), Some(""));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
