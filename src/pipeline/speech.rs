//! Speech synthesis: speak a text into an output slot under the retry policy.
//!
//! One attempt = synthesize the whole text and write the MP3 to its slot.
//! A failed attempt is retried from scratch; a slot is only replaced once a
//! complete artifact exists.
//!
//! [`GoogleTts`] talks to the Google Translate TTS endpoint, which accepts at
//! most ~100 characters per request. Text is split into chunks on
//! whitespace and the MP3 frames of each chunk are concatenated in order,
//! which players handle as one continuous stream.

use crate::error::BackendError;
use crate::pipeline::languages::{google_tts_languages, LanguageSet};
use crate::pipeline::snippet;
use crate::progress::PipelineProgressCallback;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::storage::{write_slot, OutputSlot};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

const BACKEND: &str = "synthesize";

/// One synthesis call, no retries.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Produce MP3 bytes speaking `text` in `lang`.
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>, BackendError>;

    /// The languages this backend can speak, for the upload form.
    fn supported_languages(&self) -> LanguageSet;
}

/// Run `backend` under `policy` and store the audio in `slot`.
pub async fn synthesize_with_retry(
    backend: &dyn SpeechBackend,
    text: &str,
    lang: &str,
    slot: &OutputSlot,
    policy: &RetryPolicy,
    progress: &dyn PipelineProgressCallback,
) -> RetryOutcome<OutputSlot> {
    info!(lang, slot = ?slot.kind, chars = text.chars().count(), "synthesizing");
    policy
        .run(BACKEND, progress, move |_| async move {
            let audio = backend.synthesize(text, lang).await?;
            write_slot(slot, &audio)
                .await
                .map_err(|e| BackendError::Io {
                    backend: BACKEND,
                    path: slot.path.clone(),
                    detail: e.to_string(),
                })?;
            debug!(path = %slot.path.display(), bytes = audio.len(), "audio written");
            Ok(slot.clone())
        })
        .await
}

/// [`SpeechBackend`] backed by the Google Translate TTS endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTts {
    http: Client,
    base_url: String,
    chunk_chars: usize,
}

impl GoogleTts {
    pub fn new(http: Client, base_url: impl Into<String>, chunk_chars: usize) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chunk_chars: chunk_chars.max(1),
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        lang: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, BackendError> {
        let url = format!("{}/translate_tts", self.base_url);
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", lang),
                ("q", chunk),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, &e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited { backend: BACKEND });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                backend: BACKEND,
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, &e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for GoogleTts {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>, BackendError> {
        let chunks = chunk_text(text, self.chunk_chars);
        if chunks.is_empty() {
            return Err(BackendError::Rejected {
                backend: BACKEND,
                reason: "no text to speak".to_string(),
            });
        }

        let total = chunks.len();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let part = self.fetch_chunk(chunk, lang, idx, total).await?;
            debug!(chunk = idx + 1, total, bytes = part.len(), "chunk synthesized");
            audio.extend_from_slice(&part);
        }
        Ok(audio)
    }

    fn supported_languages(&self) -> LanguageSet {
        google_tts_languages()
    }
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Words are packed greedily and joined by single spaces; a word longer
/// than `max_chars` is cut into `max_chars`-sized pieces. Whitespace-only
/// input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use crate::storage::SlotKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[test]
    fn chunking_packs_words_under_the_limit() {
        let chunks = chunk_text("the quick brown fox jumps", 10);
        assert_eq!(chunks, vec!["the quick", "brown fox", "jumps"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn chunking_splits_overlong_words() {
        let chunks = chunk_text("ab abcdefghij cd", 4);
        assert_eq!(chunks, vec!["ab", "abcd", "efgh", "ij", "cd"]);
    }

    #[test]
    fn chunking_counts_characters_not_bytes() {
        let chunks = chunk_text("élève été", 5);
        assert_eq!(chunks, vec!["élève", "été"]);
    }

    #[test]
    fn chunking_whitespace_only_is_empty() {
        assert!(chunk_text(" \n\t ", 100).is_empty());
        assert_eq!(chunk_text("Hello world", 100), vec!["Hello world"]);
    }

    struct FlakySpeech {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl SpeechBackend for FlakySpeech {
        async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(BackendError::Timeout { backend: BACKEND })
            } else {
                Ok(format!("{lang}:{text}").into_bytes())
            }
        }

        fn supported_languages(&self) -> LanguageSet {
            LanguageSet::new()
        }
    }

    fn slot(dir: &std::path::Path) -> OutputSlot {
        OutputSlot {
            kind: SlotKind::Original,
            path: dir.join("original_output.mp3"),
            url: "/static/original_output.mp3".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_writes_slot_and_returns_it() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FlakySpeech {
            calls: AtomicU32::new(0),
            failures: 1,
        };
        let slot = slot(dir.path());
        let start = Instant::now();
        let outcome = synthesize_with_retry(
            &backend,
            "Hello",
            "en",
            &slot,
            &RetryPolicy::default(),
            &NoopProgressCallback,
        )
        .await;
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.ok(), Some(slot.clone()));
        assert_eq!(std::fs::read(&slot.path).unwrap(), b"en:Hello");
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_leaves_slot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FlakySpeech {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        };
        let slot = slot(dir.path());
        std::fs::write(&slot.path, b"previous").unwrap();
        let start = Instant::now();
        let outcome = synthesize_with_retry(
            &backend,
            "Hello",
            "en",
            &slot,
            &RetryPolicy::default(),
            &NoopProgressCallback,
        )
        .await;
        assert!(matches!(outcome, RetryOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(std::fs::read(&slot.path).unwrap(), b"previous");
    }

    #[tokio::test(start_paused = true)]
    async fn unwritable_slot_is_fatal() {
        let backend = FlakySpeech {
            calls: AtomicU32::new(0),
            failures: 0,
        };
        let slot = slot(std::path::Path::new("/definitely/not/a/dir"));
        let outcome = synthesize_with_retry(
            &backend,
            "Hello",
            "en",
            &slot,
            &RetryPolicy::default(),
            &NoopProgressCallback,
        )
        .await;
        assert!(matches!(
            outcome,
            RetryOutcome::Fatal {
                attempt: 1,
                error: BackendError::Io { .. }
            }
        ));
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn google_tts_concatenates_chunks_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("idx", "0"))
            .and(query_param("total", "2"))
            .and(query_param("tl", "fr"))
            .and(query_param("q", "Bonjour"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AAA".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("idx", "1"))
            .and(query_param("q", "monde"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"BBB".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let tts = GoogleTts::new(Client::new(), server.uri(), 7);
        let audio = tts.synthesize("Bonjour monde", "fr").await.unwrap();
        assert_eq!(audio, b"AAABBB");
    }

    #[tokio::test]
    async fn google_tts_rejects_empty_text_without_calling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let tts = GoogleTts::new(Client::new(), server.uri(), 100);
        let err = tts.synthesize("   ", "en").await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn google_tts_bad_language_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unsupported tl"))
            .mount(&server)
            .await;

        let tts = GoogleTts::new(Client::new(), server.uri(), 100);
        match tts.synthesize("Hello", "xx").await {
            Err(BackendError::Http { status: 400, body, .. }) => {
                assert!(body.contains("unsupported"))
            }
            other => panic!("expected Http(400), got: {other:?}"),
        }
    }

    #[test]
    fn google_tts_reports_language_table() {
        let tts = GoogleTts::new(Client::new(), "http://localhost", 100);
        assert!(tts.supported_languages().contains_key("fr"));
    }
}
