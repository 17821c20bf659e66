//! Request orchestration: one upload in, one rendition (or a classified
//! failure) out.
//!
//! ## State machine
//!
//! ```text
//! Received ──▶ Extracted ──▶ Translated ──▶ SynthesizedOriginal ──▶ SynthesizedTranslated ──▶ Succeeded
//!     │            │             │                    │                       │
//!     └────────────┴─────────────┴────────────────────┴───────────────────────┴──▶ Failed(reason)
//! ```
//!
//! Translation must succeed before either synthesis call starts. Once it
//! has, both synthesis calls always run (original text in the source
//! language, then translated text in the destination language) and their
//! outcomes are checked together afterwards.

use crate::config::{ExtractionFailurePolicy, ServiceConfig};
use crate::error::{BackendError, Pdf2VoiceError, RequestFailure};
use crate::pipeline::extract::{PdfiumExtractor, TextExtractor};
use crate::pipeline::languages::LanguageSet;
use crate::pipeline::speech::{synthesize_with_retry, GoogleTts, SpeechBackend};
use crate::pipeline::translate::{translate_with_retry, GoogleTranslator, TranslationBackend};
use crate::pipeline::http_client;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::retry::RetryOutcome;
use crate::storage::{OutputSlot, Storage};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Where a request is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Extracted,
    Translated,
    SynthesizedOriginal,
    SynthesizedTranslated,
    Succeeded,
    Failed(RequestFailure),
}

impl RequestStage {
    /// Lower-case label used in logs and progress output.
    pub fn name(&self) -> &'static str {
        match self {
            RequestStage::Received => "received",
            RequestStage::Extracted => "extracted",
            RequestStage::Translated => "translated",
            RequestStage::SynthesizedOriginal => "synthesized_original",
            RequestStage::SynthesizedTranslated => "synthesized_translated",
            RequestStage::Succeeded => "succeeded",
            RequestStage::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStage::Succeeded | RequestStage::Failed(_))
    }
}

/// Counters gathered while processing one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenditionStats {
    pub translate_attempts: u32,
    pub original_speech_attempts: u32,
    pub translated_speech_attempts: u32,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful request produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendition {
    pub request_id: String,
    /// Destination language code.
    pub language: String,
    pub original_text: String,
    pub translated_text: String,
    pub original_audio: OutputSlot,
    pub translated_audio: OutputSlot,
    pub stats: RenditionStats,
}

/// A request either succeeds or fails for a reason shown to the user.
/// Service-level errors travel separately as [`Pdf2VoiceError`].
pub type RequestOutcome = Result<Rendition, RequestFailure>;

/// Drives one request through extraction, translation and speech.
///
/// Cheap to share: the web server holds one behind an `Arc` and every
/// handler invocation calls [`Orchestrator::process`] on it.
pub struct Orchestrator {
    config: ServiceConfig,
    storage: Storage,
    extractor: Arc<dyn TextExtractor>,
    translator: Arc<dyn TranslationBackend>,
    speech: Arc<dyn SpeechBackend>,
    progress: ProgressCallback,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Production wiring: pdfium extraction plus the Google backends.
    pub fn from_config(config: ServiceConfig) -> Result<Self, Pdf2VoiceError> {
        let http = http_client(config.request_timeout_secs)?;
        let extractor = Arc::new(PdfiumExtractor::new(config.pdfium_lib_path.clone()));
        let translator = Arc::new(GoogleTranslator::new(
            http.clone(),
            config.translate_base_url.clone(),
        ));
        let speech = Arc::new(GoogleTts::new(
            http,
            config.tts_base_url.clone(),
            config.tts_chunk_chars,
        ));
        Self::with_backends(config, extractor, translator, speech)
    }

    /// Wire arbitrary backends. Creates the working directories.
    pub fn with_backends(
        config: ServiceConfig,
        extractor: Arc<dyn TextExtractor>,
        translator: Arc<dyn TranslationBackend>,
        speech: Arc<dyn SpeechBackend>,
    ) -> Result<Self, Pdf2VoiceError> {
        let storage = Storage::from_config(&config);
        storage.ensure_dirs()?;
        let progress: ProgressCallback = match config.progress_callback.clone() {
            Some(cb) => cb,
            None => Arc::new(NoopProgressCallback),
        };

        Ok(Self {
            config,
            storage,
            extractor,
            translator,
            speech,
            progress,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Destination languages offered to the user.
    pub fn supported_languages(&self) -> LanguageSet {
        self.speech.supported_languages()
    }

    /// Process one uploaded document into a [`Rendition`].
    ///
    /// # Returns
    /// `Ok(Ok(rendition))` on success, `Ok(Err(failure))` when the request
    /// failed for a reason the user should see.
    ///
    /// # Errors
    /// Returns `Err(Pdf2VoiceError)` only for fatal errors:
    /// - working directories or uploads cannot be written
    /// - pdfium cannot be loaded
    /// - an unreadable document under [`ExtractionFailurePolicy::Propagate`]
    pub async fn process(
        &self,
        filename: &str,
        bytes: &[u8],
        language: &str,
    ) -> Result<RequestOutcome, Pdf2VoiceError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("request", id = %request_id);
        self.process_request(&request_id, filename, bytes, language)
            .instrument(span)
            .await
    }

    async fn process_request(
        &self,
        request_id: &str,
        filename: &str,
        bytes: &[u8],
        language: &str,
    ) -> Result<RequestOutcome, Pdf2VoiceError> {
        info!(filename, language, bytes = bytes.len(), "request received");
        self.progress.on_request_start(request_id, filename);

        let result = self.run_pipeline(request_id, filename, bytes, language).await;

        match &result {
            Ok(Ok(rendition)) => {
                info!(
                    total_ms = rendition.stats.total_duration_ms,
                    translate_attempts = rendition.stats.translate_attempts,
                    "request succeeded"
                );
                self.advance(request_id, RequestStage::Succeeded);
                self.progress.on_request_complete(request_id, true);
            }
            Ok(Err(failure)) => {
                warn!(reason = %failure, "request failed");
                self.advance(request_id, RequestStage::Failed(failure.clone()));
                self.progress.on_request_complete(request_id, false);
            }
            Err(e) => {
                error!("request aborted: {e}");
                self.progress.on_request_complete(request_id, false);
            }
        }
        result
    }

    async fn run_pipeline(
        &self,
        request_id: &str,
        filename: &str,
        bytes: &[u8],
        language: &str,
    ) -> Result<RequestOutcome, Pdf2VoiceError> {
        let start = Instant::now();
        let mut stats = RenditionStats::default();
        self.advance(request_id, RequestStage::Received);

        if !self.supported_languages().contains_key(language) {
            return Ok(Err(RequestFailure::UnsupportedLanguage(language.to_string())));
        }
        if bytes.is_empty() {
            return Ok(Err(RequestFailure::InvalidUpload(
                "the uploaded file is empty".to_string(),
            )));
        }

        // ── Step 1: Extract ──────────────────────────────────────────────────
        let upload = self.storage.store_upload(request_id, filename, bytes).await?;
        let extract_start = Instant::now();
        let extracted = self.extractor.extract(upload.path()).await;
        drop(upload);
        stats.extract_duration_ms = extract_start.elapsed().as_millis() as u64;

        let original_text = match extracted {
            Ok(text) => text,
            Err(e)
                if e.is_document_error()
                    && self.config.extraction_failure == ExtractionFailurePolicy::ErrorPage =>
            {
                return Ok(Err(RequestFailure::DocumentUnreadable(e.to_string())));
            }
            Err(e) => return Err(e),
        };
        info!(
            chars = original_text.chars().count(),
            duration_ms = stats.extract_duration_ms,
            "text extracted"
        );
        self.advance(request_id, RequestStage::Extracted);

        // ── Step 2: Translate ────────────────────────────────────────────────
        let translated_text = match translate_with_retry(
            self.translator.as_ref(),
            &original_text,
            language,
            &self.config.translate_retry,
            self.progress.as_ref(),
        )
        .await
        {
            RetryOutcome::Success { value, attempts } => {
                stats.translate_attempts = attempts;
                value
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                return Ok(Err(RequestFailure::TranslationTimeout {
                    attempts,
                    last_error,
                }));
            }
            RetryOutcome::Fatal { error, .. } => {
                return Ok(Err(RequestFailure::TranslationBackend(error)));
            }
        };
        self.advance(request_id, RequestStage::Translated);

        // ── Step 3: Synthesize both renditions ───────────────────────────────
        let slots = self.storage.allocate_slots(request_id).await?;

        let original = synthesize_with_retry(
            self.speech.as_ref(),
            &original_text,
            &self.config.source_language,
            &slots.original,
            &self.config.speech_retry,
            self.progress.as_ref(),
        )
        .await;
        if original.is_success() {
            self.advance(request_id, RequestStage::SynthesizedOriginal);
        }

        let translated = synthesize_with_retry(
            self.speech.as_ref(),
            &translated_text,
            language,
            &slots.translated,
            &self.config.speech_retry,
            self.progress.as_ref(),
        )
        .await;
        if translated.is_success() {
            self.advance(request_id, RequestStage::SynthesizedTranslated);
        }

        stats.original_speech_attempts = original.attempts();
        stats.translated_speech_attempts = translated.attempts();
        let (original_audio, translated_audio) = match (original, translated) {
            (RetryOutcome::Success { value: o, .. }, RetryOutcome::Success { value: t, .. }) => {
                (o, t)
            }
            (original, translated) => {
                return Ok(Err(RequestFailure::SpeechSynthesis {
                    detail: format!(
                        "original: {}; translated: {}",
                        describe(&original),
                        describe(&translated)
                    ),
                }));
            }
        };

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        Ok(Ok(Rendition {
            request_id: request_id.to_string(),
            language: language.to_string(),
            original_text,
            translated_text,
            original_audio,
            translated_audio,
            stats,
        }))
    }

    /// Report a stage. Terminal stages are already logged with their outcome.
    fn advance(&self, request_id: &str, stage: RequestStage) {
        if stage.is_terminal() {
            debug!(stage = stage.name(), "stage");
        } else {
            info!(stage = stage.name(), "stage");
        }
        self.progress.on_stage(request_id, &stage);
    }
}

fn describe<T>(outcome: &RetryOutcome<T>) -> String {
    match outcome {
        RetryOutcome::Success { .. } => "ok".to_string(),
        RetryOutcome::Exhausted {
            attempts,
            last_error,
        } => format!("exhausted after {attempts} attempts ({last_error})"),
        RetryOutcome::Fatal { attempt, error } => {
            format!("failed on attempt {attempt} ({error})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(RequestStage::Received.name(), "received");
        assert_eq!(RequestStage::SynthesizedOriginal.name(), "synthesized_original");
        let failed = RequestStage::Failed(RequestFailure::InvalidUpload("x".into()));
        assert_eq!(failed.name(), "failed");
        assert!(failed.is_terminal());
        assert!(RequestStage::Succeeded.is_terminal());
        assert!(!RequestStage::Translated.is_terminal());
    }

    #[test]
    fn describe_names_the_failure_mode() {
        let ok: RetryOutcome<()> = RetryOutcome::Success {
            value: (),
            attempts: 1,
        };
        assert_eq!(describe(&ok), "ok");

        let exhausted: RetryOutcome<()> = RetryOutcome::Exhausted {
            attempts: 3,
            last_error: BackendError::Timeout {
                backend: "synthesize",
            },
        };
        assert!(describe(&exhausted).starts_with("exhausted after 3 attempts"));
    }

    #[test]
    fn from_config_creates_working_directories() {
        let root = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .upload_dir(root.path().join("u"))
            .static_dir(root.path().join("s"))
            .build()
            .unwrap();
        let orch = Orchestrator::from_config(config).unwrap();
        assert!(root.path().join("u").is_dir());
        assert!(root.path().join("s").is_dir());
        assert!(orch.supported_languages().contains_key("en"));
        assert_eq!(orch.config().request_timeout_secs, 10);
    }
}
