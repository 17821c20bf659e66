//! Configuration types for the translate-and-speak service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The web server, the one-shot `convert`
//! command and the tests all share the same struct.

use crate::error::Pdf2VoiceError;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Public endpoint used by the Google translation backend.
pub const DEFAULT_TRANSLATE_BASE_URL: &str = "https://translate.googleapis.com";

/// Public endpoint used by the Google speech backend.
pub const DEFAULT_TTS_BASE_URL: &str = "https://translate.google.com";

/// Configuration for the service.
///
/// Built via [`ServiceConfig::builder()`] or using [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2voice::{OutputLayout, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .upload_dir("/tmp/pdf2voice/uploads")
///     .static_dir("/tmp/pdf2voice/static")
///     .output_layout(OutputLayout::PerRequest)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Where uploaded documents are written. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Where audio artifacts are written and served from. Default: `static`.
    pub static_dir: PathBuf,

    /// URL prefix `static_dir` is served under. Default: `/static`.
    pub static_url_prefix: String,

    /// Language code used to speak the original text. Default: `en`.
    pub source_language: String,

    /// Retry policy for the translation backend. Default: 3 attempts, flat 1 s.
    pub translate_retry: RetryPolicy,

    /// Retry policy for the speech backend. Default: 3 attempts, flat 1 s.
    pub speech_retry: RetryPolicy,

    /// Base URL of the translation endpoint.
    pub translate_base_url: String,

    /// Base URL of the speech endpoint.
    pub tts_base_url: String,

    /// Per-HTTP-call timeout in seconds. Default: 10.
    ///
    /// A call exceeding this surfaces as a timeout, the one error class the
    /// default retry policy retries.
    pub request_timeout_secs: u64,

    /// Maximum characters per speech request. Default: 100.
    ///
    /// The speech endpoint rejects longer inputs, so text is split into
    /// chunks and the MP3 responses are concatenated.
    pub tts_chunk_chars: usize,

    /// Where each request's two audio artifacts live. Default: per request.
    pub output_layout: OutputLayout,

    /// Keep uploaded documents after the request finishes. Default: false.
    pub retain_uploads: bool,

    /// Age after which per-request audio directories are swept, in seconds.
    /// `0` disables the sweep. Default: 3600.
    ///
    /// Only applies to [`OutputLayout::PerRequest`]; shared slots are
    /// overwritten in place and never accumulate.
    pub output_ttl_secs: u64,

    /// How an unreadable document is reported. Default: error page.
    pub extraction_failure: ExtractionFailurePolicy,

    /// Upper bound on a multipart request body in bytes. Default: 32 MiB.
    pub max_upload_bytes: usize,

    /// Explicit path to the pdfium shared library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional progress callback invoked as requests advance.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            static_url_prefix: "/static".to_string(),
            source_language: "en".to_string(),
            translate_retry: RetryPolicy::default(),
            speech_retry: RetryPolicy::default(),
            translate_base_url: DEFAULT_TRANSLATE_BASE_URL.to_string(),
            tts_base_url: DEFAULT_TTS_BASE_URL.to_string(),
            request_timeout_secs: 10,
            tts_chunk_chars: 100,
            output_layout: OutputLayout::default(),
            retain_uploads: false,
            output_ttl_secs: 3600,
            extraction_failure: ExtractionFailurePolicy::default(),
            max_upload_bytes: 32 * 1024 * 1024,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("upload_dir", &self.upload_dir)
            .field("static_dir", &self.static_dir)
            .field("static_url_prefix", &self.static_url_prefix)
            .field("source_language", &self.source_language)
            .field("translate_retry", &self.translate_retry)
            .field("speech_retry", &self.speech_retry)
            .field("translate_base_url", &self.translate_base_url)
            .field("tts_base_url", &self.tts_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("tts_chunk_chars", &self.tts_chunk_chars)
            .field("output_layout", &self.output_layout)
            .field("retain_uploads", &self.retain_uploads)
            .field("output_ttl_secs", &self.output_ttl_secs)
            .field("extraction_failure", &self.extraction_failure)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.static_dir = dir.into();
        self
    }

    pub fn static_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.static_url_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn source_language(mut self, code: impl Into<String>) -> Self {
        self.config.source_language = code.into();
        self
    }

    /// Apply the same policy to both backends.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.translate_retry = policy.clone();
        self.config.speech_retry = policy;
        self
    }

    pub fn translate_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.translate_retry = policy;
        self
    }

    pub fn speech_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.speech_retry = policy;
        self
    }

    pub fn translate_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.translate_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn tts_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.tts_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn tts_chunk_chars(mut self, n: usize) -> Self {
        self.config.tts_chunk_chars = n;
        self
    }

    pub fn output_layout(mut self, layout: OutputLayout) -> Self {
        self.config.output_layout = layout;
        self
    }

    pub fn retain_uploads(mut self, v: bool) -> Self {
        self.config.retain_uploads = v;
        self
    }

    pub fn output_ttl_secs(mut self, secs: u64) -> Self {
        self.config.output_ttl_secs = secs;
        self
    }

    pub fn extraction_failure(mut self, policy: ExtractionFailurePolicy) -> Self {
        self.config.extraction_failure = policy;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Pdf2VoiceError> {
        let c = &self.config;
        if c.translate_retry.max_attempts == 0 || c.speech_retry.max_attempts == 0 {
            return Err(Pdf2VoiceError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.source_language.trim().is_empty() {
            return Err(Pdf2VoiceError::InvalidConfig(
                "source_language must not be empty".into(),
            ));
        }
        if !c.static_url_prefix.starts_with('/') {
            return Err(Pdf2VoiceError::InvalidConfig(format!(
                "static_url_prefix must start with '/', got '{}'",
                c.static_url_prefix
            )));
        }
        if c.tts_chunk_chars == 0 {
            return Err(Pdf2VoiceError::InvalidConfig(
                "tts_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(Pdf2VoiceError::InvalidConfig(
                "request_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(Pdf2VoiceError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Where the two audio artifacts of a request are written.
///
/// | Layout | Paths | Concurrent requests |
/// |--------|-------|---------------------|
/// | `PerRequest` | `static/<request-id>/original_output.mp3` | isolated |
/// | `Shared` | `static/original_output.mp3` | last writer wins |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLayout {
    /// One sub-directory per request. (default)
    #[default]
    PerRequest,
    /// Two fixed, process-wide slots overwritten by every request.
    Shared,
}

/// How a document that cannot be opened is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionFailurePolicy {
    /// Render the error page with a dedicated message. (default)
    #[default]
    ErrorPage,
    /// Treat it like any other fatal error: generic server error.
    Propagate,
}
