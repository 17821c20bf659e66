//! Error types for the pdf2voice library.
//!
//! Three layers of failure, each with its own type:
//!
//! * [`BackendError`]: a single call to the translation or speech backend
//!   failed. The retry layer classifies it as retryable or not.
//!
//! * [`RequestFailure`]: a request could not produce a rendition, for a
//!   reason the user should see (translation timed out, speech synthesis
//!   failed, the upload was not a readable PDF). Rendered as an error page.
//!
//! * [`Pdf2VoiceError`]: **fatal**, the service itself is misconfigured or
//!   hit an I/O problem. Surfaces as a generic server error.

use axum::http::StatusCode;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Shown when translation exhausts every attempt.
pub const TRANSLATION_TIMEOUT_MESSAGE: &str =
    "Translation failed due to timeout. Please try again later.";

/// Shown when either speech synthesis call does not succeed.
pub const SPEECH_FAILED_MESSAGE: &str = "Text-to-Speech conversion failed. Please try again later.";

/// All fatal errors returned by the pdf2voice library.
#[derive(Debug, Error)]
pub enum Pdf2VoiceError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The uploaded file could not be opened as a PDF.
    #[error("Cannot open document '{path}': {detail}")]
    DocumentOpen { path: PathBuf, detail: String },

    /// The document requires a password.
    #[error("Document '{path}' is encrypted and requires a password")]
    DocumentEncrypted { path: PathBuf },

    /// pdfium could not extract text from a page.
    #[error("Text extraction failed on page {page}: {detail}")]
    PageText { page: usize, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create a working directory.
    #[error("Failed to prepare directory '{path}': {source}")]
    DirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not store an uploaded document.
    #[error("Failed to store upload '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server error: {0}")]
    ServerFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2VoiceError {
    /// True for failures caused by the uploaded document rather than the service.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            Pdf2VoiceError::DocumentOpen { .. }
                | Pdf2VoiceError::DocumentEncrypted { .. }
                | Pdf2VoiceError::PageText { .. }
        )
    }
}

/// A failed call to an external backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The call did not complete within the request timeout.
    #[error("{backend} request timed out")]
    Timeout { backend: &'static str },

    /// HTTP 429.
    #[error("{backend} rate limit exceeded")]
    RateLimited { backend: &'static str },

    /// Any other non-success HTTP status.
    #[error("{backend} returned HTTP {status}: {body}")]
    Http {
        backend: &'static str,
        status: u16,
        body: String,
    },

    /// Connection-level failure (DNS, refused, reset).
    #[error("{backend} network error: {detail}")]
    Network {
        backend: &'static str,
        detail: String,
    },

    /// The response arrived but could not be understood.
    #[error("{backend} returned an unexpected payload: {detail}")]
    Protocol {
        backend: &'static str,
        detail: String,
    },

    /// The backend refused the input before any network call.
    #[error("{backend} rejected the request: {reason}")]
    Rejected {
        backend: &'static str,
        reason: String,
    },

    /// Writing the backend's result to disk failed.
    #[error("{backend} could not write '{path}': {detail}")]
    Io {
        backend: &'static str,
        path: PathBuf,
        detail: String,
    },
}

impl BackendError {
    /// Map a reqwest transport error, separating timeouts from everything else.
    pub fn from_reqwest(backend: &'static str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout { backend }
        } else {
            BackendError::Network {
                backend,
                detail: err.to_string(),
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }

    /// Timeouts, rate limits, 5xx responses and connection failures.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Timeout { .. }
            | BackendError::RateLimited { .. }
            | BackendError::Network { .. } => true,
            BackendError::Http { status, .. } => *status >= 500,
            BackendError::Protocol { .. } | BackendError::Rejected { .. } | BackendError::Io { .. } => {
                false
            }
        }
    }
}

/// Why a request ended in the `Failed` state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestFailure {
    /// The multipart form was missing a field or carried an unusable value.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// The destination language is not in the supported set.
    #[error("Unsupported language '{0}'")]
    UnsupportedLanguage(String),

    /// The uploaded file could not be read as a PDF.
    #[error("Could not read the uploaded document: {0}")]
    DocumentUnreadable(String),

    /// Translation exhausted every attempt.
    #[error("Translation exhausted {attempts} attempts: {last_error}")]
    TranslationTimeout {
        attempts: u32,
        last_error: BackendError,
    },

    /// Translation failed with a non-retryable backend error.
    #[error("Translation backend failed: {0}")]
    TranslationBackend(BackendError),

    /// At least one of the two synthesis calls did not succeed.
    #[error("Speech synthesis failed: {detail}")]
    SpeechSynthesis { detail: String },
}

impl RequestFailure {
    /// The human-readable message rendered on the error page.
    pub fn message(&self) -> String {
        match self {
            RequestFailure::InvalidUpload(detail) => {
                format!("The upload could not be processed: {detail}")
            }
            RequestFailure::UnsupportedLanguage(code) => {
                format!("The language '{code}' is not supported.")
            }
            RequestFailure::DocumentUnreadable(_) => {
                "The uploaded file could not be read as a PDF document.".to_string()
            }
            RequestFailure::TranslationTimeout { .. } => TRANSLATION_TIMEOUT_MESSAGE.to_string(),
            RequestFailure::TranslationBackend(_) => {
                "The translation service returned an unexpected error. Please try again later."
                    .to_string()
            }
            RequestFailure::SpeechSynthesis { .. } => SPEECH_FAILED_MESSAGE.to_string(),
        }
    }

    /// HTTP status used when rendering the error page.
    ///
    /// Exhaustion failures keep `200 OK`.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestFailure::InvalidUpload(_) | RequestFailure::UnsupportedLanguage(_) => {
                StatusCode::BAD_REQUEST
            }
            RequestFailure::DocumentUnreadable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RequestFailure::TranslationTimeout { .. } | RequestFailure::SpeechSynthesis { .. } => {
                StatusCode::OK
            }
            RequestFailure::TranslationBackend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Convert a [`Duration`] into whole milliseconds for log fields.
pub(crate) fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_both_timeout_and_transient() {
        let e = BackendError::Timeout { backend: "translate" };
        assert!(e.is_timeout());
        assert!(e.is_transient());
        assert_eq!(e.to_string(), "translate request timed out");
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let e503 = BackendError::Http {
            backend: "tts",
            status: 503,
            body: String::new(),
        };
        let e400 = BackendError::Http {
            backend: "tts",
            status: 400,
            body: "bad lang".into(),
        };
        assert!(e503.is_transient());
        assert!(!e503.is_timeout());
        assert!(!e400.is_transient());
        assert!(e400.to_string().contains("bad lang"));
    }

    #[test]
    fn exhaustion_messages_match_the_error_page_text() {
        let t = RequestFailure::TranslationTimeout {
            attempts: 3,
            last_error: BackendError::Timeout { backend: "translate" },
        };
        assert_eq!(
            t.message(),
            "Translation failed due to timeout. Please try again later."
        );
        assert_eq!(t.status(), StatusCode::OK);

        let s = RequestFailure::SpeechSynthesis {
            detail: "translated slot exhausted".into(),
        };
        assert_eq!(
            s.message(),
            "Text-to-Speech conversion failed. Please try again later."
        );
    }

    #[test]
    fn unreadable_document_is_unprocessable() {
        let f = RequestFailure::DocumentUnreadable("bad magic".into());
        assert_eq!(f.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!f.message().contains("bad magic"));
    }

    #[test]
    fn document_errors_are_classified() {
        let e = Pdf2VoiceError::DocumentOpen {
            path: PathBuf::from("x.pdf"),
            detail: "not a pdf".into(),
        };
        assert!(e.is_document_error());
        assert!(!Pdf2VoiceError::Internal("boom".into()).is_document_error());
    }
}
