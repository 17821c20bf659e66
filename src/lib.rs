//! # pdf2voice
//!
//! Upload a PDF, translate its text, and listen to both the original and the
//! translation as MP3.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF upload
//!  │
//!  ├─ 1. Store      upload written to a scoped temp dir
//!  ├─ 2. Extract    per-page text via pdfium (spawn_blocking), concatenated
//!  ├─ 3. Translate  one backend call under the retry policy
//!  ├─ 4. Speak      original text in the source language   ┐ both always run,
//!  ├─ 5. Speak      translated text in the chosen language ┘ checked together
//!  └─ 6. Render     result page with both texts and both audio URLs
//! ```
//!
//! The two network-bound steps run under a [`RetryPolicy`]: by default three
//! attempts, one second apart, retrying timeouts only. A translation that
//! never succeeds ends the request before any audio is produced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2voice::{Orchestrator, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::from_config(ServiceConfig::default())?;
//!     let bytes = std::fs::read("document.pdf")?;
//!     match orchestrator.process("document.pdf", &bytes, "fr").await? {
//!         Ok(rendition) => {
//!             println!("{}", rendition.translated_text);
//!             println!("audio: {}", rendition.translated_audio.path.display());
//!         }
//!         Err(failure) => eprintln!("{}", failure.message()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Serving the web form
//!
//! ```rust,no_run
//! use pdf2voice::{serve, Orchestrator, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Arc::new(Orchestrator::from_config(ServiceConfig::default())?);
//!     serve(orchestrator, "127.0.0.1:5000".parse()?).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2voice` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2voice = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod storage;
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionFailurePolicy, OutputLayout, ServiceConfig, ServiceConfigBuilder};
pub use error::{
    BackendError, Pdf2VoiceError, RequestFailure, SPEECH_FAILED_MESSAGE,
    TRANSLATION_TIMEOUT_MESSAGE,
};
pub use orchestrator::{Orchestrator, Rendition, RenditionStats, RequestOutcome, RequestStage};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::languages::LanguageSet;
pub use pipeline::speech::{GoogleTts, SpeechBackend};
pub use pipeline::translate::{GoogleTranslator, TranslationBackend};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use retry::{Backoff, RetryOn, RetryOutcome, RetryPolicy};
pub use storage::{OutputSlot, SlotKind};
pub use web::{router, serve, serve_listener};
