//! Progress-callback trait for per-request pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ServiceConfigBuilder::progress_callback`] to receive
//! events as a request moves through extraction, translation and speech
//! synthesis.
//!
//! # Example
//!
//! ```rust
//! use pdf2voice::{PipelineProgressCallback, RequestStage, ServiceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RetryCounter {
//!     retries: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for RetryCounter {
//!     fn on_retry(&self, operation: &str, attempt: u32, max_attempts: u32, error: &str) {
//!         self.retries.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{operation}: attempt {attempt}/{max_attempts} failed: {error}");
//!     }
//! }
//!
//! let config = ServiceConfig::builder()
//!     .progress_callback(Arc::new(RetryCounter { retries: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::orchestrator::RequestStage;
use std::sync::Arc;

/// Called by the orchestrator as a request advances.
///
/// Implementations must be `Send + Sync`: the web server drives many
/// requests at once through the same callback. Every method has a no-op
/// default.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when a request is accepted.
    fn on_request_start(&self, request_id: &str, filename: &str) {
        let _ = (request_id, filename);
    }

    /// Called on every state transition, including `Failed`.
    fn on_stage(&self, request_id: &str, stage: &RequestStage) {
        let _ = (request_id, stage);
    }

    /// Called before sleeping ahead of another attempt.
    ///
    /// # Arguments
    /// * `operation`: `"translate"` or `"synthesize"`
    /// * `attempt`: the attempt that just failed (1-based)
    /// * `max_attempts`: the policy's bound
    /// * `error`: human-readable error description
    fn on_retry(&self, operation: &str, attempt: u32, max_attempts: u32, error: &str) {
        let _ = (operation, attempt, max_attempts, error);
    }

    /// Called once when the request reaches a terminal state.
    fn on_request_complete(&self, request_id: &str, succeeded: bool) {
        let _ = (request_id, succeeded);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ServiceConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
