//! HTTP surface: the upload form, the upload handler and the audio files.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /` | form listing the supported languages |
//! | `POST /` | multipart `pdf` + `language` → result or error page |
//! | `GET {static_url_prefix}/*` | files under the static directory |
//!
//! Failure pages carry [`RequestFailure::status`]; anything fatal becomes a
//! generic 500 page and the detail only goes to the log.

pub mod templates;

use crate::config::OutputLayout;
use crate::error::{Pdf2VoiceError, RequestFailure};
use crate::orchestrator::Orchestrator;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

/// Shown for every fatal error; details stay in the log.
pub const GENERIC_ERROR_MESSAGE: &str =
    "An unexpected error occurred while processing your document. Please try again later.";

type AppState = Arc<Orchestrator>;

/// Build the application router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    let config = orchestrator.config();
    let static_prefix = config.static_url_prefix.clone();
    let body_limit = config.max_upload_bytes;
    let static_files = ServeDir::new(orchestrator.storage().static_dir());

    Router::new()
        .route("/", get(index).post(upload))
        .nest_service(&static_prefix, static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(orchestrator)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(orchestrator: Arc<Orchestrator>, addr: SocketAddr) -> Result<(), Pdf2VoiceError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Pdf2VoiceError::BindFailed { addr, source })?;
    let local = listener.local_addr().unwrap_or(addr);
    info!(addr = %local, "listening");
    serve_listener(orchestrator, listener, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// Also runs the output sweeper for the lifetime of the server.
pub async fn serve_listener<F>(
    orchestrator: Arc<Orchestrator>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), Pdf2VoiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper = spawn_output_sweeper(orchestrator.clone());
    let app = router(orchestrator);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Pdf2VoiceError::ServerFailed(e.to_string()));

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("server stopped");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Periodically remove expired per-request output directories.
///
/// Returns `None` when there is nothing to sweep: shared layout, or a TTL
/// of zero.
pub fn spawn_output_sweeper(orchestrator: Arc<Orchestrator>) -> Option<JoinHandle<()>> {
    let ttl_secs = orchestrator.config().output_ttl_secs;
    if ttl_secs == 0 || orchestrator.storage().layout() == OutputLayout::Shared {
        return None;
    }
    let ttl = Duration::from_secs(ttl_secs);
    let period = Duration::from_secs((ttl_secs / 4).clamp(1, 300));

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = orchestrator.storage().sweep_outputs(ttl).await {
                warn!("output sweep failed: {e}");
            }
        }
    }))
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// `GET /?language=fr` preselects that language in the form.
#[derive(Debug, Default, Deserialize)]
struct IndexQuery {
    language: Option<String>,
}

async fn index(
    State(orchestrator): State<AppState>,
    Query(query): Query<IndexQuery>,
) -> Html<String> {
    Html(templates::index_page(
        &orchestrator.supported_languages(),
        query.language.as_deref(),
    ))
}

/// Fields read from the upload form.
#[derive(Debug)]
struct UploadForm {
    filename: String,
    bytes: Vec<u8>,
    language: String,
}

async fn upload(State(orchestrator): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    debug!(
        filename = %form.filename,
        language = %form.language,
        bytes = form.bytes.len(),
        "upload parsed"
    );

    match orchestrator
        .process(&form.filename, &form.bytes, &form.language)
        .await
    {
        Ok(Ok(rendition)) => Html(templates::result_page(&rendition)).into_response(),
        Ok(Err(failure)) => failure_response(&failure),
        Err(e) => {
            error!("request failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(templates::error_page(GENERIC_ERROR_MESSAGE)),
            )
                .into_response()
        }
    }
}

fn failure_response(failure: &RequestFailure) -> Response {
    (failure.status(), Html(templates::error_page(&failure.message()))).into_response()
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, Response> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut language: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("malformed multipart body: {e}");
                return Err((e.status(), Html(templates::error_page(&e.body_text()))).into_response());
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "pdf" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    warn!("failed to read upload bytes: {e}");
                    (e.status(), Html(templates::error_page(&e.body_text()))).into_response()
                })?;
                file = Some((filename, bytes.to_vec()));
            }
            "language" => {
                let value = field.text().await.map_err(|e| {
                    (e.status(), Html(templates::error_page(&e.body_text()))).into_response()
                })?;
                language = Some(value.trim().to_string());
            }
            _ => {}
        }
    }

    let invalid = |detail: &str| failure_response(&RequestFailure::InvalidUpload(detail.to_string()));

    let (filename, bytes) = match file {
        Some((name, _)) if name.is_empty() => return Err(invalid("no file was selected")),
        Some(file) => file,
        None => return Err(invalid("the form has no 'pdf' file field")),
    };
    let language = match language {
        Some(code) if !code.is_empty() => code,
        _ => return Err(invalid("no destination language was selected")),
    };

    Ok(UploadForm {
        filename,
        bytes,
        language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_orchestrator(root: &std::path::Path) -> Arc<Orchestrator> {
        let config = ServiceConfig::builder()
            .upload_dir(root.join("uploads"))
            .static_dir(root.join("static"))
            .build()
            .unwrap();
        Arc::new(Orchestrator::from_config(config).unwrap())
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
Content-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn index_lists_supported_languages() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("value=\"fr\""));
        assert!(html.contains("French"));
    }

    #[tokio::test]
    async fn index_preselects_language_from_query() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(Request::get("/?language=de").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("value=\"de\" selected"));
        assert!(!html.contains("value=\"fr\" selected"));
    }

    #[tokio::test]
    async fn index_ignores_unknown_query_language() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(Request::get("/?language=zz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!body_string(response).await.contains(" selected"));
    }

    #[tokio::test]
    async fn missing_file_is_bad_request() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(multipart_request(&[("language", None, b"fr")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("pdf"));
    }

    #[tokio::test]
    async fn empty_filename_is_bad_request() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(multipart_request(&[
                ("pdf", Some(""), b"%PDF-1.4"),
                ("language", None, b"fr"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_language_is_bad_request() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(multipart_request(&[("pdf", Some("a.pdf"), b"%PDF-1.4")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("language"));
    }

    #[tokio::test]
    async fn unknown_language_is_rejected_before_any_work() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(multipart_request(&[
                ("pdf", Some("a.pdf"), b"%PDF-1.4"),
                ("language", None, b"<xx>"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_string(response).await;
        assert!(html.contains("&lt;xx&gt;"));
        assert!(!html.contains("<xx>"));
    }

    #[tokio::test]
    async fn non_pdf_upload_renders_error_page() {
        let root = tempfile::tempdir().unwrap();
        let app = router(test_orchestrator(root.path()));

        let response = app
            .oneshot(multipart_request(&[
                ("pdf", Some("notes.pdf"), b"just some text"),
                ("language", None, b"fr"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_string(response).await.contains("could not be read"));
    }

    #[tokio::test]
    async fn static_files_are_served() {
        let root = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(root.path());
        std::fs::write(root.path().join("static/hello.mp3"), b"ID3").unwrap();
        let app = router(orch);

        let response = app
            .oneshot(Request::get("/static/hello.mp3").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ID3");
    }

    #[tokio::test]
    async fn sweeper_disabled_for_shared_layout() {
        let root = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .upload_dir(root.path().join("uploads"))
            .static_dir(root.path().join("static"))
            .output_layout(OutputLayout::Shared)
            .build()
            .unwrap();
        let orch = Arc::new(Orchestrator::from_config(config).unwrap());
        assert!(spawn_output_sweeper(orch).is_none());
    }
}
