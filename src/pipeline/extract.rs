//! Text extraction: pull the plain text out of every page of a PDF.
//!
//! Pages are read in document order and their text is concatenated with no
//! separator and no whitespace normalisation. Whatever pdfium reports for a
//! page (including its trailing newlines) ends up in the output verbatim.
//!
//! pdfium wraps a C++ library with thread-local state, so the work runs in
//! `spawn_blocking` and a fresh `Pdfium` binding is created per call.

use crate::error::Pdf2VoiceError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns a stored document into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, Pdf2VoiceError>;
}

/// Concatenate page texts in order, with nothing inserted between them.
pub fn concat_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages.into_iter().fold(String::new(), |mut acc, page| {
        acc.push_str(page.as_ref());
        acc
    })
}

/// [`TextExtractor`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    lib_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    /// `lib_path` overrides library discovery when set.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    /// Bind the library once so a missing pdfium fails at startup rather
    /// than on the first upload.
    pub fn check(&self) -> Result<(), Pdf2VoiceError> {
        bind_pdfium(self.lib_path.as_deref()).map(|_| ())
    }
}

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract(&self, path: &Path) -> Result<String, Pdf2VoiceError> {
        let path = path.to_path_buf();
        let lib_path = self.lib_path.clone();

        tokio::task::spawn_blocking(move || extract_blocking(&path, lib_path.as_deref()))
            .await
            .map_err(|e| Pdf2VoiceError::Internal(format!("Extraction task panicked: {}", e)))?
    }
}

/// Blocking implementation of text extraction.
fn extract_blocking(pdf_path: &Path, lib_path: Option<&Path>) -> Result<String, Pdf2VoiceError> {
    check_magic(pdf_path)?;

    let pdfium = bind_pdfium(lib_path)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| map_load_error(pdf_path, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut texts = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| Pdf2VoiceError::PageText {
            page: idx + 1,
            detail: format!("{:?}", e),
        })?;
        let content = text.all();
        debug!(page = idx + 1, chars = content.chars().count(), "extracted page text");
        texts.push(content);
    }

    Ok(concat_pages(texts))
}

/// How far into the file the `%PDF-` header may appear.
const HEADER_SEARCH_BYTES: u64 = 1024;

/// Reject files with no `%PDF-` header in their first kilobyte before
/// pdfium sees them. Leading bytes ahead of the header are allowed.
fn check_magic(path: &Path) -> Result<(), Pdf2VoiceError> {
    let f = std::fs::File::open(path).map_err(|e| Pdf2VoiceError::DocumentOpen {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut head = Vec::with_capacity(HEADER_SEARCH_BYTES as usize);
    f.take(HEADER_SEARCH_BYTES)
        .read_to_end(&mut head)
        .map_err(|e| Pdf2VoiceError::DocumentOpen {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    if !head.windows(5).any(|w| w == b"%PDF-") {
        let shown = &head[..head.len().min(8)];
        return Err(Pdf2VoiceError::DocumentOpen {
            path: path.to_path_buf(),
            detail: format!("not a PDF (first bytes: {:?})", shown),
        });
    }
    Ok(())
}

fn map_load_error(path: &Path, e: PdfiumError) -> Pdf2VoiceError {
    let detail = format!("{:?}", e);
    let lower = detail.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        Pdf2VoiceError::DocumentEncrypted {
            path: path.to_path_buf(),
        }
    } else {
        Pdf2VoiceError::DocumentOpen {
            path: path.to_path_buf(),
            detail,
        }
    }
}

/// Load the pdfium dynamic library.
///
/// Discovery order:
/// 1. `lib_path` from configuration
/// 2. `PDFIUM_LIB_PATH` env var
/// 3. Alongside the running executable
/// 4. System library search paths
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, Pdf2VoiceError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    if let Some(path) = explicit {
        debug!(path = %path.display(), "Loading pdfium from explicit path");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            Pdf2VoiceError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = exe_dir.join(Pdfium::pdfium_platform_library_name());
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            debug!(dir = %exe_dir.display(), "Loaded pdfium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| Pdf2VoiceError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}
