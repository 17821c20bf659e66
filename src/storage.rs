//! On-disk storage: working directories, uploads and audio output slots.
//!
//! ## Uploads
//!
//! By default each upload lands in its own `TempDir` under the upload
//! directory. The directory is removed when the [`StoredUpload`] drops, on
//! success, on failure, and on panic alike. With `retain_uploads` the file
//! is written to `uploads/<filename>` and kept.
//!
//! ## Output slots
//!
//! Every request produces two MP3 artifacts, "original" and "translated".
//! Under [`OutputLayout::PerRequest`] they live in `static/<request-id>/`;
//! under [`OutputLayout::Shared`] they are the two fixed files
//! `static/original_output.mp3` and `static/translated_output.mp3`, and
//! concurrent requests overwrite each other.

use crate::config::{OutputLayout, ServiceConfig};
use crate::error::Pdf2VoiceError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Which of the two per-request artifacts a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Original,
    Translated,
}

impl SlotKind {
    pub fn file_name(self) -> &'static str {
        match self {
            SlotKind::Original => "original_output.mp3",
            SlotKind::Translated => "translated_output.mp3",
        }
    }
}

/// A location an audio artifact is written to, and the URL it is served at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSlot {
    pub kind: SlotKind,
    pub path: PathBuf,
    pub url: String,
}

/// The two slots of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSlots {
    pub original: OutputSlot,
    pub translated: OutputSlot,
}

/// An uploaded document on disk.
pub enum StoredUpload {
    /// Removed together with its `TempDir` when dropped.
    Scoped { path: PathBuf, _dir: TempDir },
    /// Kept after the request.
    Retained(PathBuf),
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        match self {
            StoredUpload::Scoped { path, .. } => path,
            StoredUpload::Retained(path) => path,
        }
    }
}

/// Filesystem layout shared by every request.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    static_dir: PathBuf,
    static_url_prefix: String,
    layout: OutputLayout,
    retain_uploads: bool,
}

impl Storage {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            static_dir: config.static_dir.clone(),
            static_url_prefix: config.static_url_prefix.clone(),
            layout: config.output_layout,
            retain_uploads: config.retain_uploads,
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    /// Create the upload and static directories. Called once at startup.
    pub fn ensure_dirs(&self) -> Result<(), Pdf2VoiceError> {
        for dir in [&self.upload_dir, &self.static_dir] {
            std::fs::create_dir_all(dir).map_err(|e| Pdf2VoiceError::DirectoryFailed {
                path: dir.clone(),
                source: e,
            })?;
        }
        debug!(
            uploads = %self.upload_dir.display(),
            static_dir = %self.static_dir.display(),
            "working directories ready"
        );
        Ok(())
    }

    /// Write an uploaded document under a sanitised version of `filename`.
    pub async fn store_upload(
        &self,
        request_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload, Pdf2VoiceError> {
        let name = sanitize_filename(filename);

        let stored = if self.retain_uploads {
            StoredUpload::Retained(self.upload_dir.join(&name))
        } else {
            let dir = tempfile::Builder::new()
                .prefix(&format!("{request_id}-"))
                .tempdir_in(&self.upload_dir)
                .map_err(|e| Pdf2VoiceError::DirectoryFailed {
                    path: self.upload_dir.clone(),
                    source: e,
                })?;
            StoredUpload::Scoped {
                path: dir.path().join(&name),
                _dir: dir,
            }
        };

        tokio::fs::write(stored.path(), bytes)
            .await
            .map_err(|e| Pdf2VoiceError::UploadWriteFailed {
                path: stored.path().to_path_buf(),
                source: e,
            })?;

        debug!(path = %stored.path().display(), bytes = bytes.len(), "stored upload");
        Ok(stored)
    }

    /// Resolve the two output slots for `request_id`, creating the
    /// per-request directory when needed.
    pub async fn allocate_slots(&self, request_id: &str) -> Result<OutputSlots, Pdf2VoiceError> {
        let (dir, url_base) = match self.layout {
            OutputLayout::Shared => (self.static_dir.clone(), self.static_url_prefix.clone()),
            OutputLayout::PerRequest => (
                self.static_dir.join(request_id),
                format!("{}/{}", self.static_url_prefix, request_id),
            ),
        };

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Pdf2VoiceError::DirectoryFailed {
                path: dir.clone(),
                source: e,
            })?;

        let slot = |kind: SlotKind| OutputSlot {
            kind,
            path: dir.join(kind.file_name()),
            url: format!("{}/{}", url_base, kind.file_name()),
        };

        Ok(OutputSlots {
            original: slot(SlotKind::Original),
            translated: slot(SlotKind::Translated),
        })
    }

    /// Remove per-request output directories older than `max_age`.
    ///
    /// Only directories named like a request id are touched. Returns the
    /// number of directories removed.
    pub async fn sweep_outputs(&self, max_age: Duration) -> Result<usize, Pdf2VoiceError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.static_dir)
            .await
            .map_err(|e| Pdf2VoiceError::DirectoryFailed {
                path: self.static_dir.clone(),
                source: e,
            })?;

        let now = SystemTime::now();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if uuid::Uuid::parse_str(name).is_err() {
                continue;
            }
            let Ok(meta) = entry.metadata().await else { continue };
            if !meta.is_dir() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(dir = %entry.path().display(), "failed to sweep output: {e}"),
            }
        }

        if removed > 0 {
            info!(removed, "swept expired output directories");
        }
        Ok(removed)
    }
}

/// Write `bytes` to `slot`, replacing what was there.
///
/// Atomic write: temp file in the same directory, then rename, so a client
/// fetching the slot never sees a half-written MP3.
pub async fn write_slot(slot: &OutputSlot, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = slot
        .path
        .with_extension(format!("mp3.{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp_path, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, &slot.path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts are dropped (both `/` and `\`), anything outside
/// `[A-Za-z0-9._-]` becomes `_`, and leading dots are stripped so the
/// result is never hidden or a parent reference.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "document.pdf".to_string()
    } else {
        trimmed.chars().take(128).collect()
    }
}
