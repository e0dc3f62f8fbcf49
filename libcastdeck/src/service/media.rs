//! Media library
//!
//! Uploaded bytes are written under the configured media directory with a
//! unique prefix; the database keeps one row per file. The stored `path`
//! can be passed as a media reference when scheduling a post.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use crate::config::MediaConfig;
use crate::error::CastdeckError;
use crate::types::{now_secs, MediaFile};
use crate::{Database, Result};

/// Content types accepted for upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
    "audio/mpeg",
    "audio/wav",
    "application/pdf",
];

#[derive(Clone)]
pub struct MediaService {
    db: Arc<Database>,
    config: MediaConfig,
}

impl MediaService {
    pub fn new(db: Arc<Database>, config: MediaConfig) -> Self {
        Self { db, config }
    }

    /// Store an uploaded file and record it in the library
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty or oversized body, an unsupported
    ///   content type or a file name with nothing usable left after
    ///   sanitizing
    /// - `Storage` if the file cannot be written
    pub async fn upload(&self, filename: &str, mime_type: &str, bytes: &[u8]) -> Result<MediaFile> {
        let name = sanitize_filename(filename).ok_or_else(|| {
            CastdeckError::InvalidArgument(format!("invalid file name '{}'", filename))
        })?;

        // Parameters such as "; charset=..." do not change the type
        let mime_type = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(CastdeckError::InvalidArgument(format!(
                "unsupported content type '{}' (allowed: {})",
                mime_type,
                ALLOWED_MIME_TYPES.join(", ")
            )));
        }

        if bytes.is_empty() {
            return Err(CastdeckError::InvalidArgument(
                "upload must not be empty".to_string(),
            ));
        }
        if bytes.len() as u64 > self.config.max_bytes {
            return Err(CastdeckError::InvalidArgument(format!(
                "upload is {} bytes, limit is {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let dir = self.config.dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(CastdeckError::Storage)?;

        let id = uuid::Uuid::new_v4().to_string();
        let path = dir.join(format!("{}_{}", id, name));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(CastdeckError::Storage)?;

        let media = MediaFile {
            id,
            filename: name,
            path: path.to_string_lossy().into_owned(),
            mime_type,
            size_bytes: bytes.len() as i64,
            created_at: now_secs(),
        };

        if let Err(e) = self.db.insert_media(&media).await {
            remove_file(&path).await;
            return Err(e);
        }

        tracing::info!(
            media_id = %media.id,
            filename = %media.filename,
            size_bytes = media.size_bytes,
            "Media stored"
        );
        Ok(media)
    }

    pub async fn get(&self, media_id: &str) -> Result<MediaFile> {
        self.db
            .get_media(media_id)
            .await?
            .ok_or_else(|| CastdeckError::not_found("Media file", media_id))
    }

    /// Newest uploads first
    pub async fn list(&self) -> Result<Vec<MediaFile>> {
        self.db.list_media().await
    }

    /// Remove a file from the library and from disk
    ///
    /// Returns false when no such file is recorded. A file already missing
    /// from disk is not an error.
    pub async fn delete(&self, media_id: &str) -> Result<bool> {
        match self.db.delete_media(media_id).await? {
            Some(media) => {
                remove_file(Path::new(&media.path)).await;
                tracing::info!(media_id, "Media deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove media file"),
    }
}

/// Keep only the final path component, limited to a safe character set
fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(128)
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        None
    } else {
        Some(trimmed.to_string())
    }
}
