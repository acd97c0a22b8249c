//! Local image storage for uploads
//!
//! Uploaded images are written to a directory on disk under a random UUID
//! filename and served back by the API under a public prefix (`/uploads`).
//! Only JPEG, PNG, GIF and WebP are accepted; the declared content type must
//! be one of those and the file's magic bytes must agree with it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File exceeds the maximum size of {max} bytes")]
    TooLarge { max: usize },

    #[error("File is empty")]
    Empty,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata returned for a stored upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Public URL path, e.g. `/uploads/<uuid>.png`
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub content_type: String,
}

/// File extension for a supported image content type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Identifies a supported image format from its leading bytes
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

fn canonical_content_type(extension: &str) -> &'static str {
    match extension {
        "jpg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/webp",
    }
}

/// Image store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Creates the storage directory if needed
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Checks type and size without touching the disk
    pub fn check_image(&self, content_type: &str, bytes: &[u8]) -> Result<&'static str, StorageError> {
        let declared = extension_for(content_type)
            .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))?;

        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }

        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                max: self.max_bytes,
            });
        }

        match sniff_image(bytes) {
            Some(actual) if actual == declared => Ok(actual),
            _ => Err(StorageError::UnsupportedType(format!(
                "{} (content does not match)",
                content_type
            ))),
        }
    }

    /// Validates and writes an image, returning its public URL
    pub async fn save_image(
        &self,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let extension = self.check_image(content_type, bytes)?;

        self.ensure_root().await?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.root.join(&filename), bytes).await?;

        info!(filename = %filename, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            url: format!("{}/{}", self.public_prefix, filename),
            filename,
            size: bytes.len(),
            content_type: canonical_content_type(extension).to_string(),
        })
    }
}
