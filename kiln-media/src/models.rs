use crate::error::MediaResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Object-storage buckets used by the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    ProjectPhotos,
    GlazeTiles,
    Avatars,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::ProjectPhotos => "project-photos",
            Bucket::GlazeTiles => "glaze-tiles",
            Bucket::Avatars => "avatars",
        }
    }
}

/// An image picked by the user that has not been stored anywhere yet
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk and determines its content type from the bytes,
    /// falling back to the file extension
    pub fn from_path(path: &Path) -> MediaResult<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = sniff_content_type(&bytes, path).to_string();

        log::debug!(
            "Read {} ({} bytes, {})",
            file_name,
            bytes.len(),
            content_type
        );

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// File extension used for the storage path: the part after the last dot
    /// of the file name, else derived from the content type
    pub fn extension(&self) -> String {
        if let Some((stem, ext)) = self.file_name.rsplit_once('.') {
            if !stem.is_empty() && !ext.is_empty() {
                return ext.to_ascii_lowercase();
            }
        }
        match self.content_type.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/heic" => "heic",
            _ => "bin",
        }
        .to_string()
    }
}

/// Location of an object after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

fn sniff_content_type(bytes: &[u8], path: &Path) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }

    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("heic") | Some("heif") => "image/heic",
        _ => "application/octet-stream",
    }
}
