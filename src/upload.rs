//! Upload policy for product images. Only the acceptance rules and the CDN
//! parameters live here; the upload itself belongs to the image CDN.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const UPLOAD_FOLDER: &str = "mobile-skins";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("Only image files are allowed")]
    NotAnImage(String),
    #[error("File too large")]
    TooLarge(u64),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub folder: String,
    pub allowed_formats: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            folder: UPLOAD_FOLDER.to_string(),
            allowed_formats: ["jpg", "jpeg", "png", "gif", "webp"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UploadPolicy {
    pub fn validate(&self, mime: &str, size: u64) -> Result<(), UploadRejection> {
        if !mime.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(UploadRejection::NotAnImage(mime.to_string()));
        }
        if size > self.max_bytes {
            return Err(UploadRejection::TooLarge(size));
        }
        Ok(())
    }

    /// Storage parameters handed to the CDN uploader.
    pub fn cdn_params(&self) -> serde_json::Value {
        json!({
            "folder": self.folder,
            "allowed_formats": self.allowed_formats,
            "transformation": [
                {"width": 1000, "height": 1000, "crop": "limit"},
                {"quality": "auto"}
            ]
        })
    }
}
