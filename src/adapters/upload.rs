//! Image upload adapter.

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Store an image under `folder` and return its public URL.
    async fn upload(&self, bytes: &[u8], content_type: &str, folder: &str)
    -> Result<String, AppError>;
}

/// Extension for an accepted image content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type.split(';').next().map(str::trim) {
        Some("image/jpeg") | Some("image/jpg") => Some("jpg"),
        Some("image/png") => Some("png"),
        Some("image/webp") => Some("webp"),
        Some("image/gif") => Some("gif"),
        _ => None,
    }
}

/// Writes files below a local directory that the router serves at `/uploads`.
pub struct LocalUploader {
    root: PathBuf,
    public_base: String,
}

impl LocalUploader {
    pub fn new(root: impl Into<PathBuf>, server_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base: format!("{}/uploads", server_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ImageUploader for LocalUploader {
    async fn upload(
        &self,
        bytes: &[u8],
        content_type: &str,
        folder: &str,
    ) -> Result<String, AppError> {
        let ext = image_extension(content_type).ok_or_else(|| {
            AppError::Validation("Only JPEG, PNG, WebP or GIF images are accepted".to_string())
        })?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Image is empty".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::Validation("Image is larger than 5 MB".to_string()));
        }
        if folder.is_empty() || !folder.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(AppError::Internal(format!("invalid upload folder {folder:?}")));
        }

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("create {}: {e}", dir.display())))?;

        let file_name = format!("{}.{ext}", Uuid::new_v4());
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("write {}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), size = bytes.len(), "Image stored");
        Ok(format!("{}/{folder}/{file_name}", self.public_base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_image_types() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/jpeg; charset=binary"), Some("jpg"));
        assert_eq!(image_extension("application/pdf"), None);
    }

    #[tokio::test]
    async fn stores_file_and_returns_public_url() {
        let root = std::env::temp_dir().join(format!("jeanpay-upload-{}", Uuid::new_v4()));
        let uploader = LocalUploader::new(&root, "http://localhost:8080/");

        let url = uploader
            .upload(b"\x89PNG fake", "image/png", "avatars")
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:8080/uploads/avatars/"));
        assert!(url.ends_with(".png"));

        let file_name = url.rsplit('/').next().unwrap();
        assert!(root.join("avatars").join(file_name).exists());

        assert!(matches!(
            uploader.upload(b"x", "text/plain", "avatars").await,
            Err(AppError::Validation(_))
        ));
        let _ = std::fs::remove_dir_all(root);
    }
}
