//! Receipt file storage.
//!
//! Uploads are validated (size cap, content-type allow-list) before they
//! touch the store. The store itself is a trait so the local-disk
//! implementation can be swapped for an object store without touching
//! the handlers.

use crate::config::StorageConfig;
use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Content types accepted for expense receipts.
pub const ALLOWED_RECEIPT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/pdf",
];

/// Reject oversized or unexpected uploads before any I/O happens.
pub fn validate_receipt(
    content_type: &str,
    size_bytes: usize,
    max_bytes: usize,
) -> Result<(), AppError> {
    if !ALLOWED_RECEIPT_TYPES.contains(&content_type) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported receipt type '{}'; allowed: JPEG, PNG, WebP, PDF",
            content_type
        )));
    }
    if size_bytes > max_bytes {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Receipt exceeds the maximum size of {} bytes",
            max_bytes
        )));
    }
    Ok(())
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "pdf",
    }
}

/// Receipt blob store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist the bytes and return the stored path/key.
    async fn store_receipt(
        &self,
        company_id: Uuid,
        expense_id: Uuid,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, AppError>;
}

/// Local-disk store; receipts land under `<root>/<company_id>/`.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.receipt_dir),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store_receipt(
        &self,
        company_id: Uuid,
        expense_id: Uuid,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, AppError> {
        let dir = self.root.join(company_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", expense_id, extension_for(content_type));
        let path = dir.join(&file_name);
        tokio::fs::write(&path, data).await?;

        info!(
            expense_id = %expense_id,
            path = %path.display(),
            size = data.len(),
            "Receipt stored"
        );

        Ok(Path::new(&company_id.to_string())
            .join(file_name)
            .to_string_lossy()
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_types_under_the_cap() {
        for ct in ALLOWED_RECEIPT_TYPES {
            assert!(validate_receipt(ct, 1024, 5 * 1024 * 1024).is_ok());
        }
    }

    #[test]
    fn rejects_disallowed_content_type() {
        let err = validate_receipt("image/gif", 1024, 5 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_oversized_upload() {
        let err = validate_receipt("image/png", 6 * 1024 * 1024, 5 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn size_exactly_at_the_cap_is_allowed() {
        assert!(validate_receipt("application/pdf", 5 * 1024 * 1024, 5 * 1024 * 1024).is_ok());
    }

    #[tokio::test]
    async fn stores_receipt_under_company_directory() {
        let tmp = std::env::temp_dir().join(format!("receipts-{}", Uuid::new_v4()));
        let storage = LocalStorage {
            root: tmp.clone(),
        };
        let company_id = Uuid::new_v4();
        let expense_id = Uuid::new_v4();

        let stored = storage
            .store_receipt(company_id, expense_id, "image/png", b"fake png bytes")
            .await
            .unwrap();

        assert!(stored.starts_with(&company_id.to_string()));
        assert!(stored.ends_with(".png"));
        assert!(tmp.join(&stored).exists());

        tokio::fs::remove_dir_all(&tmp).await.unwrap();
    }
}
