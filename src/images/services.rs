use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::StorageClient;

/// Stored image references are server-relative paths under this prefix.
pub const UPLOADS_PREFIX: &str = "/uploads/";

const PRESIGN_TTL_SECS: u64 = 10 * 60;

pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// Uploads a profile image and returns its server-relative path.
pub async fn store_profile_image(
    storage: &dyn StorageClient,
    user_id: Uuid,
    img: ImageUpload,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&img.content_type)
        .with_context(|| format!("unsupported image type {}", img.content_type))?;
    let key = format!("profiles/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    storage
        .put_object(&key, img.body, &img.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    info!(%user_id, %key, "profile image stored");
    Ok(format!("{UPLOADS_PREFIX}{key}"))
}

/// Deletes a previously stored image. Failures are logged and swallowed.
pub async fn discard_image(storage: &dyn StorageClient, path: &str) {
    let Some(key) = key_from_path(path) else {
        warn!(%path, "not an uploaded image path; leaving it");
        return;
    };
    if let Err(e) = storage.delete_object(key).await {
        warn!(error = %e, %key, "failed to delete image");
    }
}

pub async fn presign_upload(storage: &dyn StorageClient, key: &str) -> anyhow::Result<String> {
    storage
        .presign_get(key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for key {}", key))
}

pub fn key_from_path(path: &str) -> Option<&str> {
    path.strip_prefix(UPLOADS_PREFIX).filter(|k| !k.is_empty())
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
