//! Object storage on the hosted backend
//!
//! Uploads go to `{owner}/{entity}/{timestamp}.{ext}` inside a bucket; the
//! public URL of the object is what the metadata rows point at.

use crate::error::{MediaError, MediaResult};
use crate::models::{Bucket, ImageUpload, StoredObject};
use crate::validate::validate_image;
use std::time::Duration;

/// Storage path for a photo or tile belonging to `entity_id`
pub fn object_path(owner: &str, entity_id: &str, timestamp_ms: i64, ext: &str) -> String {
    format!("{}/{}/{}.{}", owner, entity_id, timestamp_ms, ext)
}

/// Storage path of a user's avatar (overwritten on each upload)
pub fn avatar_path(owner: &str, ext: &str) -> String {
    format!("{}/avatar.{}", owner, ext)
}

/// Client for the backend's object storage API
#[derive(Debug, Clone)]
pub struct StorageClient {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl StorageClient {
    /// Create a storage client with its own HTTP connection pool
    pub fn new(base_url: &str, anon_key: &str) -> MediaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("CoastalKiln/0.1.0")
            .build()
            .map_err(|e| MediaError::NetworkError(format!("Client build failed: {}", e)))?;

        Ok(Self::with_client(base_url, anon_key, http))
    }

    /// Create a storage client sharing an existing HTTP client
    pub fn with_client(base_url: &str, anon_key: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: None,
            http,
        }
    }

    /// Session token used for authenticated uploads; `None` falls back to the
    /// public key
    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    pub fn object_url(&self, bucket: Bucket, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            bucket.as_str(),
            path.trim_start_matches('/')
        )
    }

    pub fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            bucket.as_str(),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    /// Upload raw bytes to `path` inside `bucket`
    pub async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        upload: &ImageUpload,
        upsert: bool,
    ) -> MediaResult<()> {
        let url = self.object_url(bucket, path);

        let response = self
            .authorize(self.http.post(&url))
            .header("Content-Type", &upload.content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(upload.bytes.clone())
            .send()
            .await?;

        check_status(response).await?;
        log::info!(
            "Uploaded {} ({} bytes) to {}/{}",
            upload.file_name,
            upload.size(),
            bucket.as_str(),
            path
        );
        Ok(())
    }

    /// Remove objects from a bucket
    pub async fn remove(&self, bucket: Bucket, paths: &[&str]) -> MediaResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, bucket.as_str());

        let response = self
            .authorize(self.http.delete(&url))
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;

        check_status(response).await?;
        log::info!("Removed {} object(s) from {}", paths.len(), bucket.as_str());
        Ok(())
    }

    /// Validates the image, uploads it under a timestamped path scoped to the
    /// owner and entity, and returns where it landed
    pub async fn store_for(
        &self,
        bucket: Bucket,
        owner: &str,
        entity_id: &str,
        upload: &ImageUpload,
    ) -> MediaResult<StoredObject> {
        validate_image(upload)?;

        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let path = object_path(owner, entity_id, timestamp_ms, &upload.extension());
        self.upload(bucket, &path, upload, false).await?;

        Ok(StoredObject {
            public_url: self.public_url(bucket, &path),
            path,
        })
    }

    /// Uploads (overwriting) the owner's avatar and returns its location
    pub async fn store_avatar(&self, owner: &str, upload: &ImageUpload) -> MediaResult<StoredObject> {
        validate_image(upload)?;

        let path = avatar_path(owner, &upload.extension());
        self.upload(Bucket::Avatars, &path, upload, true).await?;

        Ok(StoredObject {
            public_url: self.public_url(Bucket::Avatars, &path),
            path,
        })
    }
}

async fn check_status(response: reqwest::Response) -> MediaResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);

    Err(MediaError::StorageError {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_layout() {
        assert_eq!(
            object_path("user-1", "project-9", 1736500000000, "jpg"),
            "user-1/project-9/1736500000000.jpg"
        );
        assert_eq!(avatar_path("user-1", "png"), "user-1/avatar.png");
    }

    #[test]
    fn test_urls() {
        let client = StorageClient::with_client(
            "https://kiln.example.co/",
            "anon",
            reqwest::Client::new(),
        );
        assert_eq!(
            client.object_url(Bucket::GlazeTiles, "u/g/1.jpg"),
            "https://kiln.example.co/storage/v1/object/glaze-tiles/u/g/1.jpg"
        );
        assert_eq!(
            client.public_url(Bucket::ProjectPhotos, "/u/p/2.png"),
            "https://kiln.example.co/storage/v1/object/public/project-photos/u/p/2.png"
        );
    }

    #[tokio::test]
    async fn test_store_rejects_before_upload() {
        // unroutable host: validation must fail before any request is made
        let client = StorageClient::with_client("http://127.0.0.1:9", "anon", reqwest::Client::new());
        let upload = ImageUpload::new("notes.txt", "text/plain", b"hello".to_vec());

        let err = client
            .store_for(Bucket::ProjectPhotos, "u", "p", &upload)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NotAnImage(_)));
    }
}
