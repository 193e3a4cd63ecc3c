//! Remote data gateway
//!
//! One module per entity, each a set of free functions over a [`Gateway`].
//! Rows come back in the backend's shape and are converted into the
//! application models here, so nothing above this layer sees column names.

pub mod auth;
pub mod glazes;
pub mod guilds;
pub mod profiles;
pub mod projects;
pub mod reclaim;
pub mod rest;

use crate::config::BackendConfig;
use crate::error::AppError;
use crate::models::Photo;
use kiln_auth::Session;
use kiln_media::StorageClient;
use rest::RestClient;
use serde::Deserialize;
use std::time::Duration;

/// Table access, object storage and the resolved identity
#[derive(Debug, Clone)]
pub struct Gateway {
    rest: RestClient,
    storage: StorageClient,
    user_id: Option<String>,
}

impl Gateway {
    pub fn new(backend: &BackendConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("CoastalKiln/0.1.0")
            .build()
            .map_err(|e| AppError::Network(format!("Client build failed: {}", e)))?;

        Ok(Self {
            rest: RestClient::new(&backend.url, &backend.anon_key, http.clone()),
            storage: StorageClient::with_client(&backend.url, &backend.anon_key, http),
            user_id: None,
        })
    }

    /// Points every request at the given session (or back at the public key)
    pub fn set_session(&mut self, session: Option<&Session>) {
        let token = session.map(|s| s.access_token.clone());
        self.rest.set_access_token(token.clone());
        self.storage.set_access_token(token);
        self.user_id = session.map(|s| s.user.id.clone());
    }

    /// Id of the signed-in user; user-scoped writes fail fast without one
    pub fn user_id(&self) -> Result<&str, AppError> {
        self.user_id.as_deref().ok_or(AppError::AuthRequired)
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }
}

/// Photo or test-tile metadata row
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRow {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub storage_path: Option<String>,
}

impl From<PhotoRow> for Photo {
    fn from(row: PhotoRow) -> Self {
        Photo {
            id: row.id,
            url: row.url,
            storage_path: row.storage_path,
        }
    }
}

/// `{"count": n}` as returned by an embedded `(count)` select
#[derive(Debug, Clone, Deserialize)]
pub struct CountRow {
    pub count: u32,
}
