use super::Gateway;
use crate::error::AppError;
use crate::models::{Profile, ProfileUpdate, Units};
use kiln_media::ImageUpload;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        let defaults = Profile::default();
        Profile {
            username: row.username.unwrap_or(defaults.username),
            email: row.email.unwrap_or_default(),
            bio: row.bio.unwrap_or_default(),
            location: row.location.unwrap_or_default(),
            units: row
                .units
                .as_deref()
                .and_then(Units::parse)
                .unwrap_or_default(),
            avatar_url: row.avatar_url,
        }
    }
}

/// Profile of the signed-in user
pub async fn get(gw: &Gateway) -> Result<Profile, AppError> {
    let user_id = gw.user_id()?;
    get_by_id(gw, user_id).await
}

pub async fn get_by_id(gw: &Gateway, id: &str) -> Result<Profile, AppError> {
    let row: ProfileRow = gw
        .rest()
        .from("profiles")
        .select("*")
        .eq("id", id)
        .single()
        .await?;
    Ok(row.into())
}

/// Applies `changes` and returns the stored profile
pub async fn update(gw: &Gateway, changes: &ProfileUpdate) -> Result<Profile, AppError> {
    let user_id = gw.user_id()?;
    let row: ProfileRow = gw
        .rest()
        .from("profiles")
        .eq("id", user_id)
        .update(changes)
        .await?;
    Ok(row.into())
}

/// Stores the avatar (replacing any previous one) and records its URL
pub async fn upload_avatar(gw: &Gateway, upload: &ImageUpload) -> Result<String, AppError> {
    let user_id = gw.user_id()?;
    let stored = gw.storage().store_avatar(user_id, upload).await?;

    let _: ProfileRow = gw
        .rest()
        .from("profiles")
        .eq("id", user_id)
        .update(&json!({ "avatar_url": stored.public_url }))
        .await?;
    Ok(stored.public_url)
}
