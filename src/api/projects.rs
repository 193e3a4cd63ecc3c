use super::{Gateway, PhotoRow};
use crate::error::AppError;
use crate::models::{Photo, Piece, Stage};
use chrono::{DateTime, Local, Utc};
use kiln_media::{Bucket, ImageUpload};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

const PROJECT_SELECT: &str = "*,
    photos:project_photos(*),
    notes:project_notes(*)";

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub clay_body: Option<String>,
    pub stage: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub glaze_ids: Option<Vec<String>>,
    #[serde(default)]
    pub custom_glaze: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRow>,
    #[serde(default)]
    pub notes: Vec<NoteRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteRow {
    pub stage: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl From<ProjectRow> for Piece {
    fn from(row: ProjectRow) -> Self {
        let stage = Stage::parse(&row.stage).unwrap_or_else(|| {
            log::warn!("Project {} has unknown stage '{}'", row.id, row.stage);
            Stage::Wedging
        });

        let notes: BTreeMap<Stage, String> = row
            .notes
            .into_iter()
            .filter_map(|n| Some((Stage::parse(&n.stage)?, n.content.unwrap_or_default())))
            .collect();

        Piece {
            id: row.id,
            title: row.title,
            clay: row.clay_body.unwrap_or_default(),
            stage,
            date: row
                .created_at
                .map(|t| t.with_timezone(&Local).date_naive())
                .unwrap_or_else(|| Local::now().date_naive()),
            photos: row.photos.into_iter().map(Photo::from).collect(),
            notes,
            glaze_ids: row.glaze_ids.unwrap_or_default(),
            custom_glaze: row.custom_glaze.filter(|c| !c.trim().is_empty()),
        }
    }
}

/// The caller's pieces, most recently updated first
pub async fn list(gw: &Gateway) -> Result<Vec<Piece>, AppError> {
    let rows: Vec<ProjectRow> = gw
        .rest()
        .from("projects")
        .select(PROJECT_SELECT)
        .order("updated_at", false)
        .fetch()
        .await?;
    Ok(rows.into_iter().map(Piece::from).collect())
}

pub async fn get(gw: &Gateway, id: &str) -> Result<Piece, AppError> {
    let row: ProjectRow = gw
        .rest()
        .from("projects")
        .select(PROJECT_SELECT)
        .eq("id", id)
        .single()
        .await?;
    Ok(row.into())
}

pub async fn create(gw: &Gateway, title: &str, clay: &str) -> Result<Piece, AppError> {
    let user_id = gw.user_id()?;
    let row: ProjectRow = gw
        .rest()
        .from("projects")
        .insert(&json!({
            "user_id": user_id,
            "title": title,
            "clay_body": clay,
            "stage": Stage::Wedging.as_str(),
        }))
        .await?;

    log::info!("Created project {}", row.id);
    Ok(row.into())
}

pub async fn update(gw: &Gateway, id: &str, title: &str, clay: &str) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("projects")
        .eq("id", id)
        .update(&json!({ "title": title, "clay_body": clay }))
        .await?;
    Ok(())
}

/// Replaces the glaze references of a piece
pub async fn update_glazes(
    gw: &Gateway,
    id: &str,
    glaze_ids: &[String],
    custom_glaze: Option<&str>,
) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("projects")
        .eq("id", id)
        .update(&json!({ "glaze_ids": glaze_ids, "custom_glaze": custom_glaze }))
        .await?;
    Ok(())
}

pub async fn update_stage(gw: &Gateway, id: &str, stage: Stage) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("projects")
        .eq("id", id)
        .update(&json!({ "stage": stage.as_str() }))
        .await?;
    Ok(())
}

pub async fn delete(gw: &Gateway, id: &str) -> Result<(), AppError> {
    gw.rest().from("projects").eq("id", id).delete().await
}

/// Uploads the image, then records its metadata row
pub async fn add_photo(
    gw: &Gateway,
    project_id: &str,
    upload: &ImageUpload,
    stage: Option<Stage>,
) -> Result<Photo, AppError> {
    let user_id = gw.user_id()?;
    let stored = gw
        .storage()
        .store_for(Bucket::ProjectPhotos, user_id, project_id, upload)
        .await?;

    let row: PhotoRow = gw
        .rest()
        .from("project_photos")
        .insert(&json!({
            "project_id": project_id,
            "storage_path": stored.path,
            "url": stored.public_url,
            "stage": stage.map(|s| s.as_str()),
        }))
        .await?;
    Ok(row.into())
}

/// Removes the stored object first; the row is only deleted if that worked
pub async fn delete_photo(gw: &Gateway, photo: &Photo) -> Result<(), AppError> {
    if let Some(path) = photo.storage_path.as_deref() {
        gw.storage()
            .remove(Bucket::ProjectPhotos, &[path])
            .await?;
    }
    gw.rest()
        .from("project_photos")
        .eq("id", &photo.id)
        .delete()
        .await
}

pub async fn upsert_note(
    gw: &Gateway,
    project_id: &str,
    stage: Stage,
    content: &str,
) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("project_notes")
        .on_conflict("project_id,stage")
        .upsert(&json!({
            "project_id": project_id,
            "stage": stage.as_str(),
            "content": content,
        }))
        .await?;
    Ok(())
}
