use super::{Gateway, PhotoRow};
use crate::error::AppError;
use crate::models::{Glaze, Photo};
use kiln_media::{Bucket, ImageUpload};
use serde::{Deserialize, Serialize};
use serde_json::json;

const GLAZE_SELECT: &str = "*,
    tiles:glaze_tiles(*)";

#[derive(Debug, Clone, Deserialize)]
pub struct GlazeRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub firing_type: Option<String>,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tiles: Vec<PhotoRow>,
}

impl From<GlazeRow> for Glaze {
    fn from(row: GlazeRow) -> Self {
        Glaze {
            id: row.id,
            name: row.name,
            firing_type: row.firing_type.unwrap_or_default(),
            recipe: row.recipe.unwrap_or_default(),
            notes: row.notes.unwrap_or_default(),
            tiles: row.tiles.into_iter().map(Photo::from).collect(),
            is_public: row.is_public,
        }
    }
}

/// Partial glaze update; unset fields are left alone
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlazeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firing_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// The caller's glazes plus every public one
pub async fn list(gw: &Gateway) -> Result<Vec<Glaze>, AppError> {
    let user_id = gw.user_id()?;
    let rows: Vec<GlazeRow> = gw
        .rest()
        .from("glazes")
        .select(GLAZE_SELECT)
        .or(&format!("user_id.eq.{},is_public.eq.true", user_id))
        .order("updated_at", false)
        .fetch()
        .await?;
    Ok(rows.into_iter().map(Glaze::from).collect())
}

/// Only the caller's own glazes
pub async fn list_own(gw: &Gateway) -> Result<Vec<Glaze>, AppError> {
    let user_id = gw.user_id()?;
    let rows: Vec<GlazeRow> = gw
        .rest()
        .from("glazes")
        .select(GLAZE_SELECT)
        .eq("user_id", user_id)
        .order("updated_at", false)
        .fetch()
        .await?;
    Ok(rows.into_iter().map(Glaze::from).collect())
}

pub async fn get(gw: &Gateway, id: &str) -> Result<Glaze, AppError> {
    let row: GlazeRow = gw
        .rest()
        .from("glazes")
        .select(GLAZE_SELECT)
        .eq("id", id)
        .single()
        .await?;
    Ok(row.into())
}

pub async fn create(gw: &Gateway, glaze: &Glaze) -> Result<Glaze, AppError> {
    let user_id = gw.user_id()?;
    let row: GlazeRow = gw
        .rest()
        .from("glazes")
        .insert(&json!({
            "user_id": user_id,
            "name": glaze.name,
            "firing_type": glaze.firing_type,
            "recipe": glaze.recipe,
            "notes": glaze.notes,
            "is_public": glaze.is_public,
        }))
        .await?;

    log::info!("Created glaze {}", row.id);
    Ok(row.into())
}

pub async fn update(gw: &Gateway, id: &str, changes: &GlazeUpdate) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("glazes")
        .eq("id", id)
        .update(changes)
        .await?;
    Ok(())
}

pub async fn delete(gw: &Gateway, id: &str) -> Result<(), AppError> {
    gw.rest().from("glazes").eq("id", id).delete().await
}

/// Uploads a test-tile photo and records it against the glaze
pub async fn add_tile(
    gw: &Gateway,
    glaze_id: &str,
    upload: &ImageUpload,
    clay_body: Option<&str>,
    firing_notes: Option<&str>,
) -> Result<Photo, AppError> {
    let user_id = gw.user_id()?;
    let stored = gw
        .storage()
        .store_for(Bucket::GlazeTiles, user_id, glaze_id, upload)
        .await?;

    let row: PhotoRow = gw
        .rest()
        .from("glaze_tiles")
        .insert(&json!({
            "glaze_id": glaze_id,
            "storage_path": stored.path,
            "url": stored.public_url,
            "clay_body": clay_body,
            "firing_notes": firing_notes,
        }))
        .await?;
    Ok(row.into())
}

pub async fn delete_tile(gw: &Gateway, tile: &Photo) -> Result<(), AppError> {
    if let Some(path) = tile.storage_path.as_deref() {
        gw.storage().remove(Bucket::GlazeTiles, &[path]).await?;
    }
    gw.rest()
        .from("glaze_tiles")
        .eq("id", &tile.id)
        .delete()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, StubServer};

    #[test]
    fn test_row_maps_firing_type_and_tiles() {
        let row: GlazeRow = serde_json::from_value(json!({
            "id": "g1",
            "name": "Temmoku",
            "firing_type": "Cone 10",
            "recipe": "Custer Feldspar 40%",
            "notes": null,
            "is_public": true,
            "tiles": [{"id": "t1", "url": "https://x/t1.jpg", "storage_path": "u1/g1/2.jpg"}]
        }))
        .unwrap();

        let glaze = Glaze::from(row);
        assert_eq!(glaze.firing_type, "Cone 10");
        assert_eq!(glaze.notes, "");
        assert!(glaze.is_public);
        assert_eq!(glaze.tiles.len(), 1);
    }

    #[test]
    fn test_update_sends_only_changes() {
        let changes = GlazeUpdate {
            recipe: Some("Silica 25%".into()),
            ..GlazeUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({"recipe": "Silica 25%"})
        );
    }

    #[tokio::test]
    async fn test_tile_row_kept_when_storage_removal_fails() {
        let server = StubServer::start(vec![
            Reply::new("DELETE", "/storage/v1/object/glaze-tiles", 503, "unavailable"),
            Reply::new("DELETE", "/rest/v1/glaze_tiles", 204, ""),
        ]);
        let tile = Photo {
            id: "t1".into(),
            url: "https://x/t1.jpg".into(),
            storage_path: Some("user-1/g1/2.jpg".into()),
        };

        assert!(delete_tile(&server.gateway(), &tile).await.is_err());
        assert!(!server.received("DELETE", "/rest/v1/glaze_tiles"));
    }

    #[tokio::test]
    async fn test_own_list_filters_by_user() {
        let server = StubServer::start(vec![Reply::json(
            "GET",
            "/rest/v1/glazes",
            json!([{"id": "g1", "name": "Shino", "firing_type": "Cone 10"}]),
        )]);
        let glazes = list_own(&server.gateway()).await.unwrap();
        assert_eq!(glazes[0].name, "Shino");
        assert!(server.requests()[0].contains("user_id=eq.user-1"));
    }
}
