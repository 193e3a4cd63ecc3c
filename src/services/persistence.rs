//! Persistence strategies
//!
//! The studio talks to one [`Persistence`] implementation, chosen once at
//! startup: [`LocalBackend`] keeps everything in the local store,
//! [`RemoteBackend`] goes through the gateway and keeps the local store only
//! as a read fallback.

use crate::api::glazes::GlazeUpdate;
use crate::api::guilds::NewEvent;
use crate::api::{self, Gateway};
use crate::error::AppError;
use crate::models::{
    Glaze, Guild, Photo, Piece, Post, ReclaimBatch, ReclaimStatus, Resource, Stage,
};
use crate::services::retry::RetryPolicy;
use crate::services::sync::SyncMode;
use crate::storage::{LocalStore, StoreKey};
use kiln_auth::Session;
use kiln_media::{to_data_url, validate_image, ImageUpload};
use serde::Serialize;

/// What an image is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoTarget {
    Piece,
    GlazeTile,
}

#[allow(async_fn_in_trait)]
pub trait Persistence {
    fn sync_mode(&self) -> SyncMode;

    /// Store holding offline data and fallback copies
    fn local(&self) -> &LocalStore;

    /// Persists a whole collection after an in-memory change. Only the local
    /// backend writes anything.
    fn save<T: Serialize>(&self, key: StoreKey, value: &T);

    async fn fetch_pieces(&self) -> Result<Vec<Piece>, AppError>;
    async fn fetch_glazes(&self) -> Result<Vec<Glaze>, AppError>;
    async fn fetch_batches(&self) -> Result<Vec<ReclaimBatch>, AppError>;
    async fn fetch_guilds(&self) -> Result<Vec<Guild>, AppError>;

    // Single-item reads return `None` when the in-memory copy is authoritative

    async fn fetch_piece(&self, piece_id: &str) -> Result<Option<Piece>, AppError>;
    async fn fetch_glaze(&self, glaze_id: &str) -> Result<Option<Glaze>, AppError>;
    async fn fetch_batch(&self, batch_id: &str) -> Result<Option<ReclaimBatch>, AppError>;
    /// Guild with members, posts, resources and events
    async fn fetch_guild(&self, guild_id: &str) -> Result<Option<Guild>, AppError>;
    /// Only the caller's glazes, leaving out public ones shared by others
    async fn fetch_own_glazes(&self) -> Result<Option<Vec<Glaze>>, AppError>;
    /// Every guild, joined or not
    async fn discover_guilds(&self) -> Result<Option<Vec<Guild>>, AppError>;
    async fn total_reclaimed(&self) -> Result<Option<f64>, AppError>;

    async fn create_piece(&self, piece: Piece) -> Result<Piece, AppError>;
    async fn update_piece(&self, piece_id: &str, title: &str, clay: &str) -> Result<(), AppError>;
    async fn update_piece_glazes(
        &self,
        piece_id: &str,
        glaze_ids: &[String],
        custom_glaze: Option<&str>,
    ) -> Result<(), AppError>;
    async fn update_stage(&self, piece_id: &str, stage: Stage) -> Result<(), AppError>;
    async fn save_note(&self, piece_id: &str, stage: Stage, content: &str) -> Result<(), AppError>;
    async fn delete_piece(&self, piece_id: &str) -> Result<(), AppError>;

    async fn attach_photo(
        &self,
        target: PhotoTarget,
        owner_id: &str,
        upload: &ImageUpload,
    ) -> Result<Photo, AppError>;
    async fn detach_photo(&self, target: PhotoTarget, photo: &Photo) -> Result<(), AppError>;

    async fn create_glaze(&self, glaze: Glaze) -> Result<Glaze, AppError>;
    async fn update_glaze(&self, glaze_id: &str, changes: &GlazeUpdate) -> Result<(), AppError>;
    async fn delete_glaze(&self, glaze_id: &str) -> Result<(), AppError>;

    async fn create_batch(&self, batch: ReclaimBatch) -> Result<ReclaimBatch, AppError>;
    async fn update_batch(&self, batch: &ReclaimBatch) -> Result<(), AppError>;
    async fn update_batch_status(&self, batch_id: &str, status: ReclaimStatus) -> Result<(), AppError>;
    async fn delete_batch(&self, batch_id: &str) -> Result<(), AppError>;

    async fn invite_code_exists(&self, code: &str, known: &[Guild]) -> Result<bool, AppError>;
    async fn create_guild(&self, guild: Guild) -> Result<Guild, AppError>;
    async fn update_guild(
        &self,
        guild_id: &str,
        name: &str,
        location: &str,
        description: &str,
    ) -> Result<(), AppError>;
    /// The guild after the caller joined it
    async fn join_guild(&self, guild_id: &str, known: &[Guild], username: &str) -> Result<Guild, AppError>;
    /// The guild behind `code` after the caller joined it
    async fn join_guild_by_code(
        &self,
        code: &str,
        known: &[Guild],
        username: &str,
    ) -> Result<Guild, AppError>;
    async fn leave_guild(&self, guild_id: &str) -> Result<(), AppError>;
    async fn create_post(&self, guild_id: &str, post: Post) -> Result<Post, AppError>;
    async fn delete_post(&self, post_id: &str) -> Result<(), AppError>;
    async fn add_resource(&self, guild_id: &str, resource: Resource) -> Result<Resource, AppError>;
    async fn delete_resource(&self, resource_id: &str) -> Result<(), AppError>;
    /// Schedules an event and returns its display label
    async fn create_event(&self, guild_id: &str, event: &NewEvent) -> Result<String, AppError>;
}

/// Everything lives in the local store
#[derive(Clone)]
pub struct LocalBackend {
    store: LocalStore,
}

impl LocalBackend {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }
}

impl Persistence for LocalBackend {
    fn sync_mode(&self) -> SyncMode {
        SyncMode::Offline
    }

    fn local(&self) -> &LocalStore {
        &self.store
    }

    fn save<T: Serialize>(&self, key: StoreKey, value: &T) {
        self.store.set(key, value);
    }

    async fn fetch_pieces(&self) -> Result<Vec<Piece>, AppError> {
        Ok(self.store.get(StoreKey::Projects, Vec::new()))
    }

    async fn fetch_glazes(&self) -> Result<Vec<Glaze>, AppError> {
        Ok(self.store.get(StoreKey::Glazes, Vec::new()))
    }

    async fn fetch_batches(&self) -> Result<Vec<ReclaimBatch>, AppError> {
        Ok(self.store.get(StoreKey::ReclaimBatches, Vec::new()))
    }

    async fn fetch_guilds(&self) -> Result<Vec<Guild>, AppError> {
        Ok(self.store.get(StoreKey::Guilds, Vec::new()))
    }

    async fn fetch_piece(&self, _piece_id: &str) -> Result<Option<Piece>, AppError> {
        Ok(None)
    }

    async fn fetch_glaze(&self, _glaze_id: &str) -> Result<Option<Glaze>, AppError> {
        Ok(None)
    }

    async fn fetch_batch(&self, _batch_id: &str) -> Result<Option<ReclaimBatch>, AppError> {
        Ok(None)
    }

    async fn fetch_guild(&self, _guild_id: &str) -> Result<Option<Guild>, AppError> {
        Ok(None)
    }

    /// Every local glaze is the user's own
    async fn fetch_own_glazes(&self) -> Result<Option<Vec<Glaze>>, AppError> {
        Ok(None)
    }

    async fn discover_guilds(&self) -> Result<Option<Vec<Guild>>, AppError> {
        Ok(None)
    }

    async fn total_reclaimed(&self) -> Result<Option<f64>, AppError> {
        Ok(None)
    }

    async fn create_piece(&self, piece: Piece) -> Result<Piece, AppError> {
        Ok(piece)
    }

    async fn update_piece(&self, _piece_id: &str, _title: &str, _clay: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn update_piece_glazes(
        &self,
        _piece_id: &str,
        _glaze_ids: &[String],
        _custom_glaze: Option<&str>,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn update_stage(&self, _piece_id: &str, _stage: Stage) -> Result<(), AppError> {
        Ok(())
    }

    async fn save_note(&self, _piece_id: &str, _stage: Stage, _content: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete_piece(&self, _piece_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    /// Images are kept inline as data URLs
    async fn attach_photo(
        &self,
        _target: PhotoTarget,
        _owner_id: &str,
        upload: &ImageUpload,
    ) -> Result<Photo, AppError> {
        validate_image(upload)?;
        Ok(Photo::inline(to_data_url(upload)))
    }

    async fn detach_photo(&self, _target: PhotoTarget, _photo: &Photo) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_glaze(&self, glaze: Glaze) -> Result<Glaze, AppError> {
        Ok(glaze)
    }

    async fn update_glaze(&self, _glaze_id: &str, _changes: &GlazeUpdate) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete_glaze(&self, _glaze_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_batch(&self, batch: ReclaimBatch) -> Result<ReclaimBatch, AppError> {
        Ok(batch)
    }

    async fn update_batch(&self, _batch: &ReclaimBatch) -> Result<(), AppError> {
        Ok(())
    }

    async fn update_batch_status(&self, _batch_id: &str, _status: ReclaimStatus) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete_batch(&self, _batch_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn invite_code_exists(&self, code: &str, known: &[Guild]) -> Result<bool, AppError> {
        Ok(known.iter().any(|g| g.invite_code == code))
    }

    async fn create_guild(&self, guild: Guild) -> Result<Guild, AppError> {
        Ok(guild)
    }

    async fn update_guild(
        &self,
        _guild_id: &str,
        _name: &str,
        _location: &str,
        _description: &str,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn join_guild(&self, guild_id: &str, known: &[Guild], username: &str) -> Result<Guild, AppError> {
        let mut guild = known
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Guild {}", guild_id)))?;
        guild.join(username)?;
        Ok(guild)
    }

    async fn join_guild_by_code(
        &self,
        code: &str,
        known: &[Guild],
        username: &str,
    ) -> Result<Guild, AppError> {
        let mut guild = known
            .iter()
            .find(|g| g.invite_code == code)
            .cloned()
            .ok_or_else(|| AppError::Validation("Invalid invite code".to_string()))?;
        guild.join(username)?;
        Ok(guild)
    }

    async fn leave_guild(&self, _guild_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_post(&self, _guild_id: &str, post: Post) -> Result<Post, AppError> {
        Ok(post)
    }

    async fn delete_post(&self, _post_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn add_resource(&self, _guild_id: &str, resource: Resource) -> Result<Resource, AppError> {
        Ok(resource)
    }

    async fn delete_resource(&self, _resource_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_event(&self, _guild_id: &str, event: &NewEvent) -> Result<String, AppError> {
        Ok(event.label())
    }
}

/// Hosted backend through the gateway
#[derive(Clone)]
pub struct RemoteBackend {
    gateway: Gateway,
    fallback: LocalStore,
    policy: RetryPolicy,
}

impl RemoteBackend {
    pub fn new(gateway: Gateway, fallback: LocalStore, policy: RetryPolicy) -> Self {
        Self {
            gateway,
            fallback,
            policy,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn set_session(&mut self, session: Option<&Session>) {
        self.gateway.set_session(session);
    }
}

impl Persistence for RemoteBackend {
    fn sync_mode(&self) -> SyncMode {
        if self.gateway.user_id().is_ok() {
            SyncMode::Online
        } else {
            SyncMode::SignedOut
        }
    }

    fn local(&self) -> &LocalStore {
        &self.fallback
    }

    fn save<T: Serialize>(&self, _key: StoreKey, _value: &T) {}

    async fn fetch_pieces(&self) -> Result<Vec<Piece>, AppError> {
        api::projects::list(&self.gateway).await
    }

    async fn fetch_glazes(&self) -> Result<Vec<Glaze>, AppError> {
        api::glazes::list(&self.gateway).await
    }

    async fn fetch_batches(&self) -> Result<Vec<ReclaimBatch>, AppError> {
        api::reclaim::list(&self.gateway).await
    }

    async fn fetch_guilds(&self) -> Result<Vec<Guild>, AppError> {
        api::guilds::list_mine(&self.gateway).await
    }

    async fn fetch_piece(&self, piece_id: &str) -> Result<Option<Piece>, AppError> {
        self.policy
            .run("piece", || api::projects::get(&self.gateway, piece_id))
            .await
            .map(Some)
    }

    async fn fetch_glaze(&self, glaze_id: &str) -> Result<Option<Glaze>, AppError> {
        self.policy
            .run("glaze", || api::glazes::get(&self.gateway, glaze_id))
            .await
            .map(Some)
    }

    async fn fetch_batch(&self, batch_id: &str) -> Result<Option<ReclaimBatch>, AppError> {
        self.policy
            .run("reclaim batch", || api::reclaim::get(&self.gateway, batch_id))
            .await
            .map(Some)
    }

    async fn fetch_guild(&self, guild_id: &str) -> Result<Option<Guild>, AppError> {
        self.policy
            .run("guild", || api::guilds::get(&self.gateway, guild_id))
            .await
            .map(Some)
    }

    async fn fetch_own_glazes(&self) -> Result<Option<Vec<Glaze>>, AppError> {
        self.policy
            .run("own glazes", || api::glazes::list_own(&self.gateway))
            .await
            .map(Some)
    }

    async fn discover_guilds(&self) -> Result<Option<Vec<Guild>>, AppError> {
        self.policy
            .run("guild discovery", || api::guilds::list_all(&self.gateway))
            .await
            .map(Some)
    }

    async fn total_reclaimed(&self) -> Result<Option<f64>, AppError> {
        self.policy
            .run("reclaim total", || api::reclaim::total_weight(&self.gateway))
            .await
            .map(Some)
    }

    async fn create_piece(&self, piece: Piece) -> Result<Piece, AppError> {
        api::projects::create(&self.gateway, &piece.title, &piece.clay).await
    }

    async fn update_piece(&self, piece_id: &str, title: &str, clay: &str) -> Result<(), AppError> {
        api::projects::update(&self.gateway, piece_id, title, clay).await
    }

    async fn update_piece_glazes(
        &self,
        piece_id: &str,
        glaze_ids: &[String],
        custom_glaze: Option<&str>,
    ) -> Result<(), AppError> {
        api::projects::update_glazes(&self.gateway, piece_id, glaze_ids, custom_glaze).await
    }

    async fn update_stage(&self, piece_id: &str, stage: Stage) -> Result<(), AppError> {
        api::projects::update_stage(&self.gateway, piece_id, stage).await
    }

    async fn save_note(&self, piece_id: &str, stage: Stage, content: &str) -> Result<(), AppError> {
        api::projects::upsert_note(&self.gateway, piece_id, stage, content).await
    }

    async fn delete_piece(&self, piece_id: &str) -> Result<(), AppError> {
        api::projects::delete(&self.gateway, piece_id).await
    }

    async fn attach_photo(
        &self,
        target: PhotoTarget,
        owner_id: &str,
        upload: &ImageUpload,
    ) -> Result<Photo, AppError> {
        match target {
            PhotoTarget::Piece => {
                api::projects::add_photo(&self.gateway, owner_id, upload, None).await
            }
            PhotoTarget::GlazeTile => {
                api::glazes::add_tile(&self.gateway, owner_id, upload, None, None).await
            }
        }
    }

    async fn detach_photo(&self, target: PhotoTarget, photo: &Photo) -> Result<(), AppError> {
        match target {
            PhotoTarget::Piece => api::projects::delete_photo(&self.gateway, photo).await,
            PhotoTarget::GlazeTile => api::glazes::delete_tile(&self.gateway, photo).await,
        }
    }

    async fn create_glaze(&self, glaze: Glaze) -> Result<Glaze, AppError> {
        api::glazes::create(&self.gateway, &glaze).await
    }

    async fn update_glaze(&self, glaze_id: &str, changes: &GlazeUpdate) -> Result<(), AppError> {
        api::glazes::update(&self.gateway, glaze_id, changes).await
    }

    async fn delete_glaze(&self, glaze_id: &str) -> Result<(), AppError> {
        api::glazes::delete(&self.gateway, glaze_id).await
    }

    async fn create_batch(&self, batch: ReclaimBatch) -> Result<ReclaimBatch, AppError> {
        api::reclaim::create(&self.gateway, &batch).await
    }

    async fn update_batch(&self, batch: &ReclaimBatch) -> Result<(), AppError> {
        api::reclaim::update(&self.gateway, batch).await
    }

    async fn update_batch_status(&self, batch_id: &str, status: ReclaimStatus) -> Result<(), AppError> {
        api::reclaim::update_status(&self.gateway, batch_id, status).await
    }

    async fn delete_batch(&self, batch_id: &str) -> Result<(), AppError> {
        api::reclaim::delete(&self.gateway, batch_id).await
    }

    async fn invite_code_exists(&self, code: &str, _known: &[Guild]) -> Result<bool, AppError> {
        self.policy
            .run("invite code lookup", || {
                api::guilds::invite_code_exists(&self.gateway, code)
            })
            .await
    }

    async fn create_guild(&self, guild: Guild) -> Result<Guild, AppError> {
        api::guilds::create(&self.gateway, &guild).await
    }

    async fn update_guild(
        &self,
        guild_id: &str,
        name: &str,
        location: &str,
        description: &str,
    ) -> Result<(), AppError> {
        api::guilds::update(&self.gateway, guild_id, name, description, location).await
    }

    async fn join_guild(&self, guild_id: &str, _known: &[Guild], _username: &str) -> Result<Guild, AppError> {
        api::guilds::join(&self.gateway, guild_id).await?;
        self.policy
            .run("guild", || api::guilds::get(&self.gateway, guild_id))
            .await
    }

    async fn join_guild_by_code(
        &self,
        code: &str,
        _known: &[Guild],
        _username: &str,
    ) -> Result<Guild, AppError> {
        let guild_id = api::guilds::join_by_code(&self.gateway, code).await?;
        self.policy
            .run("guild", || api::guilds::get(&self.gateway, &guild_id))
            .await
    }

    async fn leave_guild(&self, guild_id: &str) -> Result<(), AppError> {
        api::guilds::leave(&self.gateway, guild_id).await
    }

    async fn create_post(&self, guild_id: &str, post: Post) -> Result<Post, AppError> {
        api::guilds::create_post(&self.gateway, guild_id, &post.content, &post.author).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), AppError> {
        api::guilds::delete_post(&self.gateway, post_id).await
    }

    async fn add_resource(&self, guild_id: &str, resource: Resource) -> Result<Resource, AppError> {
        api::guilds::add_resource(&self.gateway, guild_id, &resource).await
    }

    async fn delete_resource(&self, resource_id: &str) -> Result<(), AppError> {
        api::guilds::delete_resource(&self.gateway, resource_id).await
    }

    async fn create_event(&self, guild_id: &str, event: &NewEvent) -> Result<String, AppError> {
        api::guilds::create_event(&self.gateway, guild_id, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn remote() -> RemoteBackend {
        let gateway = Gateway::new(&BackendConfig {
            url: "http://127.0.0.1:9".into(),
            anon_key: "anon".into(),
        })
        .unwrap();
        RemoteBackend::new(gateway, LocalStore::in_memory().unwrap(), RetryPolicy::default())
    }

    #[test]
    fn test_modes() {
        let local = LocalBackend::new(LocalStore::in_memory().unwrap());
        assert_eq!(local.sync_mode(), SyncMode::Offline);
        assert_eq!(remote().sync_mode(), SyncMode::SignedOut);
    }

    #[test]
    fn test_remote_never_writes_local_store() {
        let backend = remote();
        backend.save(StoreKey::Glazes, &vec!["x"]);
        assert!(!backend.local().contains(StoreKey::Glazes));
    }

    #[tokio::test]
    async fn test_remote_writes_need_identity() {
        let backend = remote();
        let result = backend
            .create_piece(Piece::new("Bowl".into(), "Porcelain".into()))
            .await;
        assert!(matches!(result, Err(AppError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_local_photo_is_data_url() {
        let backend = LocalBackend::new(LocalStore::in_memory().unwrap());
        let upload = ImageUpload::new("tile.png", "image/png", vec![1, 2, 3]);
        let photo = backend
            .attach_photo(PhotoTarget::GlazeTile, "g1", &upload)
            .await
            .unwrap();
        assert!(photo.url.starts_with("data:image/png;base64,"));
        assert_eq!(photo.storage_path, None);

        let not_image = ImageUpload::new("notes.txt", "text/plain", vec![1]);
        let err = backend
            .attach_photo(PhotoTarget::Piece, "p1", &not_image)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Please select an image file");
    }
}
