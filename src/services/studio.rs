//! In-memory studio state
//!
//! [`Studio`] owns every collection the front end shows. Each operation
//! persists through the backend first and only then changes memory, so a
//! failed call leaves the previous state in place. After a change the whole
//! collection goes through the backend's save effect.

use crate::api::glazes::GlazeUpdate;
use crate::api::guilds::NewEvent;
use crate::error::AppError;
use crate::models::{
    default_tips, normalize_invite_code, total_reclaimed, Glaze, Guild, Piece, Post,
    ReclaimBatch, ReclaimStatus, Resource, ResourceType, Stage, StudioTip, TipCategory,
};
use crate::services::persistence::{Persistence, PhotoTarget};
use crate::services::sync::{LoadSource, Synchronizer};
use crate::storage::StoreKey;
use kiln_media::ImageUpload;
use std::collections::HashMap;

const INVITE_CODE_ATTEMPTS: usize = 5;

pub struct Studio<P: Persistence> {
    backend: P,
    sync: Synchronizer,
    username: String,
    pieces: Vec<Piece>,
    glazes: Vec<Glaze>,
    batches: Vec<ReclaimBatch>,
    tips: Vec<StudioTip>,
    guilds: Vec<Guild>,
    sources: HashMap<StoreKey, LoadSource>,
}

impl<P: Persistence> Studio<P> {
    pub fn new(backend: P, sync: Synchronizer) -> Self {
        Self {
            backend,
            sync,
            username: "Potter".to_string(),
            pieces: Vec::new(),
            glazes: Vec::new(),
            batches: Vec::new(),
            tips: Vec::new(),
            guilds: Vec::new(),
            sources: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut P {
        &mut self.backend
    }

    /// Name used for guild posts and memberships
    pub fn set_username(&mut self, username: &str) {
        self.username = username.to_string();
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn glazes(&self) -> &[Glaze] {
        &self.glazes
    }

    pub fn batches(&self) -> &[ReclaimBatch] {
        &self.batches
    }

    pub fn tips(&self) -> &[StudioTip] {
        &self.tips
    }

    pub fn guilds(&self) -> &[Guild] {
        &self.guilds
    }

    pub fn piece(&self, id: &str) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id == id)
    }

    pub fn glaze(&self, id: &str) -> Option<&Glaze> {
        self.glazes.iter().find(|g| g.id == id)
    }

    pub fn guild(&self, id: &str) -> Option<&Guild> {
        self.guilds.iter().find(|g| g.id == id)
    }

    pub fn batch(&self, id: &str) -> Option<&ReclaimBatch> {
        self.batches.iter().find(|b| b.id == id)
    }

    /// Where the last refresh got a collection from
    pub fn source(&self, key: StoreKey) -> Option<LoadSource> {
        self.sources.get(&key).copied()
    }

    /// Reloads every collection for the backend's current mode
    pub async fn refresh(&mut self) {
        let mode = self.backend.sync_mode();
        let store = self.backend.local().clone();
        let backend = &self.backend;

        let pieces = self
            .sync
            .load(mode, &store, StoreKey::Projects, || backend.fetch_pieces())
            .await;
        let glazes = self
            .sync
            .load(mode, &store, StoreKey::Glazes, || backend.fetch_glazes())
            .await;
        let batches = self
            .sync
            .load(mode, &store, StoreKey::ReclaimBatches, || backend.fetch_batches())
            .await;
        let guilds = self
            .sync
            .load(mode, &store, StoreKey::Guilds, || backend.fetch_guilds())
            .await;

        self.sources.insert(StoreKey::Projects, pieces.source);
        self.sources.insert(StoreKey::Glazes, glazes.source);
        self.sources.insert(StoreKey::ReclaimBatches, batches.source);
        self.sources.insert(StoreKey::Guilds, guilds.source);

        self.pieces = pieces.items;
        self.glazes = glazes.items;
        self.batches = batches.items;
        self.guilds = guilds.items;
        self.tips = store.get_or_else(StoreKey::StudioTips, default_tips);

        log::info!(
            "Studio loaded ({:?}): {} pieces, {} glazes, {} batches, {} guilds",
            mode,
            self.pieces.len(),
            self.glazes.len(),
            self.batches.len(),
            self.guilds.len()
        );
    }

    fn piece_index(&self, id: &str) -> Result<usize, AppError> {
        self.pieces
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Piece {}", id)))
    }

    fn glaze_index(&self, id: &str) -> Result<usize, AppError> {
        self.glazes
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Glaze {}", id)))
    }

    fn batch_index(&self, id: &str) -> Result<usize, AppError> {
        self.batches
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", id)))
    }

    fn guild_index(&self, id: &str) -> Result<usize, AppError> {
        self.guilds
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Guild {}", id)))
    }

    fn save_pieces(&self) {
        self.backend.save(StoreKey::Projects, &self.pieces);
    }

    fn save_glazes(&self) {
        self.backend.save(StoreKey::Glazes, &self.glazes);
    }

    fn save_batches(&self) {
        self.backend.save(StoreKey::ReclaimBatches, &self.batches);
    }

    fn save_guilds(&self) {
        self.backend.save(StoreKey::Guilds, &self.guilds);
    }

    // ----- pieces -----

    pub async fn create_piece(&mut self, title: &str, clay: &str) -> Result<&Piece, AppError> {
        let piece = Piece::new(title.trim().to_string(), clay.trim().to_string());
        piece.validate()?;

        let stored = self.backend.create_piece(piece).await?;
        self.pieces.insert(0, stored);
        self.save_pieces();
        Ok(&self.pieces[0])
    }

    /// Re-reads a piece from the backend before showing its detail
    pub async fn open_piece(&mut self, id: &str) -> Result<&Piece, AppError> {
        let idx = self.piece_index(id)?;
        if let Some(fresh) = self.backend.fetch_piece(id).await? {
            self.pieces[idx] = fresh;
        }
        Ok(&self.pieces[idx])
    }

    pub async fn edit_piece(&mut self, id: &str, title: &str, clay: &str) -> Result<(), AppError> {
        let idx = self.piece_index(id)?;
        let mut piece = self.pieces[idx].clone();
        piece.title = title.trim().to_string();
        piece.clay = clay.trim().to_string();
        piece.validate()?;

        self.backend
            .update_piece(id, &piece.title, &piece.clay)
            .await?;
        self.pieces[idx] = piece;
        self.save_pieces();
        Ok(())
    }

    /// Links glazes from the library, plus an optional free-text glaze
    pub async fn set_piece_glazes(
        &mut self,
        id: &str,
        glaze_ids: Vec<String>,
        custom_glaze: Option<String>,
    ) -> Result<(), AppError> {
        let idx = self.piece_index(id)?;
        let mut linked: Vec<String> = Vec::with_capacity(glaze_ids.len());
        for glaze_id in glaze_ids {
            if self.glaze(&glaze_id).is_none() {
                return Err(AppError::NotFound(format!("Glaze {}", glaze_id)));
            }
            if !linked.contains(&glaze_id) {
                linked.push(glaze_id);
            }
        }
        let custom_glaze = custom_glaze
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        self.backend
            .update_piece_glazes(id, &linked, custom_glaze.as_deref())
            .await?;
        let piece = &mut self.pieces[idx];
        piece.glaze_ids = linked;
        piece.custom_glaze = custom_glaze;
        self.save_pieces();
        Ok(())
    }

    /// Moves the piece to the following stage and returns it. A complete
    /// piece cannot be advanced.
    pub async fn advance_piece(&mut self, id: &str) -> Result<Stage, AppError> {
        let idx = self.piece_index(id)?;
        let current = self.pieces[idx].stage;
        let next = current.next().ok_or_else(|| {
            AppError::Validation(format!("{} is already complete", self.pieces[idx].title))
        })?;

        self.backend.update_stage(id, next).await?;
        self.pieces[idx].stage = next;
        self.save_pieces();
        log::debug!("Piece {} advanced {} -> {}", id, current, next);
        Ok(next)
    }

    /// Writes the note of one stage; other stages keep their notes
    pub async fn set_stage_note(&mut self, id: &str, stage: Stage, content: &str) -> Result<(), AppError> {
        let idx = self.piece_index(id)?;
        self.backend.save_note(id, stage, content).await?;
        self.pieces[idx].set_note(stage, content.to_string());
        self.save_pieces();
        Ok(())
    }

    pub fn stage_note(&self, id: &str, stage: Stage) -> Option<&str> {
        self.piece(id).map(|p| p.note(stage))
    }

    pub async fn delete_piece(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self.piece_index(id)?;
        self.backend.delete_piece(id).await?;
        self.pieces.remove(idx);
        self.save_pieces();
        Ok(())
    }

    pub async fn add_piece_photo(&mut self, id: &str, upload: &ImageUpload) -> Result<(), AppError> {
        let idx = self.piece_index(id)?;
        let photo = self
            .backend
            .attach_photo(PhotoTarget::Piece, id, upload)
            .await?;
        self.pieces[idx].photos.push(photo);
        self.save_pieces();
        Ok(())
    }

    pub async fn remove_piece_photo(&mut self, id: &str, photo_id: &str) -> Result<(), AppError> {
        let idx = self.piece_index(id)?;
        let pos = self.pieces[idx]
            .photos
            .iter()
            .position(|p| p.id == photo_id)
            .ok_or_else(|| AppError::NotFound(format!("Photo {}", photo_id)))?;

        let photo = self.pieces[idx].photos[pos].clone();
        self.backend.detach_photo(PhotoTarget::Piece, &photo).await?;
        self.pieces[idx].photos.remove(pos);
        self.save_pieces();
        Ok(())
    }

    // ----- glazes -----

    pub async fn create_glaze(
        &mut self,
        name: &str,
        firing_type: &str,
        recipe: &str,
    ) -> Result<&Glaze, AppError> {
        let glaze = Glaze::new(
            name.trim().to_string(),
            firing_type.trim().to_string(),
            recipe.to_string(),
        );
        glaze.validate()?;

        let stored = self.backend.create_glaze(glaze).await?;
        self.glazes.insert(0, stored);
        self.save_glazes();
        Ok(&self.glazes[0])
    }

    pub async fn open_glaze(&mut self, id: &str) -> Result<&Glaze, AppError> {
        let idx = self.glaze_index(id)?;
        if let Some(fresh) = self.backend.fetch_glaze(id).await? {
            self.glazes[idx] = fresh;
        }
        Ok(&self.glazes[idx])
    }

    /// The user's own glazes, without public ones shared by others
    pub async fn own_glazes(&self) -> Result<Vec<Glaze>, AppError> {
        Ok(match self.backend.fetch_own_glazes().await? {
            Some(glazes) => glazes,
            None => self.glazes.clone(),
        })
    }

    pub async fn update_glaze_recipe(&mut self, id: &str, recipe: &str) -> Result<(), AppError> {
        let idx = self.glaze_index(id)?;
        let changes = GlazeUpdate {
            recipe: Some(recipe.to_string()),
            ..GlazeUpdate::default()
        };
        self.backend.update_glaze(id, &changes).await?;
        self.glazes[idx].recipe = recipe.to_string();
        self.save_glazes();
        Ok(())
    }

    pub async fn update_glaze_notes(&mut self, id: &str, notes: &str) -> Result<(), AppError> {
        let idx = self.glaze_index(id)?;
        let changes = GlazeUpdate {
            notes: Some(notes.to_string()),
            ..GlazeUpdate::default()
        };
        self.backend.update_glaze(id, &changes).await?;
        self.glazes[idx].notes = notes.to_string();
        self.save_glazes();
        Ok(())
    }

    pub async fn delete_glaze(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self.glaze_index(id)?;
        self.backend.delete_glaze(id).await?;
        self.glazes.remove(idx);
        self.save_glazes();
        Ok(())
    }

    pub async fn add_glaze_tile(&mut self, id: &str, upload: &ImageUpload) -> Result<(), AppError> {
        let idx = self.glaze_index(id)?;
        let tile = self
            .backend
            .attach_photo(PhotoTarget::GlazeTile, id, upload)
            .await?;
        self.glazes[idx].tiles.push(tile);
        self.save_glazes();
        Ok(())
    }

    pub async fn remove_glaze_tile(&mut self, id: &str, tile_id: &str) -> Result<(), AppError> {
        let idx = self.glaze_index(id)?;
        let pos = self.glazes[idx]
            .tiles
            .iter()
            .position(|t| t.id == tile_id)
            .ok_or_else(|| AppError::NotFound(format!("Tile {}", tile_id)))?;

        let tile = self.glazes[idx].tiles[pos].clone();
        self.backend
            .detach_photo(PhotoTarget::GlazeTile, &tile)
            .await?;
        self.glazes[idx].tiles.remove(pos);
        self.save_glazes();
        Ok(())
    }

    // ----- reclaim -----

    pub async fn create_batch(
        &mut self,
        source: &str,
        weight: Option<f64>,
        notes: &str,
    ) -> Result<&ReclaimBatch, AppError> {
        let batch = ReclaimBatch::new(source.trim().to_string(), weight, notes.to_string());
        batch.validate()?;

        let stored = self.backend.create_batch(batch).await?;
        self.batches.insert(0, stored);
        self.save_batches();
        Ok(&self.batches[0])
    }

    /// Replaces a batch wholesale (detail edits of weight, source or notes)
    pub async fn update_batch(&mut self, batch: ReclaimBatch) -> Result<(), AppError> {
        batch.validate()?;
        let idx = self.batch_index(&batch.id)?;
        self.backend.update_batch(&batch).await?;
        self.batches[idx] = batch;
        self.save_batches();
        Ok(())
    }

    pub async fn open_batch(&mut self, id: &str) -> Result<&ReclaimBatch, AppError> {
        let idx = self.batch_index(id)?;
        if let Some(fresh) = self.backend.fetch_batch(id).await? {
            self.batches[idx] = fresh;
        }
        Ok(&self.batches[idx])
    }

    /// Status can be set to any value, in any order
    pub async fn set_batch_status(&mut self, id: &str, status: ReclaimStatus) -> Result<(), AppError> {
        let idx = self.batch_index(id)?;
        self.backend.update_batch_status(id, status).await?;
        self.batches[idx].status = status;
        self.save_batches();
        Ok(())
    }

    pub async fn delete_batch(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self.batch_index(id)?;
        self.backend.delete_batch(id).await?;
        self.batches.remove(idx);
        self.save_batches();
        Ok(())
    }

    pub fn total_reclaimed(&self) -> f64 {
        total_reclaimed(&self.batches)
    }

    /// Total as summed by the backend; the loaded batches are summed when
    /// there is none or it cannot be reached
    pub async fn stored_total_reclaimed(&self) -> f64 {
        match self.backend.total_reclaimed().await {
            Ok(Some(total)) => total,
            Ok(None) => self.total_reclaimed(),
            Err(e) => {
                log::warn!("Reclaim total unavailable, summing loaded batches: {}", e);
                self.total_reclaimed()
            }
        }
    }

    // ----- tips -----

    /// Appends a tip; tips are always kept in the local store
    pub fn add_tip(
        &mut self,
        category: TipCategory,
        title: &str,
        content: &str,
        tags: Vec<String>,
    ) -> Result<&StudioTip, AppError> {
        let tip = StudioTip::new(category, title.trim().to_string(), content.to_string(), tags);
        tip.validate()?;

        self.tips.push(tip);
        self.backend.local().set(StoreKey::StudioTips, &self.tips);
        Ok(&self.tips[self.tips.len() - 1])
    }

    pub fn tips_in(&self, category: TipCategory) -> Vec<&StudioTip> {
        self.tips.iter().filter(|t| t.category == category).collect()
    }

    // ----- guilds -----

    pub async fn create_guild(
        &mut self,
        name: &str,
        location: &str,
        description: &str,
    ) -> Result<&Guild, AppError> {
        let mut guild = Guild::new(
            name.trim().to_string(),
            location.trim().to_string(),
            description.trim().to_string(),
            &self.username,
        );
        guild.validate()?;

        let mut attempts = 1;
        while self
            .backend
            .invite_code_exists(&guild.invite_code, &self.guilds)
            .await?
        {
            if attempts >= INVITE_CODE_ATTEMPTS {
                return Err(AppError::Validation(
                    "Could not generate a unique invite code".to_string(),
                ));
            }
            log::debug!("Invite code {} taken, regenerating", guild.invite_code);
            guild.invite_code = crate::models::generate_invite_code();
            attempts += 1;
        }

        let stored = self.backend.create_guild(guild).await?;
        self.guilds.insert(0, stored);
        self.save_guilds();
        Ok(&self.guilds[0])
    }

    /// Joins the guild using `code`. Unknown codes and existing memberships
    /// are rejected without changing anything.
    pub async fn join_guild_by_code(&mut self, code: &str) -> Result<&Guild, AppError> {
        let code = normalize_invite_code(code);
        if code.is_empty() {
            return Err(AppError::Validation("Invalid invite code".to_string()));
        }
        if self
            .guilds
            .iter()
            .any(|g| g.invite_code == code && g.is_member)
        {
            return Err(AppError::Validation("Already a member".to_string()));
        }

        let joined = self
            .backend
            .join_guild_by_code(&code, &self.guilds, &self.username)
            .await?;
        Ok(self.store_joined(joined))
    }

    /// Joins a guild picked from discovery
    pub async fn join_guild(&mut self, id: &str) -> Result<&Guild, AppError> {
        if self.guild(id).is_some_and(|g| g.is_member) {
            return Err(AppError::Validation("Already a member".to_string()));
        }

        let joined = self
            .backend
            .join_guild(id, &self.guilds, &self.username)
            .await?;
        Ok(self.store_joined(joined))
    }

    fn store_joined(&mut self, joined: Guild) -> &Guild {
        let idx = match self.guilds.iter().position(|g| g.id == joined.id) {
            Some(idx) => {
                self.guilds[idx] = joined;
                idx
            }
            None => {
                self.guilds.insert(0, joined);
                0
            }
        };
        self.save_guilds();
        log::info!("Joined guild {}", self.guilds[idx].name);
        &self.guilds[idx]
    }

    /// Every guild, marked with the caller's membership
    pub async fn discover_guilds(&self) -> Result<Vec<Guild>, AppError> {
        let Some(mut all) = self.backend.discover_guilds().await? else {
            return Ok(self.guilds.clone());
        };
        for guild in &mut all {
            if let Some(known) = self.guild(&guild.id) {
                guild.is_member = known.is_member;
                guild.is_admin = known.is_admin;
            }
        }
        Ok(all)
    }

    /// Loads members, posts, resources and events of a guild
    pub async fn open_guild(&mut self, id: &str) -> Result<&Guild, AppError> {
        let idx = self.guild_index(id)?;
        if let Some(fresh) = self.backend.fetch_guild(id).await? {
            self.guilds[idx] = fresh;
        }
        Ok(&self.guilds[idx])
    }

    /// Renames or re-describes a guild; admins only
    pub async fn update_guild(
        &mut self,
        id: &str,
        name: &str,
        location: &str,
        description: &str,
    ) -> Result<(), AppError> {
        let idx = self.guild_index(id)?;
        if !self.guilds[idx].is_admin {
            return Err(AppError::Validation(
                "Only guild admins can edit the guild".to_string(),
            ));
        }

        let mut guild = self.guilds[idx].clone();
        guild.name = name.trim().to_string();
        guild.location = location.trim().to_string();
        guild.description = description.trim().to_string();
        guild.validate()?;

        self.backend
            .update_guild(id, &guild.name, &guild.location, &guild.description)
            .await?;
        self.guilds[idx] = guild;
        self.save_guilds();
        Ok(())
    }

    pub async fn leave_guild(&mut self, id: &str) -> Result<(), AppError> {
        let idx = self.guild_index(id)?;
        if !self.guilds[idx].is_member {
            return Err(AppError::Validation("Not a member".to_string()));
        }

        self.backend.leave_guild(id).await?;
        let username = self.username.clone();
        self.guilds[idx].leave(&username)?;
        self.save_guilds();
        Ok(())
    }

    /// Posts to the guild feed; the post shows first
    pub async fn post_to_guild(&mut self, id: &str, content: &str) -> Result<&Post, AppError> {
        let idx = self.guild_index(id)?;
        if content.trim().is_empty() {
            return Err(AppError::Validation("Post must not be empty".to_string()));
        }

        let post = Post::new(self.username.clone(), content.trim().to_string());
        let stored = self.backend.create_post(id, post).await?;
        self.guilds[idx].add_post(stored);
        self.save_guilds();
        Ok(&self.guilds[idx].posts[0])
    }

    /// Removes a post; only its author or a guild admin may
    pub async fn delete_guild_post(&mut self, id: &str, post_id: &str) -> Result<(), AppError> {
        let idx = self.guild_index(id)?;
        let guild = &self.guilds[idx];
        let pos = guild
            .posts
            .iter()
            .position(|p| p.id == post_id)
            .ok_or_else(|| AppError::NotFound(format!("Post {}", post_id)))?;
        if guild.posts[pos].author != self.username && !guild.is_admin {
            return Err(AppError::Validation(
                "Only the author or a guild admin can remove a post".to_string(),
            ));
        }

        self.backend.delete_post(post_id).await?;
        self.guilds[idx].posts.remove(pos);
        self.save_guilds();
        Ok(())
    }

    pub async fn add_guild_resource(
        &mut self,
        id: &str,
        title: &str,
        kind: ResourceType,
        url: Option<String>,
    ) -> Result<&Resource, AppError> {
        let idx = self.guild_index(id)?;
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }

        let resource = Resource::new(title.trim().to_string(), kind, self.username.clone(), url);
        let stored = self.backend.add_resource(id, resource).await?;
        self.guilds[idx].add_resource(stored);
        self.save_guilds();

        let resources = &self.guilds[idx].resources;
        Ok(&resources[resources.len() - 1])
    }

    /// Removes a shared resource; only whoever added it or a guild admin may
    pub async fn delete_guild_resource(&mut self, id: &str, resource_id: &str) -> Result<(), AppError> {
        let idx = self.guild_index(id)?;
        let guild = &self.guilds[idx];
        let pos = guild
            .resources
            .iter()
            .position(|r| r.id == resource_id)
            .ok_or_else(|| AppError::NotFound(format!("Resource {}", resource_id)))?;
        if guild.resources[pos].added_by != self.username && !guild.is_admin {
            return Err(AppError::Validation(
                "Only whoever shared it or a guild admin can remove a resource".to_string(),
            ));
        }

        self.backend.delete_resource(resource_id).await?;
        self.guilds[idx].resources.remove(pos);
        self.save_guilds();
        Ok(())
    }

    /// Schedules the guild's next event and returns its label
    pub async fn schedule_event(&mut self, id: &str, event: NewEvent) -> Result<String, AppError> {
        let idx = self.guild_index(id)?;
        if !self.guilds[idx].is_member {
            return Err(AppError::Validation("Not a member".to_string()));
        }
        if event.title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }

        let label = self.backend.create_event(id, &event).await?;
        self.guilds[idx].event = Some(label.clone());
        self.save_guilds();
        Ok(label)
    }
}
