use super::{CountRow, Gateway};
use crate::error::AppError;
use crate::models::{normalize_invite_code, Guild, Post, Resource, ResourceType};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

const DETAIL_SELECT: &str = "*,
    members:guild_memberships(
        role,
        profile:profiles(id, username, avatar_url)
    ),
    posts:guild_posts(
        *,
        author:profiles(id, username, avatar_url)
    ),
    resources:guild_resources(
        *,
        added_by_profile:profiles(username)
    ),
    events:guild_events(*)";

const MINE_SELECT: &str = "role,
    guild:guilds(
        *,
        member_count:guild_memberships(count),
        upcoming_event:guild_events(title, event_date)
    )";

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberRow {
    pub role: String,
    #[serde(default)]
    pub profile: Option<ProfileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRow {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<ProfileRef>,
}

impl PostRow {
    fn into_post(self, fallback_author: &str) -> Post {
        Post {
            id: self.id,
            author: self
                .author
                .and_then(|a| a.username)
                .unwrap_or_else(|| fallback_author.to_string()),
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub added_by_profile: Option<ProfileRef>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Resource {
            id: row.id,
            title: row.title,
            kind: row
                .resource_type
                .as_deref()
                .and_then(ResourceType::parse)
                .unwrap_or(ResourceType::Link),
            added_by: row
                .added_by_profile
                .and_then(|p| p.username)
                .unwrap_or_else(|| "Unknown".to_string()),
            url: row.url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRow {
    pub title: String,
    #[serde(default)]
    pub event_date: Option<String>,
}

fn event_label(title: &str, date: Option<&str>) -> String {
    match date {
        Some(date) => format!("{} - {}", title, date),
        None => title.to_string(),
    }
}

impl EventRow {
    fn label(&self) -> String {
        event_label(&self.title, self.event_date.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub invite_code: Option<String>,
    #[serde(default)]
    pub member_count: Vec<CountRow>,
    #[serde(default)]
    pub upcoming_event: Vec<EventRow>,
    #[serde(default)]
    pub members: Vec<MemberRow>,
    #[serde(default)]
    pub posts: Vec<PostRow>,
    #[serde(default)]
    pub resources: Vec<ResourceRow>,
    #[serde(default)]
    pub events: Vec<EventRow>,
}

fn is_admin_role(role: &str) -> bool {
    role == "admin" || role == "owner"
}

impl GuildRow {
    /// Converts the row, working out membership for `user_id`
    pub fn into_guild(self, user_id: Option<&str>) -> Guild {
        let mine = user_id.and_then(|uid| {
            self.members
                .iter()
                .find(|m| m.profile.as_ref().and_then(|p| p.id.as_deref()) == Some(uid))
        });
        let is_member = mine.is_some();
        let is_admin = mine.map(|m| is_admin_role(&m.role)).unwrap_or(false);

        let members = self
            .member_count
            .first()
            .map(|c| c.count)
            .unwrap_or(self.members.len() as u32);
        let member_list = self
            .members
            .iter()
            .filter_map(|m| m.profile.as_ref().and_then(|p| p.username.clone()))
            .collect();

        let mut posts: Vec<Post> = self
            .posts
            .into_iter()
            .map(|p| p.into_post("Unknown"))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let event = self
            .events
            .first()
            .or(self.upcoming_event.first())
            .map(EventRow::label);

        Guild {
            id: self.id,
            name: self.name,
            location: self.location.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            members,
            member_list,
            is_member,
            is_admin,
            invite_code: self.invite_code.unwrap_or_default(),
            posts,
            resources: self.resources.into_iter().map(Resource::from).collect(),
            event,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MembershipRow {
    role: String,
    guild: GuildRow,
}

#[derive(Debug, Clone, Deserialize)]
struct IdRow {
    id: String,
}

/// Every guild, by name, for discovery
pub async fn list_all(gw: &Gateway) -> Result<Vec<Guild>, AppError> {
    let rows: Vec<GuildRow> = gw
        .rest()
        .from("guilds")
        .select("*, member_count:guild_memberships(count)")
        .order("name", true)
        .fetch()
        .await?;
    Ok(rows.into_iter().map(|r| r.into_guild(None)).collect())
}

/// Guilds the caller belongs to, most recently joined first
pub async fn list_mine(gw: &Gateway) -> Result<Vec<Guild>, AppError> {
    let user_id = gw.user_id()?;
    let rows: Vec<MembershipRow> = gw
        .rest()
        .from("guild_memberships")
        .select(MINE_SELECT)
        .eq("user_id", user_id)
        .order("joined_at", false)
        .fetch()
        .await?;

    Ok(rows
        .into_iter()
        .map(|m| {
            let mut guild = m.guild.into_guild(None);
            guild.is_member = true;
            guild.is_admin = is_admin_role(&m.role);
            guild
        })
        .collect())
}

/// Full guild with members, posts, resources and events
pub async fn get(gw: &Gateway, id: &str) -> Result<Guild, AppError> {
    let row: GuildRow = gw
        .rest()
        .from("guilds")
        .select(DETAIL_SELECT)
        .eq("id", id)
        .single()
        .await?;
    Ok(row.into_guild(gw.user_id().ok()))
}

/// Stores a new guild and makes the caller its owner
pub async fn create(gw: &Gateway, guild: &Guild) -> Result<Guild, AppError> {
    let user_id = gw.user_id()?;
    let row: GuildRow = gw
        .rest()
        .from("guilds")
        .insert(&json!({
            "name": guild.name,
            "description": guild.description,
            "location": guild.location,
            "invite_code": guild.invite_code,
            "created_by": user_id,
        }))
        .await?;

    let owner: Result<serde_json::Value, AppError> = gw
        .rest()
        .from("guild_memberships")
        .insert(&json!({
            "guild_id": row.id,
            "user_id": user_id,
            "role": "owner",
        }))
        .await;
    if let Err(e) = owner {
        log::error!("Owner membership for guild {} failed: {}", row.id, e);
        if let Err(cleanup) = gw.rest().from("guilds").eq("id", &row.id).delete().await {
            log::error!("Could not remove ownerless guild {}: {}", row.id, cleanup);
        }
        return Err(e);
    }

    log::info!("Created guild {} ({})", row.id, guild.invite_code);
    let mut created = row.into_guild(None);
    created.members = 1;
    created.member_list = guild.member_list.clone();
    created.is_member = true;
    created.is_admin = true;
    Ok(created)
}

pub async fn update(
    gw: &Gateway,
    id: &str,
    name: &str,
    description: &str,
    location: &str,
) -> Result<(), AppError> {
    let _: serde_json::Value = gw
        .rest()
        .from("guilds")
        .eq("id", id)
        .update(&json!({
            "name": name,
            "description": description,
            "location": location,
        }))
        .await?;
    Ok(())
}

/// Id of the guild using `code`, if any
pub async fn find_by_code(gw: &Gateway, code: &str) -> Result<Option<String>, AppError> {
    let row: Option<IdRow> = gw
        .rest()
        .from("guilds")
        .select("id")
        .eq("invite_code", normalize_invite_code(code))
        .maybe_single()
        .await?;
    Ok(row.map(|r| r.id))
}

pub async fn invite_code_exists(gw: &Gateway, code: &str) -> Result<bool, AppError> {
    Ok(find_by_code(gw, code).await?.is_some())
}

/// Joins the guild behind `code` and returns its id
pub async fn join_by_code(gw: &Gateway, code: &str) -> Result<String, AppError> {
    let user_id = gw.user_id()?;
    let guild_id = find_by_code(gw, code)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid invite code".to_string()))?;

    let existing: Option<IdRow> = gw
        .rest()
        .from("guild_memberships")
        .select("id")
        .eq("guild_id", &guild_id)
        .eq("user_id", user_id)
        .maybe_single()
        .await?;
    if existing.is_some() {
        return Err(AppError::Validation("Already a member".to_string()));
    }

    join(gw, &guild_id).await?;
    Ok(guild_id)
}

pub async fn join(gw: &Gateway, guild_id: &str) -> Result<(), AppError> {
    let user_id = gw.user_id()?;
    let _: serde_json::Value = gw
        .rest()
        .from("guild_memberships")
        .insert(&json!({
            "guild_id": guild_id,
            "user_id": user_id,
            "role": "member",
        }))
        .await?;
    Ok(())
}

pub async fn leave(gw: &Gateway, guild_id: &str) -> Result<(), AppError> {
    let user_id = gw.user_id()?;
    gw.rest()
        .from("guild_memberships")
        .eq("guild_id", guild_id)
        .eq("user_id", user_id)
        .delete()
        .await
}

pub async fn create_post(
    gw: &Gateway,
    guild_id: &str,
    content: &str,
    author: &str,
) -> Result<Post, AppError> {
    let user_id = gw.user_id()?;
    let row: PostRow = gw
        .rest()
        .from("guild_posts")
        .select("*, author:profiles(id, username, avatar_url)")
        .insert(&json!({
            "guild_id": guild_id,
            "author_id": user_id,
            "content": content,
        }))
        .await?;
    Ok(row.into_post(author))
}

pub async fn delete_post(gw: &Gateway, post_id: &str) -> Result<(), AppError> {
    gw.rest().from("guild_posts").eq("id", post_id).delete().await
}

pub async fn add_resource(
    gw: &Gateway,
    guild_id: &str,
    resource: &Resource,
) -> Result<Resource, AppError> {
    let user_id = gw.user_id()?;
    let row: ResourceRow = gw
        .rest()
        .from("guild_resources")
        .insert(&json!({
            "guild_id": guild_id,
            "added_by": user_id,
            "title": resource.title,
            "resource_type": resource.kind.as_str(),
            "url": resource.url,
        }))
        .await?;

    let mut stored = Resource::from(row);
    stored.added_by = resource.added_by.clone();
    Ok(stored)
}

pub async fn delete_resource(gw: &Gateway, resource_id: &str) -> Result<(), AppError> {
    gw.rest()
        .from("guild_resources")
        .eq("id", resource_id)
        .delete()
        .await
}

#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
}

impl NewEvent {
    /// How the event shows on the guild card
    pub fn label(&self) -> String {
        event_label(&self.title, self.date.as_deref())
    }
}

/// Schedules an event and returns its display label
pub async fn create_event(gw: &Gateway, guild_id: &str, event: &NewEvent) -> Result<String, AppError> {
    let user_id = gw.user_id()?;
    let row: EventRow = gw
        .rest()
        .from("guild_events")
        .insert(&json!({
            "guild_id": guild_id,
            "created_by": user_id,
            "title": event.title,
            "description": event.description,
            "event_date": event.date,
            "location": event.location,
        }))
        .await?;
    Ok(row.label())
}
