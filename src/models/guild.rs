use crate::error::AppError;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const INVITE_CODE_LEN: usize = 8;
const INVITE_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random invite code of uppercase letters and digits
pub fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_CHARSET[rng.random_range(0..INVITE_CODE_CHARSET.len())] as char)
        .collect()
}

/// Codes are compared case-insensitively; this is the canonical form
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    /// Member count
    pub members: u32,
    #[serde(default)]
    pub member_list: Vec<String>,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_admin: bool,
    pub invite_code: String,
    /// Newest first
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub event: Option<String>,
}

impl Guild {
    /// New guild with `creator` as its only member and admin
    pub fn new(name: String, location: String, description: String, creator: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            location,
            description,
            members: 1,
            member_list: vec![creator.to_string()],
            is_member: true,
            is_admin: true,
            invite_code: generate_invite_code(),
            posts: Vec::new(),
            resources: Vec::new(),
            event: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Adds `username` as a member. Rejected without changes when already a member.
    pub fn join(&mut self, username: &str) -> Result<(), AppError> {
        if self.is_member {
            return Err(AppError::Validation("Already a member".to_string()));
        }
        self.members += 1;
        self.member_list.push(username.to_string());
        self.is_member = true;
        Ok(())
    }

    pub fn leave(&mut self, username: &str) -> Result<(), AppError> {
        if !self.is_member {
            return Err(AppError::Validation("Not a member".to_string()));
        }
        self.members = self.members.saturating_sub(1);
        if let Some(pos) = self.member_list.iter().position(|m| m == username) {
            self.member_list.remove(pos);
        }
        self.is_member = false;
        self.is_admin = false;
        Ok(())
    }

    pub fn add_post(&mut self, post: Post) {
        self.posts.insert(0, post);
    }

    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(author: String, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author,
            content,
            created_at: Utc::now(),
        }
    }

    /// Age of the post as shown in the feed ("Just now", "2 hours ago", ...)
    pub fn relative_time(&self, now: DateTime<Utc>) -> String {
        let elapsed = now.signed_duration_since(self.created_at);
        let minutes = elapsed.num_minutes();
        let hours = elapsed.num_hours();
        let days = elapsed.num_days();

        if minutes < 1 {
            "Just now".to_string()
        } else if hours < 1 {
            plural(minutes, "minute")
        } else if days < 1 {
            plural(hours, "hour")
        } else if days < 7 {
            plural(days, "day")
        } else {
            self.created_at.format("%Y-%m-%d").to_string()
        }
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceType {
    #[serde(rename = "PDF")]
    Pdf,
    Link,
    Video,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [ResourceType::Pdf, ResourceType::Link, ResourceType::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Pdf => "PDF",
            ResourceType::Link => "Link",
            ResourceType::Video => "Video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Some(ResourceType::Pdf),
            "link" => Some(ResourceType::Link),
            "video" => Some(ResourceType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub added_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Resource {
    pub fn new(title: String, kind: ResourceType, added_by: String, url: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            kind,
            added_by,
            url,
        }
    }
}
