use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Some(Units::Metric),
            "imperial" => Some(Units::Imperial),
            _ => None,
        }
    }
}

/// User profile. Remote rows carry extra columns which are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub bio: String,
    pub location: String,
    pub units: Units,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            username: "Potter".to_string(),
            email: String::new(),
            bio: String::new(),
            location: String::new(),
            units: Units::Metric,
            avatar_url: None,
        }
    }
}

/// Partial profile; only the fields that are set get applied
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<Units>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }

    /// `base` with every set field of this update applied
    pub fn merge(&self, base: &Profile) -> Profile {
        let mut merged = base.clone();
        if let Some(username) = &self.username {
            merged.username = username.clone();
        }
        if let Some(email) = &self.email {
            merged.email = email.clone();
        }
        if let Some(bio) = &self.bio {
            merged.bio = bio.clone();
        }
        if let Some(location) = &self.location {
            merged.location = location.clone();
        }
        if let Some(units) = self.units {
            merged.units = units;
        }
        if let Some(avatar_url) = &self.avatar_url {
            merged.avatar_url = Some(avatar_url.clone());
        }
        merged
    }
}
