use crate::error::AppError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TipCategory {
    ClayReclaim,
    DiyTools,
    PlasterBats,
    Other,
}

impl TipCategory {
    pub const ALL: [TipCategory; 4] = [
        TipCategory::ClayReclaim,
        TipCategory::DiyTools,
        TipCategory::PlasterBats,
        TipCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TipCategory::ClayReclaim => "clay_reclaim",
            TipCategory::DiyTools => "diy_tools",
            TipCategory::PlasterBats => "plaster_bats",
            TipCategory::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TipCategory::ClayReclaim => "Clay Reclaim",
            TipCategory::DiyTools => "DIY Tools",
            TipCategory::PlasterBats => "Plaster Bats",
            TipCategory::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        TipCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioTip {
    pub id: String,
    pub category: TipCategory,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StudioTip {
    pub fn new(category: TipCategory, title: String, content: String, tags: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            title,
            content,
            tags,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(AppError::Validation(
                "Title and content must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn tip(id: &str, category: TipCategory, title: &str, content: &str, tags: &[&str]) -> StudioTip {
    StudioTip {
        id: id.to_string(),
        category,
        title: title.to_string(),
        content: content.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Tips shipped with a fresh install
pub fn default_tips() -> Vec<StudioTip> {
    vec![
        tip(
            "1",
            TipCategory::ClayReclaim,
            "Clay Reclaim Process",
            "Collect scraps in a bucket, separate by clay type when possible. Add water to fully submerge, let slake for 24-48 hours. Pour onto plaster bats or canvas to dry to workable consistency. Wedge thoroughly before use.",
            &["Clay Reuse", "Water Conservation"],
        ),
        tip(
            "2",
            TipCategory::DiyTools,
            "Make Your Own Ribbon Tools",
            "Cut old hacksaw blades into 6-inch strips. Bend into loops and secure with wire or tape. File any sharp edges. Free tools that work as well as store-bought!",
            &["Cost Saving", "Recycling"],
        ),
        tip(
            "3",
            TipCategory::PlasterBats,
            "Casting Plaster Bats",
            "Use pottery #1 plaster, mix ratio 100 parts plaster to 70 parts water by weight. Pour into a level mold (bucket lids work great). Let set 45 minutes before removing. Cure for 2-3 days before first use.",
            &["Cost Saving", "Studio Setup"],
        ),
    ]
}
