//! Navigation and form state
//!
//! What is on screen is a [`Screen`]; an open create dialog is a [`Modal`]
//! carrying its form. Front ends match on these exhaustively.

use crate::models::guild::INVITE_CODE_LEN;
use crate::models::reclaim::validate_weight;
use crate::models::{ReclaimStatus, ResourceType, TipCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Pieces,
    Glazes,
    Reclaim,
    Tips,
    Guilds,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Pieces,
        Tab::Glazes,
        Tab::Reclaim,
        Tab::Tips,
        Tab::Guilds,
        Tab::Settings,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Pieces => "Pieces",
            Tab::Glazes => "Glazes",
            Tab::Reclaim => "Reclaim",
            Tab::Tips => "Tips",
            Tab::Guilds => "Guilds",
            Tab::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsView {
    Menu,
    Profile,
    Password,
    About,
}

/// Screen navigation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Pieces,
    PieceDetail(String),
    Glazes,
    GlazeDetail(String),
    Reclaim,
    Tips(Option<TipCategory>),
    Guilds,
    GuildDetail(String),
    Settings(SettingsView),
}

impl Screen {
    pub fn tab(&self) -> Tab {
        match self {
            Screen::Pieces | Screen::PieceDetail(_) => Tab::Pieces,
            Screen::Glazes | Screen::GlazeDetail(_) => Tab::Glazes,
            Screen::Reclaim => Tab::Reclaim,
            Screen::Tips(_) => Tab::Tips,
            Screen::Guilds | Screen::GuildDetail(_) => Tab::Guilds,
            Screen::Settings(_) => Tab::Settings,
        }
    }

    /// Top-level screen of a tab
    pub fn for_tab(tab: Tab) -> Self {
        match tab {
            Tab::Pieces => Screen::Pieces,
            Tab::Glazes => Screen::Glazes,
            Tab::Reclaim => Screen::Reclaim,
            Tab::Tips => Screen::Tips(None),
            Tab::Guilds => Screen::Guilds,
            Tab::Settings => Screen::Settings(SettingsView::Menu),
        }
    }

    /// Where the back button leads, `None` on a top-level screen
    pub fn back(&self) -> Option<Screen> {
        match self {
            Screen::PieceDetail(_) => Some(Screen::Pieces),
            Screen::GlazeDetail(_) => Some(Screen::Glazes),
            Screen::GuildDetail(_) => Some(Screen::Guilds),
            Screen::Tips(Some(_)) => Some(Screen::Tips(None)),
            Screen::Settings(SettingsView::Menu) => None,
            Screen::Settings(_) => Some(Screen::Settings(SettingsView::Menu)),
            Screen::Pieces | Screen::Glazes | Screen::Reclaim | Screen::Tips(None) | Screen::Guilds => {
                None
            }
        }
    }
}

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PieceForm {
    pub title: String,
    pub clay: String,
}

impl PieceForm {
    pub fn can_submit(&self) -> bool {
        filled(&self.title) && filled(&self.clay)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlazeForm {
    pub name: String,
    pub firing_type: String,
    pub recipe: String,
}

impl GlazeForm {
    pub fn can_submit(&self) -> bool {
        filled(&self.name) && filled(&self.firing_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchForm {
    pub source: String,
    /// Raw input; empty means not weighed
    pub weight: String,
    pub notes: String,
}

impl BatchForm {
    /// Parsed weight, `Ok(None)` when left empty
    pub fn weight(&self) -> Result<Option<f64>, String> {
        let raw = self.weight.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let weight: f64 = raw
            .parse()
            .map_err(|_| format!("'{}' is not a number", raw))?;
        validate_weight(Some(weight)).map_err(|e| e.user_message())?;
        Ok(Some(weight))
    }

    pub fn can_submit(&self) -> bool {
        filled(&self.source) && self.weight().is_ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatusForm {
    pub batch_id: String,
    pub status: ReclaimStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TipForm {
    pub category: TipCategory,
    pub title: String,
    pub content: String,
    /// Comma separated
    pub tags: String,
}

impl TipForm {
    pub fn tags(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn can_submit(&self) -> bool {
        filled(&self.title) && filled(&self.content)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuildForm {
    pub name: String,
    pub location: String,
    pub description: String,
}

impl GuildForm {
    pub fn can_submit(&self) -> bool {
        filled(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinForm {
    pub code: String,
}

impl JoinForm {
    pub fn can_submit(&self) -> bool {
        self.code.trim().chars().count() == INVITE_CODE_LEN
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostForm {
    pub guild_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceForm {
    pub guild_id: String,
    pub title: String,
    pub kind: ResourceType,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub username: String,
}

/// Open dialog with the form it edits
#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    NewPiece(PieceForm),
    NewGlaze(GlazeForm),
    NewBatch(BatchForm),
    BatchStatus(BatchStatusForm),
    NewTip(TipForm),
    NewGuild(GuildForm),
    JoinGuild(JoinForm),
    NewPost(PostForm),
    NewResource(ResourceForm),
    SignIn(SignInForm),
    SignUp(SignUpForm),
}

impl Modal {
    pub fn title(&self) -> &'static str {
        match self {
            Modal::NewPiece(_) => "New Piece",
            Modal::NewGlaze(_) => "New Glaze",
            Modal::NewBatch(_) => "New Reclaim Batch",
            Modal::BatchStatus(_) => "Update Status",
            Modal::NewTip(_) => "Share a Tip",
            Modal::NewGuild(_) => "Create Guild",
            Modal::JoinGuild(_) => "Join Guild",
            Modal::NewPost(_) => "New Post",
            Modal::NewResource(_) => "Add Resource",
            Modal::SignIn(_) => "Sign In",
            Modal::SignUp(_) => "Create Account",
        }
    }

    /// Required fields are present; the submit action stays disabled otherwise
    pub fn can_submit(&self) -> bool {
        match self {
            Modal::NewPiece(form) => form.can_submit(),
            Modal::NewGlaze(form) => form.can_submit(),
            Modal::NewBatch(form) => form.can_submit(),
            Modal::BatchStatus(form) => filled(&form.batch_id),
            Modal::NewTip(form) => form.can_submit(),
            Modal::NewGuild(form) => form.can_submit(),
            Modal::JoinGuild(form) => form.can_submit(),
            Modal::NewPost(form) => filled(&form.guild_id) && filled(&form.content),
            Modal::NewResource(form) => filled(&form.guild_id) && filled(&form.title),
            Modal::SignIn(form) => filled(&form.email) && !form.password.is_empty(),
            Modal::SignUp(form) => {
                filled(&form.email) && !form.password.is_empty() && filled(&form.username)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_navigation() {
        assert_eq!(
            Screen::PieceDetail("p1".into()).back(),
            Some(Screen::Pieces)
        );
        assert_eq!(
            Screen::Settings(SettingsView::Password).back(),
            Some(Screen::Settings(SettingsView::Menu))
        );
        assert_eq!(Screen::Settings(SettingsView::Menu).back(), None);
        assert_eq!(Screen::default().back(), None);
    }

    #[test]
    fn test_every_tab_roundtrips() {
        for tab in Tab::ALL {
            assert_eq!(Screen::for_tab(tab).tab(), tab);
        }
        assert_eq!(Screen::GuildDetail("g".into()).tab(), Tab::Guilds);
    }

    #[test]
    fn test_required_fields() {
        let mut piece = PieceForm {
            title: "Celadon Bowl".into(),
            clay: "  ".into(),
        };
        assert!(!Modal::NewPiece(piece.clone()).can_submit());
        piece.clay = "Porcelain".into();
        assert!(Modal::NewPiece(piece).can_submit());

        let glaze = GlazeForm {
            name: "Temmoku".into(),
            firing_type: "Cone 10".into(),
            recipe: String::new(),
        };
        assert!(Modal::NewGlaze(glaze).can_submit());

        assert!(!Modal::JoinGuild(JoinForm { code: "ABC".into() }).can_submit());
        assert!(Modal::JoinGuild(JoinForm { code: "wpg2026x".into() }).can_submit());
    }

    #[test]
    fn test_invite_code_length_counts_characters() {
        // 8 characters, 9 bytes
        assert!(JoinForm { code: "ÄBC2026X".into() }.can_submit());
        // 7 characters, 8 bytes
        assert!(!JoinForm { code: "ÄBC2026".into() }.can_submit());
        assert!(JoinForm { code: "  WPG2026X ".into() }.can_submit());
    }

    #[test]
    fn test_batch_weight_input() {
        let mut form = BatchForm {
            source: "Trimming scraps".into(),
            ..BatchForm::default()
        };
        assert_eq!(form.weight(), Ok(None));
        assert!(form.can_submit());

        form.weight = "2.5".into();
        assert_eq!(form.weight(), Ok(Some(2.5)));

        form.weight = "heavy".into();
        assert!(!form.can_submit());
        form.weight = "-1".into();
        assert!(!form.can_submit());
    }

    #[test]
    fn test_tip_tags_split() {
        let form = TipForm {
            category: TipCategory::DiyTools,
            title: "Ribs".into(),
            content: "Old cards".into(),
            tags: "Recycling, , Cost Saving".into(),
        };
        assert_eq!(form.tags(), vec!["Recycling".to_string(), "Cost Saving".to_string()]);
        assert!(form.can_submit());
    }
}
