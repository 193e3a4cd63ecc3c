pub mod glaze;
pub mod guild;
pub mod photo;
pub mod piece;
pub mod profile;
pub mod reclaim;
pub mod stage;
pub mod tip;

pub use glaze::Glaze;
pub use guild::{generate_invite_code, normalize_invite_code, Guild, Post, Resource, ResourceType};
pub use photo::Photo;
pub use piece::Piece;
pub use profile::{Profile, ProfileUpdate, Units};
pub use reclaim::{total_reclaimed, ReclaimBatch, ReclaimStatus};
pub use stage::Stage;
pub use tip::{default_tips, StudioTip, TipCategory};
