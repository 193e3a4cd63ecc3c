mod commands;
mod handlers;

pub use commands::{
    Cli, Commands, GlazesAction, GlazesCommand, GuildsAction, GuildsCommand, PiecesAction,
    PiecesCommand, ProfileArgs, ReclaimAction, ReclaimCommand, TipsAction, TipsCommand,
};
pub use handlers::{
    handle_glazes, handle_guilds, handle_login, handle_logout, handle_pieces, handle_profile,
    handle_reclaim, handle_signup, handle_tips, handle_whoami, run,
};
