use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "coastal-kiln")]
#[command(version, about = "Track pottery pieces, glazes, clay reclaim and guilds")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Ignore any configured backend and work from local data only
    #[arg(long, global = true)]
    pub offline: bool,

    /// Config file (defaults to coastal-kiln.toml or $COASTAL_KILN_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account
    Signup {
        email: String,

        #[arg(long, short = 'u')]
        username: String,

        #[arg(long, short = 'p')]
        password: String,
    },

    /// Sign in with email and password
    Login {
        email: String,

        #[arg(long, short = 'p')]
        password: String,
    },

    /// Sign out (offline: forget the local profile)
    Logout,

    /// Show the current identity and profile
    Whoami,

    /// Show or edit the profile
    Profile(ProfileArgs),

    /// Send a password reset mail
    ResetPassword { email: String },

    /// Set a new password for the signed-in account
    SetPassword {
        #[arg(long, short = 'p')]
        password: String,
    },

    /// Pieces moving through the studio
    Pieces(PiecesCommand),

    /// Glaze recipes and test tiles
    Glazes(GlazesCommand),

    /// Clay reclaim batches
    Reclaim(ReclaimCommand),

    /// Studio tips
    Tips(TipsCommand),

    /// Guild membership, posts and resources
    Guilds(GuildsCommand),
}

#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub bio: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// metric or imperial
    #[arg(long)]
    pub units: Option<String>,

    /// Image file to use as avatar
    #[arg(long, value_name = "FILE")]
    pub avatar: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PiecesCommand {
    #[command(subcommand)]
    pub action: PiecesAction,
}

#[derive(Subcommand, Debug)]
pub enum PiecesAction {
    /// List pieces, newest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Start a new piece at wedging
    Add {
        title: String,

        #[arg(long)]
        clay: String,
    },

    /// Show a piece with its stage notes
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Change title or clay body
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        clay: Option<String>,
    },

    /// Link glazes from the library, replacing earlier links
    Glazes {
        id: String,

        /// Glaze id or prefix (can be specified multiple times)
        #[arg(long = "glaze", short = 'g')]
        glazes: Vec<String>,

        /// Free-text glaze not in the library
        #[arg(long)]
        custom: Option<String>,
    },

    /// Move a piece to its next stage
    Advance { id: String },

    /// Write the note of one stage
    Note {
        id: String,

        /// Stage name (wedging, throwing, trimming, drying, bisque, glazing, firing, complete)
        stage: String,

        text: String,
    },

    /// Attach a photo
    Photo {
        id: String,

        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Remove a photo
    RemovePhoto { id: String, photo_id: String },

    Delete { id: String },
}

#[derive(Args, Debug)]
pub struct GlazesCommand {
    #[command(subcommand)]
    pub action: GlazesAction,
}

#[derive(Subcommand, Debug)]
pub enum GlazesAction {
    List {
        #[arg(long)]
        json: bool,

        /// Leave out public glazes shared by others
        #[arg(long)]
        mine: bool,
    },

    Add {
        name: String,

        /// Firing type, e.g. "Cone 10"
        #[arg(long = "type")]
        firing_type: String,

        #[arg(long, default_value = "")]
        recipe: String,
    },

    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Replace the recipe
    Recipe { id: String, recipe: String },

    /// Replace the notes
    Notes { id: String, notes: String },

    /// Attach a test tile photo
    Tile {
        id: String,

        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    RemoveTile { id: String, tile_id: String },

    Delete { id: String },
}

#[derive(Args, Debug)]
pub struct ReclaimCommand {
    #[command(subcommand)]
    pub action: ReclaimAction,
}

#[derive(Subcommand, Debug)]
pub enum ReclaimAction {
    List {
        #[arg(long)]
        json: bool,
    },

    /// Record a new batch
    Add {
        source: String,

        /// Weight in kg
        #[arg(long)]
        weight: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },

    Show { id: String },

    /// Set the status (drying, soaking, ready, wedging)
    Status { id: String, status: String },

    Delete { id: String },

    /// Total weight of all weighed batches
    Total,
}

#[derive(Args, Debug)]
pub struct TipsCommand {
    #[command(subcommand)]
    pub action: TipsAction,
}

#[derive(Subcommand, Debug)]
pub enum TipsAction {
    List {
        /// Only this category (clay_reclaim, diy_tools, plaster_bats, ...)
        #[arg(long)]
        category: Option<String>,
    },

    Add {
        category: String,
        title: String,
        content: String,

        /// Tags (can be specified multiple times)
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct GuildsCommand {
    #[command(subcommand)]
    pub action: GuildsAction,
}

#[derive(Subcommand, Debug)]
pub enum GuildsAction {
    List,

    /// Every guild, joined or not
    Discover,

    Create {
        name: String,

        #[arg(long, default_value = "")]
        location: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Join using an invite code
    Join { code: String },

    /// Join a guild found with `guilds discover`
    JoinId { id: String },

    Leave { id: String },

    /// Show members, posts and resources
    Show { id: String },

    /// Rename or re-describe a guild (admins only)
    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Schedule the next event
    Event {
        id: String,
        title: String,

        /// e.g. 2026-11-02
        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    Post { id: String, content: String },

    DeletePost { id: String, post_id: String },

    /// Share a resource (PDF, Link, Video)
    Resource {
        id: String,
        title: String,

        #[arg(long = "type", default_value = "Link")]
        kind: String,

        #[arg(long)]
        url: Option<String>,
    },

    DeleteResource { id: String, resource_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_piece_note() {
        let cli = Cli::try_parse_from([
            "coastal-kiln",
            "pieces",
            "note",
            "p1",
            "bisque",
            "Slow cool",
        ])
        .unwrap();
        assert!(!cli.offline);
        match cli.command {
            Commands::Pieces(PiecesCommand {
                action: PiecesAction::Note { id, stage, text },
            }) => {
                assert_eq!(id, "p1");
                assert_eq!(stage, "bisque");
                assert_eq!(text, "Slow cool");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_offline_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "coastal-kiln",
            "glazes",
            "add",
            "Temmoku",
            "--type",
            "Cone 10",
            "--offline",
        ])
        .unwrap();
        assert!(cli.offline);
        assert!(matches!(
            cli.command,
            Commands::Glazes(GlazesCommand {
                action: GlazesAction::Add { .. }
            })
        ));
    }

    #[test]
    fn test_parse_repeated_glaze_links() {
        let cli = Cli::try_parse_from([
            "coastal-kiln",
            "pieces",
            "glazes",
            "p1",
            "-g",
            "shino",
            "--glaze",
            "celadon",
            "--custom",
            "Ash wash",
        ])
        .unwrap();
        match cli.command {
            Commands::Pieces(PiecesCommand {
                action: PiecesAction::Glazes { id, glazes, custom },
            }) => {
                assert_eq!(id, "p1");
                assert_eq!(glazes, vec!["shino".to_string(), "celadon".to_string()]);
                assert_eq!(custom.as_deref(), Some("Ash wash"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_guild_discovery_commands() {
        let cli = Cli::try_parse_from(["coastal-kiln", "guilds", "discover"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Guilds(GuildsCommand {
                action: GuildsAction::Discover
            })
        ));

        let cli = Cli::try_parse_from(["coastal-kiln", "guilds", "join-id", "g1"]).unwrap();
        match cli.command {
            Commands::Guilds(GuildsCommand {
                action: GuildsAction::JoinId { id },
            }) => assert_eq!(id, "g1"),
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from([
            "coastal-kiln",
            "guilds",
            "event",
            "g1",
            "Raku night",
            "--date",
            "2026-11-02",
        ])
        .unwrap();
        match cli.command {
            Commands::Guilds(GuildsCommand {
                action: GuildsAction::Event { title, date, .. },
            }) => {
                assert_eq!(title, "Raku night");
                assert_eq!(date.as_deref(), Some("2026-11-02"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_argument() {
        assert!(Cli::try_parse_from(["coastal-kiln", "pieces", "add", "Bowl"]).is_err());
        assert!(Cli::try_parse_from(["coastal-kiln", "login", "a@b.nz"]).is_err());
        assert!(Cli::try_parse_from(["coastal-kiln", "guilds", "delete-post", "g1"]).is_err());
    }
}
