use std::path::Path;

use crate::cli::commands::{
    Cli, Commands, GlazesAction, GuildsAction, PiecesAction, ProfileArgs, ReclaimAction,
    TipsAction,
};
use crate::config::AppConfig;
use crate::api::guilds::NewEvent;
use crate::error::AppError;
use crate::models::{
    Profile, ProfileUpdate, ReclaimStatus, ResourceType, Stage, TipCategory, Units,
};
use crate::services::{
    AuthPhase, IdentityContext, LocalBackend, Persistence, RemoteBackend, Studio, Synchronizer,
};
use crate::storage::LocalStore;
use crate::view::{
    BatchForm, GlazeForm, GuildForm, JoinForm, Modal, PieceForm, PostForm, ResourceForm,
    SignInForm, SignUpForm, TipForm,
};
use kiln_media::ImageUpload;

/// Commands that work on the studio collections
enum StudioCommand {
    Pieces(PiecesAction),
    Glazes(GlazesAction),
    Reclaim(ReclaimAction),
    Tips(TipsAction),
    Guilds(GuildsAction),
}

fn load_config(cli: &Cli) -> Result<AppConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?.with_overrides(|name| std::env::var(name).ok()),
        None => AppConfig::load()?,
    };
    if cli.offline {
        config.supabase_url = None;
        config.supabase_anon_key = None;
    }
    Ok(config)
}

/// Sets up storage and identity, then runs the command
pub async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    let store = LocalStore::open(&config.database_path())?;
    let mut identity = IdentityContext::new(&config, store.clone())?;
    let phase = identity.start().await;
    log::debug!("Identity resolved: {:?}", phase);

    let result = match cli.command {
        Commands::Signup {
            email,
            username,
            password,
        } => handle_signup(&mut identity, email, username, password).await,
        Commands::Login { email, password } => handle_login(&mut identity, email, password).await,
        Commands::Logout => handle_logout(&mut identity).await,
        Commands::Whoami => {
            handle_whoami(&mut identity).await;
            Ok(())
        }
        Commands::Profile(args) => handle_profile(&mut identity, args).await,
        Commands::ResetPassword { email } => {
            identity.reset_password(&email).await?;
            println!("Password reset mail sent to {}", email.trim());
            Ok(())
        }
        Commands::SetPassword { password } => {
            identity.update_password(&password).await?;
            println!("Password updated");
            Ok(())
        }
        Commands::Pieces(cmd) => {
            run_studio(&config, store, &identity, StudioCommand::Pieces(cmd.action)).await
        }
        Commands::Glazes(cmd) => {
            run_studio(&config, store, &identity, StudioCommand::Glazes(cmd.action)).await
        }
        Commands::Reclaim(cmd) => {
            run_studio(&config, store, &identity, StudioCommand::Reclaim(cmd.action)).await
        }
        Commands::Tips(cmd) => {
            run_studio(&config, store, &identity, StudioCommand::Tips(cmd.action)).await
        }
        Commands::Guilds(cmd) => {
            run_studio(&config, store, &identity, StudioCommand::Guilds(cmd.action)).await
        }
    };

    identity.shutdown();
    result
}

async fn run_studio(
    config: &AppConfig,
    store: LocalStore,
    identity: &IdentityContext,
    command: StudioCommand,
) -> Result<(), AppError> {
    let sync = Synchronizer::new(config.retry_policy(), config.startup_delay());

    match identity.gateway() {
        Some(gateway) => {
            if identity.phase() != AuthPhase::Authenticated {
                eprintln!("Not signed in; run `coastal-kiln login` or use --offline");
            }
            let backend = RemoteBackend::new(gateway.clone(), store, config.retry_policy());
            let mut studio = Studio::new(backend, sync);
            dispatch(&mut studio, identity, command).await
        }
        None => {
            let mut studio = Studio::new(LocalBackend::new(store), sync);
            dispatch(&mut studio, identity, command).await
        }
    }
}

async fn dispatch<P: Persistence>(
    studio: &mut Studio<P>,
    identity: &IdentityContext,
    command: StudioCommand,
) -> Result<(), AppError> {
    studio.set_username(&identity.username());
    studio.refresh().await;

    match command {
        StudioCommand::Pieces(action) => handle_pieces(studio, action).await,
        StudioCommand::Glazes(action) => handle_glazes(studio, action).await,
        StudioCommand::Reclaim(action) => handle_reclaim(studio, action).await,
        StudioCommand::Tips(action) => handle_tips(studio, action),
        StudioCommand::Guilds(action) => handle_guilds(studio, action).await,
    }
}

/// Refuses an incomplete form before anything is sent
fn require(modal: &Modal, message: &str) -> Result<(), AppError> {
    if modal.can_submit() {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{}: {}", modal.title(), message)))
    }
}

/// Resolves a full id or an unambiguous id prefix
fn resolve_id<'a, I>(ids: I, given: &str, what: &str) -> Result<String, AppError>
where
    I: IntoIterator<Item = &'a str>,
{
    let given = given.trim();
    let mut matches = Vec::new();
    for id in ids {
        if id == given {
            return Ok(id.to_string());
        }
        if id.starts_with(given) {
            matches.push(id);
        }
    }

    match matches.as_slice() {
        [only] => Ok(only.to_string()),
        [] => Err(AppError::NotFound(format!("{} {}", what, given))),
        _ => Err(AppError::Validation(format!(
            "'{}' matches {} {}s, give more of the id",
            given,
            matches.len(),
            what.to_lowercase()
        ))),
    }
}

fn piece_id<P: Persistence>(studio: &Studio<P>, id: &str) -> Result<String, AppError> {
    resolve_id(studio.pieces().iter().map(|p| p.id.as_str()), id, "Piece")
}

fn glaze_id<P: Persistence>(studio: &Studio<P>, id: &str) -> Result<String, AppError> {
    resolve_id(studio.glazes().iter().map(|g| g.id.as_str()), id, "Glaze")
}

fn batch_id<P: Persistence>(studio: &Studio<P>, id: &str) -> Result<String, AppError> {
    resolve_id(studio.batches().iter().map(|b| b.id.as_str()), id, "Batch")
}

fn guild_id<P: Persistence>(studio: &Studio<P>, id: &str) -> Result<String, AppError> {
    resolve_id(studio.guilds().iter().map(|g| g.id.as_str()), id, "Guild")
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn read_image(path: &Path) -> Result<ImageUpload, AppError> {
    Ok(ImageUpload::from_path(path)?)
}

// ----- account -----

pub async fn handle_signup(
    identity: &mut IdentityContext,
    email: String,
    username: String,
    password: String,
) -> Result<(), AppError> {
    let form = SignUpForm {
        email,
        password,
        username,
    };
    require(
        &Modal::SignUp(form.clone()),
        "email, password and username are required",
    )?;

    if identity.sign_up(&form.email, &form.password, &form.username).await? {
        println!("Welcome, {}!", identity.username());
    } else {
        println!("Check {} to confirm your account", form.email.trim());
    }
    Ok(())
}

pub async fn handle_login(
    identity: &mut IdentityContext,
    email: String,
    password: String,
) -> Result<(), AppError> {
    let form = SignInForm { email, password };
    require(&Modal::SignIn(form.clone()), "email and password are required")?;

    identity.sign_in(&form.email, &form.password).await?;
    println!("Signed in as {}", identity.username());
    Ok(())
}

pub async fn handle_logout(identity: &mut IdentityContext) -> Result<(), AppError> {
    identity.sign_out().await?;
    if identity.is_offline() {
        println!("Local profile cleared");
    } else {
        println!("Signed out");
    }
    Ok(())
}

fn print_profile(profile: &Profile) {
    println!("Username: {}", profile.username);
    if !profile.email.is_empty() {
        println!("Email:    {}", profile.email);
    }
    if !profile.location.is_empty() {
        println!("Location: {}", profile.location);
    }
    if !profile.bio.is_empty() {
        println!("Bio:      {}", profile.bio);
    }
    println!("Units:    {}", profile.units.as_str());
    if let Some(url) = &profile.avatar_url {
        println!("Avatar:   {}", url);
    }
}

pub async fn handle_whoami(identity: &mut IdentityContext) {
    match identity.phase() {
        AuthPhase::Offline => println!("Offline mode"),
        AuthPhase::Authenticated => {
            if let Err(e) = identity.refresh_user().await {
                log::warn!("Could not refresh account details: {}", e);
            }
            let email = identity
                .session()
                .and_then(|s| s.user.email.clone())
                .unwrap_or_default();
            println!("Signed in {}", email);
        }
        AuthPhase::Unauthenticated | AuthPhase::Loading | AuthPhase::Uninitialized => {
            println!("Not signed in");
            return;
        }
    }

    match identity.profile() {
        Some(profile) => print_profile(profile),
        None => println!("Username: {}", identity.username()),
    }
}

pub async fn handle_profile(
    identity: &mut IdentityContext,
    args: ProfileArgs,
) -> Result<(), AppError> {
    let units = match args.units.as_deref() {
        Some(raw) => Some(
            Units::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown units '{}'", raw)))?,
        ),
        None => None,
    };
    let changes = ProfileUpdate {
        username: args.username,
        email: args.email,
        bio: args.bio,
        location: args.location,
        units,
        avatar_url: None,
    };

    if let Some(path) = &args.avatar {
        let upload = read_image(path)?;
        identity.update_avatar(&upload).await?;
    }

    if !changes.is_empty() {
        identity.update_profile(&changes).await?;
    }

    match identity.profile() {
        Some(profile) => print_profile(profile),
        None => println!("No profile loaded"),
    }
    Ok(())
}

// ----- pieces -----

pub async fn handle_pieces<P: Persistence>(
    studio: &mut Studio<P>,
    action: PiecesAction,
) -> Result<(), AppError> {
    match action {
        PiecesAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(studio.pieces())?);
            } else if studio.pieces().is_empty() {
                println!("No pieces yet");
            } else {
                for piece in studio.pieces() {
                    println!(
                        "{}  {:<24} {:<14} {}",
                        short(&piece.id),
                        piece.title,
                        piece.clay,
                        piece.stage.label()
                    );
                }
            }
        }
        PiecesAction::Add { title, clay } => {
            let form = PieceForm { title, clay };
            require(&Modal::NewPiece(form.clone()), "title and clay body are required")?;
            let piece = studio.create_piece(&form.title, &form.clay).await?;
            println!(
                "Created piece {} - {} ({})",
                short(&piece.id),
                piece.title,
                piece.stage.label()
            );
        }
        PiecesAction::Show { id, json } => {
            let id = piece_id(studio, &id)?;
            if let Err(e) = studio.open_piece(&id).await {
                log::warn!("Showing cached piece {}: {}", short(&id), e);
            }
            let piece = studio
                .piece(&id)
                .ok_or_else(|| AppError::NotFound(format!("Piece {}", id)))?;
            if json {
                println!("{}", serde_json::to_string_pretty(piece)?);
                return Ok(());
            }

            println!("{} ({})", piece.title, piece.clay);
            println!("Started {}  Stage: {}", piece.date, piece.stage.label());
            for stage in Stage::ALL {
                let marker = if stage == piece.stage { ">" } else { " " };
                let note = piece.note(stage);
                if note.is_empty() {
                    println!("{} {}", marker, stage.label());
                } else {
                    println!("{} {}: {}", marker, stage.label(), note);
                }
            }
            let glazes: Vec<&str> = piece
                .glaze_ids
                .iter()
                .map(|id| studio.glaze(id).map(|g| g.name.as_str()).unwrap_or(id.as_str()))
                .chain(piece.custom_glaze.as_deref())
                .collect();
            if !glazes.is_empty() {
                println!("Glazes: {}", glazes.join(", "));
            }
            for photo in &piece.photos {
                println!("  photo {}  {}", short(&photo.id), photo.url);
            }
        }
        PiecesAction::Edit { id, title, clay } => {
            let id = piece_id(studio, &id)?;
            let current = studio
                .piece(&id)
                .ok_or_else(|| AppError::NotFound(format!("Piece {}", id)))?;
            let form = PieceForm {
                title: title.unwrap_or_else(|| current.title.clone()),
                clay: clay.unwrap_or_else(|| current.clay.clone()),
            };
            require(&Modal::NewPiece(form.clone()), "title and clay body are required")?;
            studio.edit_piece(&id, &form.title, &form.clay).await?;
            println!("Saved {}", form.title.trim());
        }
        PiecesAction::Glazes { id, glazes, custom } => {
            let id = piece_id(studio, &id)?;
            let mut glaze_ids = Vec::with_capacity(glazes.len());
            for glaze in &glazes {
                glaze_ids.push(glaze_id(studio, glaze)?);
            }
            studio.set_piece_glazes(&id, glaze_ids, custom).await?;
            let piece = studio
                .piece(&id)
                .ok_or_else(|| AppError::NotFound(format!("Piece {}", id)))?;
            println!(
                "{} linked glaze(s){}",
                piece.glaze_ids.len(),
                piece
                    .custom_glaze
                    .as_deref()
                    .map(|c| format!(" plus {}", c))
                    .unwrap_or_default()
            );
        }
        PiecesAction::Advance { id } => {
            let id = piece_id(studio, &id)?;
            let stage = studio.advance_piece(&id).await?;
            println!("Moved to {}", stage.label());
        }
        PiecesAction::Note { id, stage, text } => {
            let id = piece_id(studio, &id)?;
            let stage = Stage::parse(&stage)
                .ok_or_else(|| AppError::Validation(format!("Unknown stage '{}'", stage)))?;
            studio.set_stage_note(&id, stage, &text).await?;
            println!("Saved {} note", stage.label());
        }
        PiecesAction::Photo { id, path } => {
            let id = piece_id(studio, &id)?;
            let upload = read_image(&path)?;
            studio.add_piece_photo(&id, &upload).await?;
            println!("Photo added");
        }
        PiecesAction::RemovePhoto { id, photo_id } => {
            let id = piece_id(studio, &id)?;
            let photo_id = {
                let piece = studio
                    .piece(&id)
                    .ok_or_else(|| AppError::NotFound(format!("Piece {}", id)))?;
                resolve_id(piece.photos.iter().map(|p| p.id.as_str()), &photo_id, "Photo")?
            };
            studio.remove_piece_photo(&id, &photo_id).await?;
            println!("Photo removed");
        }
        PiecesAction::Delete { id } => {
            let id = piece_id(studio, &id)?;
            studio.delete_piece(&id).await?;
            println!("Deleted piece {}", short(&id));
        }
    }
    Ok(())
}

// ----- glazes -----

pub async fn handle_glazes<P: Persistence>(
    studio: &mut Studio<P>,
    action: GlazesAction,
) -> Result<(), AppError> {
    match action {
        GlazesAction::List { json, mine } => {
            let glazes = if mine {
                studio.own_glazes().await?
            } else {
                studio.glazes().to_vec()
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&glazes)?);
            } else if glazes.is_empty() {
                println!("No glazes yet");
            } else {
                for glaze in &glazes {
                    println!(
                        "{}  {:<24} {:<10} {} tile(s)",
                        short(&glaze.id),
                        glaze.name,
                        glaze.firing_type,
                        glaze.tiles.len()
                    );
                }
            }
        }
        GlazesAction::Add {
            name,
            firing_type,
            recipe,
        } => {
            let form = GlazeForm {
                name,
                firing_type,
                recipe,
            };
            require(&Modal::NewGlaze(form.clone()), "name and firing type are required")?;
            let glaze = studio
                .create_glaze(&form.name, &form.firing_type, &form.recipe)
                .await?;
            println!("Created glaze {} - {}", short(&glaze.id), glaze.name);
        }
        GlazesAction::Show { id, json } => {
            let id = glaze_id(studio, &id)?;
            if let Err(e) = studio.open_glaze(&id).await {
                log::warn!("Showing cached glaze {}: {}", short(&id), e);
            }
            let glaze = studio
                .glaze(&id)
                .ok_or_else(|| AppError::NotFound(format!("Glaze {}", id)))?;
            if json {
                println!("{}", serde_json::to_string_pretty(glaze)?);
                return Ok(());
            }

            println!("{} ({})", glaze.name, glaze.firing_type);
            if !glaze.recipe.is_empty() {
                println!("Recipe: {}", glaze.recipe);
            }
            if !glaze.notes.is_empty() {
                println!("Notes:  {}", glaze.notes);
            }
            for tile in &glaze.tiles {
                println!("  tile {}  {}", short(&tile.id), tile.url);
            }
        }
        GlazesAction::Recipe { id, recipe } => {
            let id = glaze_id(studio, &id)?;
            studio.update_glaze_recipe(&id, &recipe).await?;
            println!("Recipe saved");
        }
        GlazesAction::Notes { id, notes } => {
            let id = glaze_id(studio, &id)?;
            studio.update_glaze_notes(&id, &notes).await?;
            println!("Notes saved");
        }
        GlazesAction::Tile { id, path } => {
            let id = glaze_id(studio, &id)?;
            let upload = read_image(&path)?;
            studio.add_glaze_tile(&id, &upload).await?;
            println!("Test tile added");
        }
        GlazesAction::RemoveTile { id, tile_id } => {
            let id = glaze_id(studio, &id)?;
            let tile_id = {
                let glaze = studio
                    .glaze(&id)
                    .ok_or_else(|| AppError::NotFound(format!("Glaze {}", id)))?;
                resolve_id(glaze.tiles.iter().map(|t| t.id.as_str()), &tile_id, "Tile")?
            };
            studio.remove_glaze_tile(&id, &tile_id).await?;
            println!("Test tile removed");
        }
        GlazesAction::Delete { id } => {
            let id = glaze_id(studio, &id)?;
            studio.delete_glaze(&id).await?;
            println!("Deleted glaze {}", short(&id));
        }
    }
    Ok(())
}

// ----- reclaim -----

pub async fn handle_reclaim<P: Persistence>(
    studio: &mut Studio<P>,
    action: ReclaimAction,
) -> Result<(), AppError> {
    match action {
        ReclaimAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(studio.batches())?);
            } else if studio.batches().is_empty() {
                println!("No reclaim batches yet");
            } else {
                for batch in studio.batches() {
                    let weight = batch
                        .weight
                        .map(|w| format!("{:.2} kg", w))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{}  {} {:<24} {:>9}  {}",
                        short(&batch.id),
                        batch.date,
                        batch.source,
                        weight,
                        batch.status.label()
                    );
                }
            }
        }
        ReclaimAction::Add {
            source,
            weight,
            notes,
        } => {
            let form = BatchForm {
                source,
                weight: weight.unwrap_or_default(),
                notes,
            };
            let weight = form.weight().map_err(AppError::Validation)?;
            require(&Modal::NewBatch(form.clone()), "source is required")?;
            let batch = studio.create_batch(&form.source, weight, &form.notes).await?;
            println!("Recorded batch {} - {}", short(&batch.id), batch.source);
        }
        ReclaimAction::Show { id } => {
            let id = batch_id(studio, &id)?;
            let batch = studio.open_batch(&id).await?;
            println!("{} ({})", batch.source, batch.status.label());
            println!("Collected {}", batch.date);
            if let Some(weight) = batch.weight {
                println!("Weight: {:.2} kg", weight);
            }
            if !batch.notes.is_empty() {
                println!("Notes:  {}", batch.notes);
            }
        }
        ReclaimAction::Status { id, status } => {
            let id = batch_id(studio, &id)?;
            let status = ReclaimStatus::parse(&status)
                .ok_or_else(|| AppError::Validation(format!("Unknown status '{}'", status)))?;
            studio.set_batch_status(&id, status).await?;
            println!("Status set to {}", status.label());
        }
        ReclaimAction::Delete { id } => {
            let id = batch_id(studio, &id)?;
            studio.delete_batch(&id).await?;
            println!("Deleted batch {}", short(&id));
        }
        ReclaimAction::Total => {
            println!("Total reclaimed: {:.2} kg", studio.stored_total_reclaimed().await);
        }
    }
    Ok(())
}

// ----- tips -----

pub fn handle_tips<P: Persistence>(
    studio: &mut Studio<P>,
    action: TipsAction,
) -> Result<(), AppError> {
    let parse_category = |raw: &str| {
        TipCategory::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Unknown category '{}'", raw)))
    };

    match action {
        TipsAction::List { category } => {
            let tips = match category.as_deref() {
                Some(raw) => studio.tips_in(parse_category(raw)?),
                None => studio.tips().iter().collect(),
            };
            for tip in tips {
                println!("[{}] {}", tip.category.label(), tip.title);
                println!("  {}", tip.content);
                if !tip.tags.is_empty() {
                    println!("  tags: {}", tip.tags.join(", "));
                }
            }
        }
        TipsAction::Add {
            category,
            title,
            content,
            tags,
        } => {
            let form = TipForm {
                category: parse_category(&category)?,
                title,
                content,
                tags: tags.join(","),
            };
            require(&Modal::NewTip(form.clone()), "title and content are required")?;
            let tip = studio.add_tip(form.category, &form.title, &form.content, form.tags())?;
            println!("Added tip: {}", tip.title);
        }
    }
    Ok(())
}

// ----- guilds -----

pub async fn handle_guilds<P: Persistence>(
    studio: &mut Studio<P>,
    action: GuildsAction,
) -> Result<(), AppError> {
    match action {
        GuildsAction::List => {
            if studio.guilds().is_empty() {
                println!("No guilds yet");
            }
            for guild in studio.guilds() {
                let role = match (guild.is_admin, guild.is_member) {
                    (true, _) => "admin",
                    (false, true) => "member",
                    (false, false) => "-",
                };
                println!(
                    "{}  {:<28} {:<16} {:>3} members  {}  code {}",
                    short(&guild.id),
                    guild.name,
                    guild.location,
                    guild.members,
                    role,
                    guild.invite_code
                );
            }
        }
        GuildsAction::Discover => {
            let guilds = studio.discover_guilds().await?;
            if guilds.is_empty() {
                println!("No guilds found");
            }
            for guild in &guilds {
                println!(
                    "{}  {:<28} {:<16} {:>3} members{}",
                    short(&guild.id),
                    guild.name,
                    guild.location,
                    guild.members,
                    if guild.is_member { "  (joined)" } else { "" }
                );
            }
        }
        GuildsAction::Create {
            name,
            location,
            description,
        } => {
            let form = GuildForm {
                name,
                location,
                description,
            };
            require(&Modal::NewGuild(form.clone()), "name is required")?;
            let guild = studio
                .create_guild(&form.name, &form.location, &form.description)
                .await?;
            println!("Created guild {} - invite code {}", guild.name, guild.invite_code);
        }
        GuildsAction::Join { code } => {
            let form = JoinForm { code };
            require(&Modal::JoinGuild(form.clone()), "invite codes have 8 characters")?;
            let guild = studio.join_guild_by_code(&form.code).await?;
            println!("Joined {} ({} members)", guild.name, guild.members);
        }
        GuildsAction::JoinId { id } => {
            let found = studio.discover_guilds().await?;
            let id = resolve_id(found.iter().map(|g| g.id.as_str()), &id, "Guild")?;
            let guild = studio.join_guild(&id).await?;
            println!("Joined {} ({} members)", guild.name, guild.members);
        }
        GuildsAction::Leave { id } => {
            let id = guild_id(studio, &id)?;
            studio.leave_guild(&id).await?;
            println!("Left guild");
        }
        GuildsAction::Show { id } => {
            let id = guild_id(studio, &id)?;
            if let Err(e) = studio.open_guild(&id).await {
                log::warn!("Showing cached guild {}: {}", short(&id), e);
            }
            let guild = studio
                .guild(&id)
                .ok_or_else(|| AppError::NotFound(format!("Guild {}", id)))?;
            let now = chrono::Utc::now();

            println!("{} - {}", guild.name, guild.location);
            if !guild.description.is_empty() {
                println!("{}", guild.description);
            }
            println!("Members ({}): {}", guild.members, guild.member_list.join(", "));
            if let Some(event) = &guild.event {
                println!("Next event: {}", event);
            }
            for post in &guild.posts {
                println!(
                    "  {} {} ({}): {}",
                    short(&post.id),
                    post.author,
                    post.relative_time(now),
                    post.content
                );
            }
            for resource in &guild.resources {
                println!(
                    "  {} [{}] {} by {}{}",
                    short(&resource.id),
                    resource.kind.as_str(),
                    resource.title,
                    resource.added_by,
                    resource
                        .url
                        .as_deref()
                        .map(|u| format!(" <{}>", u))
                        .unwrap_or_default()
                );
            }
        }
        GuildsAction::Edit {
            id,
            name,
            location,
            description,
        } => {
            let id = guild_id(studio, &id)?;
            let current = studio
                .guild(&id)
                .ok_or_else(|| AppError::NotFound(format!("Guild {}", id)))?;
            let form = GuildForm {
                name: name.unwrap_or_else(|| current.name.clone()),
                location: location.unwrap_or_else(|| current.location.clone()),
                description: description.unwrap_or_else(|| current.description.clone()),
            };
            require(&Modal::NewGuild(form.clone()), "name is required")?;
            studio
                .update_guild(&id, &form.name, &form.location, &form.description)
                .await?;
            println!("Saved {}", form.name.trim());
        }
        GuildsAction::Event {
            id,
            title,
            date,
            location,
            description,
        } => {
            let id = guild_id(studio, &id)?;
            let event = NewEvent {
                title: title.trim().to_string(),
                description,
                date,
                location,
            };
            let label = studio.schedule_event(&id, event).await?;
            println!("Next event: {}", label);
        }
        GuildsAction::DeletePost { id, post_id } => {
            let id = guild_id(studio, &id)?;
            let post_id = {
                let guild = studio
                    .guild(&id)
                    .ok_or_else(|| AppError::NotFound(format!("Guild {}", id)))?;
                resolve_id(guild.posts.iter().map(|p| p.id.as_str()), &post_id, "Post")?
            };
            studio.delete_guild_post(&id, &post_id).await?;
            println!("Post removed");
        }
        GuildsAction::DeleteResource { id, resource_id } => {
            let id = guild_id(studio, &id)?;
            let resource_id = {
                let guild = studio
                    .guild(&id)
                    .ok_or_else(|| AppError::NotFound(format!("Guild {}", id)))?;
                resolve_id(
                    guild.resources.iter().map(|r| r.id.as_str()),
                    &resource_id,
                    "Resource",
                )?
            };
            studio.delete_guild_resource(&id, &resource_id).await?;
            println!("Resource removed");
        }
        GuildsAction::Post { id, content } => {
            let id = guild_id(studio, &id)?;
            let form = PostForm {
                guild_id: id,
                content,
            };
            require(&Modal::NewPost(form.clone()), "post must not be empty")?;
            studio.post_to_guild(&form.guild_id, &form.content).await?;
            println!("Posted");
        }
        GuildsAction::Resource {
            id,
            title,
            kind,
            url,
        } => {
            let id = guild_id(studio, &id)?;
            let kind = ResourceType::parse(&kind)
                .ok_or_else(|| AppError::Validation(format!("Unknown resource type '{}'", kind)))?;
            let form = ResourceForm {
                guild_id: id,
                title,
                kind,
                url: url.unwrap_or_default(),
            };
            require(&Modal::NewResource(form.clone()), "title is required")?;
            let url = Some(form.url.trim().to_string()).filter(|u| !u.is_empty());
            let resource = studio
                .add_guild_resource(&form.guild_id, &form.title, form.kind, url)
                .await?;
            println!("Shared {}", resource.title);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RetryPolicy;
    use std::time::Duration;

    async fn studio() -> Studio<LocalBackend> {
        let sync = Synchronizer::new(RetryPolicy::new(1, Duration::from_millis(1)), Duration::ZERO);
        let mut studio = Studio::new(LocalBackend::new(LocalStore::in_memory().unwrap()), sync);
        studio.refresh().await;
        studio
    }

    #[test]
    fn test_resolve_id_by_prefix() {
        let ids = ["a1b2c3d4-0000", "a1ff0000-1111", "b9000000-2222"];
        assert_eq!(
            resolve_id(ids.iter().copied(), "b9", "Piece").unwrap(),
            "b9000000-2222"
        );
        assert_eq!(
            resolve_id(ids.iter().copied(), "a1ff0000-1111", "Piece").unwrap(),
            "a1ff0000-1111"
        );
        assert!(matches!(
            resolve_id(ids.iter().copied(), "a1", "Piece"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            resolve_id(ids.iter().copied(), "zz", "Piece"),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_incomplete_form_is_refused() {
        let mut studio = studio().await;
        let result = handle_pieces(
            &mut studio,
            PiecesAction::Add {
                title: "Bowl".into(),
                clay: " ".into(),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(studio.pieces().is_empty());
    }

    #[tokio::test]
    async fn test_piece_commands_by_prefix() {
        let mut studio = studio().await;
        handle_pieces(
            &mut studio,
            PiecesAction::Add {
                title: "Celadon Bowl".into(),
                clay: "Porcelain".into(),
            },
        )
        .await
        .unwrap();

        let id = studio.pieces()[0].id.clone();
        handle_pieces(&mut studio, PiecesAction::Advance { id: id[..6].to_string() })
            .await
            .unwrap();
        assert_eq!(studio.pieces()[0].stage, Stage::Throwing);

        let result = handle_pieces(
            &mut studio,
            PiecesAction::Note {
                id: id.clone(),
                stage: "kiln".into(),
                text: "hot".into(),
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_glaze_links_resolve_prefixes() {
        let mut studio = studio().await;
        let piece = studio.create_piece("Mug", "Stoneware").await.unwrap().id.clone();
        let glaze = studio.create_glaze("Shino", "Cone 10", "").await.unwrap().id.clone();

        handle_pieces(
            &mut studio,
            PiecesAction::Glazes {
                id: piece[..6].to_string(),
                glazes: vec![glaze[..6].to_string()],
                custom: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(studio.piece(&piece).unwrap().glaze_ids, vec![glaze]);

        let result = handle_pieces(
            &mut studio,
            PiecesAction::Glazes {
                id: piece.clone(),
                glazes: vec!["zz".into()],
                custom: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_guild_edit_keeps_unset_fields() {
        let mut studio = studio().await;
        let id = studio
            .create_guild("Nelson Clay", "Nelson", "Weekly throws")
            .await
            .unwrap()
            .id
            .clone();

        handle_guilds(
            &mut studio,
            GuildsAction::Edit {
                id: id.clone(),
                name: Some("Nelson Clay Club".into()),
                location: None,
                description: None,
            },
        )
        .await
        .unwrap();
        let guild = studio.guild(&id).unwrap();
        assert_eq!(guild.name, "Nelson Clay Club");
        assert_eq!(guild.location, "Nelson");
        assert_eq!(guild.description, "Weekly throws");
    }

    #[tokio::test]
    async fn test_reclaim_rejects_bad_weight() {
        let mut studio = studio().await;
        let result = handle_reclaim(
            &mut studio,
            ReclaimAction::Add {
                source: "Slop".into(),
                weight: Some("lots".into()),
                notes: String::new(),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(studio.batches().is_empty());
    }
}
