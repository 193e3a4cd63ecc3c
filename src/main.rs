use clap::Parser;
use coastal_kiln::cli::{run, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::debug!("Command failed: {}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}
