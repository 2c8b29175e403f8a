//! Vidloader CLI - Embed loader tooling
//!
//! Features:
//! - Player script and iframe URL resolution
//! - Headless embed rendering from a JSON parameter file
//! - CDN reachability checks for player scripts

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

/// Vidloader CLI - Video player embed toolkit
#[derive(Parser)]
#[command(name = "vidloader")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Resolve, render and check video player embeds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Loader configuration file (JSON); environment variables otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Identifies a player on the CDN
#[derive(Args, Debug, Clone)]
pub struct PlayerArgs {
    /// Account id
    #[arg(short, long)]
    account: String,

    /// Player id
    #[arg(short, long, default_value = "default")]
    player: String,

    /// Embed id
    #[arg(short, long, default_value = "default")]
    embed: String,

    /// Resolve the iframe document instead of the player script
    #[arg(long)]
    iframe: bool,

    /// Request the unminified player script
    #[arg(long)]
    unminified: bool,

    /// CDN base URL override
    #[arg(long)]
    base: Option<String>,

    /// Video id (iframe query string)
    #[arg(long)]
    video_id: Option<String>,

    /// Playlist id (iframe query string)
    #[arg(long)]
    playlist_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved player URL
    Url {
        #[command(flatten)]
        player: PlayerArgs,
    },

    /// Render an embed headlessly and print the page
    Render {
        /// JSON file with embed parameters (camelCase)
        params: PathBuf,

        /// Print only the target's markup instead of the whole page
        #[arg(long)]
        fragment: bool,
    },

    /// Check that the player script is served
    Check {
        #[command(flatten)]
        player: PlayerArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    vidloader_core::init();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Url { player } => {
            commands::url(&config, &player, &cli.format)?;
        }
        Commands::Render { params, fragment } => {
            commands::render(&config, &params, fragment, &cli.format).await?;
        }
        Commands::Check { player } => {
            let ok = commands::check(&config, &player, &cli.format).await?;
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
