pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod models;
pub mod services;

use clap::Parser;
use cli::{Cli, Commands, EpisodeChange, UpdateRequest};
pub use config::Config;
use domain::SeriesId;
pub use error::{OracleError, TrackerError};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Board { json: false }) {
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, leaving it untouched.");
            }
            Ok(())
        }

        Commands::Board { json } => {
            config.validate()?;
            cli::cmd_board(&config, json).await
        }

        Commands::Update {
            id,
            episodes,
            next,
            prev,
            score,
            total,
        } => {
            config.validate()?;
            let change = match (episodes, next, prev) {
                (Some(n), _, _) => EpisodeChange::Set(n),
                (None, true, _) => EpisodeChange::Next,
                (None, false, true) => EpisodeChange::Prev,
                (None, false, false) => {
                    anyhow::bail!("Pass an episode count, --next or --prev");
                }
            };
            let request = UpdateRequest {
                id: SeriesId::new(id),
                change,
                score,
                total,
            };
            cli::cmd_update(&config, request).await
        }

        Commands::RefreshToken => {
            config.validate()?;
            cli::cmd_refresh_token(&config).await
        }
    }
}
