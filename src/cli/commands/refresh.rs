//! Token refresh command handler

use crate::config::Config;
use crate::services::SeasonTracker;
use anyhow::Context;

pub async fn cmd_refresh_token(config: &Config) -> anyhow::Result<()> {
    let tracker = SeasonTracker::from_config(config)?;

    tracker
        .mal()
        .force_refresh()
        .await
        .context("Token refresh failed; run the initial authorization again")?;

    println!(
        "✓ Tokens refreshed and saved to {}",
        config.mal.credentials_path
    );
    Ok(())
}
