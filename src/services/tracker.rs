use crate::clients::AiringOracle;
use crate::clients::anilist::AnilistClient;
use crate::clients::credentials::{FileCredentialStore, OAuthClientConfig};
use crate::clients::mal::{MalClient, MalClientConfig};
use crate::config::Config;
use crate::domain::Season;
use crate::error::TrackerError;
use crate::models::series::WeekdayBoard;
use crate::services::reconcile::ReconciliationEngine;
use anyhow::Context;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runs complete reconciliation passes for one user.
///
/// Nothing is carried between passes: each one fetches the catalog and the
/// watch-list again and queries the oracle afresh.
pub struct SeasonTracker {
    mal: Arc<MalClient>,
    engine: ReconciliationEngine,
    username: String,
}

impl SeasonTracker {
    pub fn new(mal: Arc<MalClient>, engine: ReconciliationEngine, username: impl Into<String>) -> Self {
        Self {
            mal,
            engine,
            username: username.into(),
        }
    }

    /// Wires the file credential store and both HTTP clients from config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.general.request_timeout_seconds);

        let store = FileCredentialStore::new(
            &config.mal.credentials_path,
            OAuthClientConfig {
                token_url: config.mal.token_url.clone(),
                client_id: config.mal.client_id.clone(),
                client_secret: config.mal.client_secret.clone(),
            },
            timeout,
        )
        .context("Failed to build token endpoint client")?;

        let mal = MalClient::new(
            MalClientConfig {
                api_url: config.mal.api_url.clone(),
                page_limit: config.mal.page_limit,
                include_nsfw: config.mal.include_nsfw,
                timeout,
            },
            Arc::new(store),
        )
        .context("Failed to build MyAnimeList client")?;

        let oracle: Arc<dyn AiringOracle> = Arc::new(
            AnilistClient::new(&config.anilist.api_url, timeout)
                .context("Failed to build AniList client")?,
        );

        Ok(Self::new(
            Arc::new(mal),
            ReconciliationEngine::new(oracle, config.general.oracle_concurrency),
            &config.mal.username,
        ))
    }

    #[must_use]
    pub fn mal(&self) -> &MalClient {
        &self.mal
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// One full pass for the given season. Any catalog or watch-list failure
    /// aborts the pass; no partial board is returned.
    pub async fn run_pass(&self, season: Season, year: i32) -> Result<WeekdayBoard, TrackerError> {
        info!(season = %season, year, username = %self.username, "Starting reconciliation pass");

        let catalog = self.mal.fetch_seasonal_catalog(season, year).await?;
        let watch_list = self.mal.fetch_watching(&self.username).await?;

        Ok(self.engine.reconcile(&catalog, &watch_list).await)
    }

    /// Pass for the season `today` falls in.
    pub async fn run_pass_for(&self, today: NaiveDate) -> Result<WeekdayBoard, TrackerError> {
        let (season, year) = Season::current(today);
        self.run_pass(season, year).await
    }
}
