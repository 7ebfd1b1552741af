//! Client for the progress-tracking API (MyAnimeList v2).
//!
//! Every call goes through [`MalClient::fetch`], which attaches the bearer
//! token and handles a single refresh-and-retry cycle on 401.

use crate::clients::credentials::{CredentialStore, TokenSet};
use crate::constants::{USER_AGENT, intervals, mal};
use crate::domain::{Season, SeriesId, Weekday};
use crate::error::TrackerError;
use crate::models::series::{EpisodeTotal, SeriesCatalogEntry, WatchListEntry};
use futures::{Stream, TryStreamExt, stream};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MalClientConfig {
    pub api_url: String,
    pub page_limit: u32,
    pub include_nsfw: bool,
    pub timeout: Duration,
}

impl Default for MalClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.myanimelist.net/v2".to_string(),
            page_limit: 300,
            include_nsfw: true,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    paging: Paging,
}

#[derive(Deserialize, Default)]
struct Paging {
    next: Option<String>,
}

#[derive(Deserialize)]
struct CatalogItem {
    node: CatalogNode,
}

#[derive(Deserialize)]
struct CatalogNode {
    id: i32,
    title: String,
    main_picture: Option<Picture>,
    num_episodes: Option<i32>,
    broadcast: Option<Broadcast>,
}

#[derive(Deserialize)]
struct Picture {
    medium: Option<String>,
    large: Option<String>,
}

#[derive(Deserialize)]
struct Broadcast {
    day_of_the_week: Option<String>,
}

#[derive(Deserialize)]
struct WatchItem {
    node: WatchNode,
    list_status: ListStatus,
}

#[derive(Deserialize)]
struct WatchNode {
    id: i32,
}

#[derive(Deserialize)]
struct ListStatus {
    #[serde(default)]
    num_episodes_watched: i32,
    #[serde(default)]
    score: i32,
}

impl From<CatalogNode> for SeriesCatalogEntry {
    fn from(node: CatalogNode) -> Self {
        Self {
            id: SeriesId::new(node.id),
            title: node.title,
            broadcast_weekday: node
                .broadcast
                .and_then(|b| b.day_of_the_week)
                .and_then(|d| Weekday::parse(&d)),
            declared_episode_count: node.num_episodes,
            cover_image_url: node.main_picture.and_then(|p| p.medium.or(p.large)),
        }
    }
}

impl From<WatchItem> for WatchListEntry {
    fn from(item: WatchItem) -> Self {
        Self {
            series_id: SeriesId::new(item.node.id),
            episodes_watched: item.list_status.num_episodes_watched,
            user_score: item.list_status.score,
        }
    }
}

/// One request of a paginated listing. The first page carries query
/// parameters; follow-up pages use the server's `next` URL verbatim.
struct PageCursor {
    url: String,
    query: Vec<(&'static str, String)>,
}

impl PageCursor {
    fn request(&self, client: &Client) -> RequestBuilder {
        let builder = client.get(&self.url);
        if self.query.is_empty() {
            builder
        } else {
            builder.query(&self.query)
        }
    }
}

/// New progress values for one series on the user's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListStatusUpdate {
    pub series_id: SeriesId,
    pub episodes_watched: i32,
    pub score: i32,
    pub total: EpisodeTotal,
}

impl ListStatusUpdate {
    /// Watched count is clamped to `0..=total` when the total is known.
    #[must_use]
    pub fn new(series_id: SeriesId, episodes_watched: i32, score: i32, total: EpisodeTotal) -> Self {
        let mut episodes_watched = episodes_watched.max(0);
        if let EpisodeTotal::Known(n) = total
            && n > 0
        {
            episodes_watched = episodes_watched.min(n);
        }

        Self {
            series_id,
            episodes_watched,
            score,
            total,
        }
    }

    #[must_use]
    pub fn step_forward(self) -> Self {
        Self::new(self.series_id, self.episodes_watched.saturating_add(1), self.score, self.total)
    }

    #[must_use]
    pub fn step_back(self) -> Self {
        Self::new(self.series_id, self.episodes_watched.saturating_sub(1), self.score, self.total)
    }

    /// List status to send alongside the episode count.
    #[must_use]
    pub fn list_status(&self) -> &'static str {
        match self.total {
            EpisodeTotal::Known(n) if n == self.episodes_watched => mal::COMPLETED,
            _ => mal::WATCHING,
        }
    }
}

pub struct MalClient {
    client: Client,
    config: MalClientConfig,
    store: Arc<dyn CredentialStore>,
    tokens: RwLock<Option<TokenSet>>,
    refresh_guard: Mutex<()>,
}

impl MalClient {
    pub fn new(
        config: MalClientConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(intervals::CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            store,
            tokens: RwLock::new(None),
            refresh_guard: Mutex::new(()),
        })
    }

    async fn current_tokens(&self) -> Result<TokenSet, TrackerError> {
        if let Some(tokens) = self.tokens.read().await.as_ref() {
            return Ok(tokens.clone());
        }

        let mut slot = self.tokens.write().await;
        if let Some(tokens) = slot.as_ref() {
            return Ok(tokens.clone());
        }

        let tokens = self.store.load().await?;
        *slot = Some(tokens.clone());
        Ok(tokens)
    }

    /// Refreshes after `rejected` got a 401. Callers serialize on the guard;
    /// whoever arrives after a successful refresh reuses its result.
    async fn refresh_after_rejection(&self, rejected: &TokenSet) -> Result<TokenSet, TrackerError> {
        let _guard = self.refresh_guard.lock().await;

        let cached = self.tokens.read().await.clone();
        if let Some(current) = cached
            && current.access_token != rejected.access_token
        {
            debug!("Token already refreshed by a concurrent request");
            return Ok(current);
        }

        let fresh = self
            .store
            .refresh(&rejected.refresh_token)
            .await
            .map_err(|e| match e {
                TrackerError::AuthExpired(_) => e,
                other => TrackerError::AuthExpired(other.to_string()),
            })?;

        // The old refresh token is spent once the grant succeeds, so the new
        // pair must stay usable in memory even if it cannot be saved.
        *self.tokens.write().await = Some(fresh.clone());
        self.store.persist(&fresh).await?;

        info!("Access token refreshed and persisted");
        Ok(fresh)
    }

    /// Issues the request built by `build` with the current bearer token.
    ///
    /// On 401 the token is refreshed once and the request is re-issued once;
    /// whatever the retry returns is final. Other failures are never retried.
    pub async fn fetch<F>(&self, build: F) -> Result<Response, TrackerError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let tokens = self.current_tokens().await?;
        let response = build(&self.client)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::ensure_success(response).await;
        }

        debug!(reason = "unauthorized", "Refreshing access token");
        let fresh = self.refresh_after_rejection(&tokens).await?;

        let response = build(&self.client)
            .bearer_auth(&fresh.access_token)
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    async fn ensure_success(response: Response) -> Result<Response, TrackerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TrackerError::status(status, body))
    }

    async fn fetch_json<T, F>(&self, build: F) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let bytes = self.fetch(build).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Pages of a listing, following `paging.next` until it disappears.
    ///
    /// The stream ends after the first error and cannot be resumed.
    fn pages<'a, T>(
        &'a self,
        url: String,
        query: Vec<(&'static str, String)>,
    ) -> impl Stream<Item = Result<Vec<T>, TrackerError>> + Send + 'a
    where
        T: DeserializeOwned + Send + 'a,
    {
        let first = PageCursor { url, query };

        stream::try_unfold(Some(first), move |cursor| async move {
            let Some(cursor) = cursor else {
                return Ok::<_, TrackerError>(None);
            };

            let page: Page<T> = self.fetch_json(|c| cursor.request(c)).await?;
            debug!(url = %cursor.url, items = page.data.len(), "Fetched page");

            let next = page.paging.next.map(|url| PageCursor {
                url,
                query: Vec::new(),
            });
            Ok(Some((page.data, next)))
        })
    }

    fn listing_query(&self, fields: &str) -> Vec<(&'static str, String)> {
        vec![
            ("limit", self.config.page_limit.to_string()),
            ("fields", fields.to_string()),
            ("nsfw", self.config.include_nsfw.to_string()),
        ]
    }

    /// Every series airing in `season` of `year`, all pages combined.
    pub async fn fetch_seasonal_catalog(
        &self,
        season: Season,
        year: i32,
    ) -> Result<Vec<SeriesCatalogEntry>, TrackerError> {
        let url = format!("{}/anime/season/{}/{}", self.config.api_url, year, season);
        let query = self.listing_query(mal::CATALOG_FIELDS);

        let items: Vec<CatalogItem> = self.pages(url, query).try_concat().await?;
        let catalog: Vec<SeriesCatalogEntry> = items
            .into_iter()
            .map(|item| SeriesCatalogEntry::from(item.node))
            .collect();

        info!(season = %season, year, series = catalog.len(), "Fetched seasonal catalog");
        Ok(catalog)
    }

    /// The user's list entries with status "watching".
    pub async fn fetch_watching(&self, username: &str) -> Result<Vec<WatchListEntry>, TrackerError> {
        let url = format!(
            "{}/users/{}/animelist",
            self.config.api_url,
            urlencoding::encode(username)
        );
        let mut query = self.listing_query(mal::WATCH_LIST_FIELDS);
        query.insert(0, ("status", mal::WATCHING.to_string()));

        let items: Vec<WatchItem> = self.pages(url, query).try_concat().await?;
        let entries: Vec<WatchListEntry> = items.into_iter().map(WatchListEntry::from).collect();

        info!(username = %username, entries = entries.len(), "Fetched watch-list");
        Ok(entries)
    }

    /// Writes progress back to the user's list and returns what the server
    /// recorded.
    pub async fn update_list_status(
        &self,
        update: &ListStatusUpdate,
    ) -> Result<WatchListEntry, TrackerError> {
        let url = format!(
            "{}/anime/{}/my_list_status",
            self.config.api_url, update.series_id
        );
        let form = [
            ("status", update.list_status().to_string()),
            ("score", update.score.to_string()),
            ("num_watched_episodes", update.episodes_watched.to_string()),
        ];

        let status: ListStatus = self.fetch_json(|c| c.put(&url).form(&form)).await?;

        info!(
            series_id = %update.series_id,
            episodes = status.num_episodes_watched,
            "Updated list status"
        );
        Ok(WatchListEntry {
            series_id: update.series_id,
            episodes_watched: status.num_episodes_watched,
            user_score: status.score,
        })
    }

    /// Runs the refresh-and-persist cycle without waiting for a 401.
    pub async fn force_refresh(&self) -> Result<TokenSet, TrackerError> {
        let tokens = self.current_tokens().await?;
        self.refresh_after_rejection(&tokens).await
    }
}
