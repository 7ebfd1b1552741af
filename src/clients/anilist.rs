use crate::clients::AiringOracle;
use crate::constants::{USER_AGENT, intervals};
use crate::domain::SeriesId;
use crate::error::OracleError;
use crate::models::series::{AiringInfo, NextAiring};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const AIRING_QUERY: &str = r#"
    query ($idMal: Int) {
        Media(idMal: $idMal, type: ANIME) {
            episodes
            nextAiringEpisode {
                episode
                airingAt
                timeUntilAiring
            }
        }
    }
"#;

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: Variables,
}

#[derive(Serialize)]
struct Variables {
    #[serde(rename = "idMal")]
    id_mal: i32,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<Data>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
    status: Option<i32>,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Media")]
    media: Option<Media>,
}

#[derive(Deserialize)]
struct Media {
    episodes: Option<i32>,
    #[serde(rename = "nextAiringEpisode")]
    next_airing_episode: Option<NextAiringEpisode>,
}

#[derive(Deserialize)]
struct NextAiringEpisode {
    episode: i32,
    #[serde(rename = "airingAt")]
    airing_at: i64,
    #[serde(rename = "timeUntilAiring")]
    time_until_airing: i64,
}

impl From<Media> for AiringInfo {
    fn from(m: Media) -> Self {
        Self {
            authoritative_episode_count: m.episodes,
            next_airing: m.next_airing_episode.map(|n| NextAiring {
                episode: n.episode,
                airing_at: n.airing_at,
                seconds_until_airing: n.time_until_airing,
            }),
        }
    }
}

/// Airing schedule lookups against the AniList GraphQL API, keyed by MAL id.
/// No authentication.
#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    api_url: String,
}

impl AnilistClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(intervals::CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    pub async fn airing_by_mal_id(&self, id: SeriesId) -> Result<AiringInfo, OracleError> {
        let request_body = GraphQLRequest {
            query: AIRING_QUERY,
            variables: Variables { id_mal: id.value() },
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        // AniList answers an unknown idMal with 404 and a GraphQL error body.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(OracleError::NotFound(id));
        }

        if !status.is_success() {
            return Err(OracleError::Transport(format!(
                "HTTP {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        let parsed: GraphQLResponse =
            serde_json::from_slice(&bytes).map_err(|e| OracleError::Malformed(e.to_string()))?;

        if let Some(errors) = parsed.errors
            && !errors.is_empty()
        {
            if errors.iter().any(|e| e.status == Some(404)) {
                return Err(OracleError::NotFound(id));
            }
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(OracleError::Malformed(messages.join("; ")));
        }

        let media = parsed
            .data
            .and_then(|d| d.media)
            .ok_or(OracleError::NotFound(id))?;

        debug!(series_id = %id, episodes = ?media.episodes, "Fetched airing info");
        Ok(media.into())
    }
}

#[async_trait]
impl AiringOracle for AnilistClient {
    async fn query_by_external_id(&self, id: SeriesId) -> Result<AiringInfo, OracleError> {
        self.airing_by_mal_id(id).await
    }
}
