use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub mal: MalConfig,

    pub anilist: AnilistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Upper bound for any single HTTP request, in seconds. Exceeding it is
    /// reported as a transport failure.
    pub request_timeout_seconds: u64,

    /// How many airing lookups may be in flight during one pass.
    pub oracle_concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 2,
            request_timeout_seconds: 30,
            oracle_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MalConfig {
    pub api_url: String,

    pub token_url: String,

    pub client_id: String,

    pub client_secret: String,

    pub username: String,

    /// JSON file holding the access and refresh tokens.
    pub credentials_path: String,

    pub page_limit: u32,

    pub include_nsfw: bool,
}

impl Default for MalConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.myanimelist.net/v2".to_string(),
            token_url: "https://myanimelist.net/v1/oauth2/token".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            credentials_path: "tokens.json".to_string(),
            page_limit: 300,
            include_nsfw: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnilistConfig {
    pub api_url: String,
}

impl Default for AnilistConfig {
    fn default() -> Self {
        Self {
            api_url: "https://graphql.anilist.co".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Secrets may come from the environment (or a `.env` file) instead of
    /// the config file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CATCHUP_MAL_CLIENT_ID") {
            self.mal.client_id = v;
        }
        if let Some(v) = lookup("CATCHUP_MAL_CLIENT_SECRET") {
            self.mal.client_secret = v;
        }
        if let Some(v) = lookup("CATCHUP_MAL_USERNAME") {
            self.mal.username = v;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("catchup").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".catchup").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.mal.username.trim().is_empty() {
            anyhow::bail!("mal.username must be set");
        }

        if self.mal.client_id.trim().is_empty() {
            anyhow::bail!("mal.client_id must be set");
        }

        if self.mal.page_limit == 0 {
            anyhow::bail!("mal.page_limit must be > 0");
        }

        if self.general.oracle_concurrency == 0 {
            anyhow::bail!("general.oracle_concurrency must be > 0");
        }

        for (name, value) in [
            ("mal.api_url", &self.mal.api_url),
            ("mal.token_url", &self.mal.token_url),
            ("anilist.api_url", &self.anilist.api_url),
        ] {
            url::Url::parse(value).with_context(|| format!("Invalid {name}: {value}"))?;
        }

        Ok(())
    }
}
