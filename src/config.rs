use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
///
/// Upstream secrets are optional: a missing one only fails the operation
/// that needs it, with a configuration error.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Hevy (fitness tracking) API key
    pub hevy_api_key: Option<String>,

    #[serde(default = "default_hevy_api_url")]
    pub hevy_api_url: String,

    /// Last.fm (scrobbling) API key and the user whose scrobbles are shown
    pub lastfm_api_key: Option<String>,
    pub lastfm_username: Option<String>,

    #[serde(default = "default_lastfm_api_url")]
    pub lastfm_api_url: String,

    /// Trakt (watch history) OAuth application
    pub trakt_client_id: Option<String>,
    pub trakt_client_secret: Option<String>,

    #[serde(default = "default_trakt_redirect_uri")]
    pub trakt_redirect_uri: String,

    #[serde(default = "default_trakt_api_url")]
    pub trakt_api_url: String,

    /// TMDB (poster metadata) API key
    pub tmdb_api_key: Option<String>,

    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    #[serde(default = "default_tmdb_image_url")]
    pub tmdb_image_url: String,

    /// Directus instance holding the watch-history credentials
    pub directus_url: Option<String>,
    pub directus_access_token: Option<String>,

    #[serde(default = "default_fitness_cache_ttl_secs")]
    pub fitness_cache_ttl_secs: u64,

    #[serde(default = "default_scrobble_cache_ttl_secs")]
    pub scrobble_cache_ttl_secs: u64,

    #[serde(default = "default_watch_cache_ttl_secs")]
    pub watch_cache_ttl_secs: u64,

    #[serde(default = "default_poster_cache_ttl_secs")]
    pub poster_cache_ttl_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_hevy_api_url() -> String {
    "https://api.hevyapp.com".to_string()
}

fn default_lastfm_api_url() -> String {
    "https://ws.audioscrobbler.com/2.0/".to_string()
}

fn default_trakt_redirect_uri() -> String {
    "urn:ietf:wg:oauth:2.0:oob".to_string()
}

fn default_trakt_api_url() -> String {
    "https://api.trakt.tv".to_string()
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_url() -> String {
    "https://image.tmdb.org/t/p".to_string()
}

fn default_fitness_cache_ttl_secs() -> u64 {
    3 * 60 * 60
}

fn default_scrobble_cache_ttl_secs() -> u64 {
    5 * 60
}

fn default_watch_cache_ttl_secs() -> u64 {
    30 * 60
}

fn default_poster_cache_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hevy_api_key: None,
            hevy_api_url: default_hevy_api_url(),
            lastfm_api_key: None,
            lastfm_username: None,
            lastfm_api_url: default_lastfm_api_url(),
            trakt_client_id: None,
            trakt_client_secret: None,
            trakt_redirect_uri: default_trakt_redirect_uri(),
            trakt_api_url: default_trakt_api_url(),
            tmdb_api_key: None,
            tmdb_api_url: default_tmdb_api_url(),
            tmdb_image_url: default_tmdb_image_url(),
            directus_url: None,
            directus_access_token: None,
            fitness_cache_ttl_secs: default_fitness_cache_ttl_secs(),
            scrobble_cache_ttl_secs: default_scrobble_cache_ttl_secs(),
            watch_cache_ttl_secs: default_watch_cache_ttl_secs(),
            poster_cache_ttl_secs: default_poster_cache_ttl_secs(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn fitness_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.fitness_cache_ttl_secs)
    }

    pub fn scrobble_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.scrobble_cache_ttl_secs)
    }

    pub fn watch_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.watch_cache_ttl_secs)
    }

    pub fn poster_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.poster_cache_ttl_secs)
    }
}

/// Returns the secret if present and non-blank, otherwise a configuration error
pub fn require<'a>(value: &'a Option<String>, what: &str) -> AppResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Configuration(format!("{} not configured", what))),
    }
}
