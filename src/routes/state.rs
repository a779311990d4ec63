use std::sync::Arc;

use crate::{
    cache::TtlCache,
    config::Config,
    credentials::{CredentialStore, DirectusCredentialStore, UnconfiguredCredentialStore},
    services::{
        enrichment::PosterLookup,
        fitness::FitnessService,
        http::HttpTransport,
        marketplace::ListingFetcher,
        scrobbles::ScrobbleService,
        watch_history::{TraktSettings, WatchHistoryService},
    },
};

/// Shared application state
pub struct AppState {
    pub fitness: FitnessService,
    pub scrobbles: ScrobbleService,
    pub watch_history: WatchHistoryService,
    pub listings: ListingFetcher,
}

impl AppState {
    /// Wires every service to one transport, with a cache per resource type
    pub fn from_config(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        let store: Arc<dyn CredentialStore> =
            match (&config.directus_url, &config.directus_access_token) {
                (Some(url), Some(token)) => Arc::new(DirectusCredentialStore::new(
                    transport.clone(),
                    url.clone(),
                    token.clone(),
                )),
                _ => {
                    tracing::warn!("Directus not configured, watch history is unavailable");
                    Arc::new(UnconfiguredCredentialStore)
                }
            };

        Self::with_store(config, transport, store)
    }

    pub fn with_store(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let posters = PosterLookup::new(
            transport.clone(),
            TtlCache::new(config.poster_cache_ttl()),
            &config.tmdb_api_url,
            &config.tmdb_image_url,
            config.tmdb_api_key.clone(),
        );

        Self {
            fitness: FitnessService::new(
                transport.clone(),
                TtlCache::new(config.fitness_cache_ttl()),
                &config.hevy_api_url,
                config.hevy_api_key.clone(),
            ),
            scrobbles: ScrobbleService::new(
                transport.clone(),
                TtlCache::new(config.scrobble_cache_ttl()),
                &config.lastfm_api_url,
                config.lastfm_api_key.clone(),
                config.lastfm_username.clone(),
            ),
            watch_history: WatchHistoryService::new(
                transport.clone(),
                store,
                posters,
                TtlCache::new(config.watch_cache_ttl()),
                TraktSettings {
                    api_url: config.trakt_api_url.clone(),
                    client_id: config.trakt_client_id.clone(),
                    client_secret: config.trakt_client_secret.clone(),
                    redirect_uri: config.trakt_redirect_uri.clone(),
                },
            ),
            listings: ListingFetcher::new(transport),
        }
    }
}
