/// Trakt watch history with TMDB posters
///
/// API Flow:
/// 1. Credentials: read from the credential store
/// 2. History: /users/me/history (refreshes the token once on 401)
/// 3. Stats: /users/me/stats with whichever token step 2 ended on
/// 4. Posters: distinct TMDB lookups, concurrently
use std::sync::Arc;

use chrono::Utc;

use crate::{
    cache::{CacheKey, TtlCache},
    cached,
    config::require,
    credentials::CredentialStore,
    error::AppResult,
    models::{
        AggregationRequest, TraktHistoryItem, TraktStats, WatchItem, WatchStats, WatchSummary,
    },
    services::{
        enrichment::PosterLookup,
        http::{HttpRequest, HttpTransport},
        token_refresh::TokenRefresher,
    },
};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;
const TRAKT_API_VERSION: &str = "2";

/// OAuth application settings for the watch-history provider
#[derive(Debug, Clone, Default)]
pub struct TraktSettings {
    pub api_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

pub struct WatchHistoryService {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn CredentialStore>,
    posters: PosterLookup,
    cache: TtlCache<WatchSummary>,
    settings: TraktSettings,
}

impl WatchHistoryService {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        posters: PosterLookup,
        cache: TtlCache<WatchSummary>,
        settings: TraktSettings,
    ) -> Self {
        Self {
            transport,
            store,
            posters,
            cache,
            settings: TraktSettings {
                api_url: settings.api_url.trim_end_matches('/').to_string(),
                ..settings
            },
        }
    }

    pub async fn get_summary(&self, request: AggregationRequest) -> AppResult<WatchSummary> {
        let limit = request.limit_or(DEFAULT_LIMIT, MAX_LIMIT);

        cached!(
            self.cache,
            CacheKey::WatchHistory(limit),
            request.force_refresh,
            self.fetch_summary(limit)
        )
    }

    /// Fetches a fresh summary; the stats call reuses whatever token the history call ended on
    async fn fetch_summary(&self, limit: u32) -> AppResult<WatchSummary> {
        let client_id = require(&self.settings.client_id, "Trakt client ID")?;
        let client_secret = require(&self.settings.client_secret, "Trakt client secret")?;

        let credentials = self.store.read().await?;
        credentials.ensure_complete()?;
        if credentials.is_expired(Utc::now()) {
            tracing::debug!(expires_at = ?credentials.expires_at, "Stored access token has expired");
        }

        let refresher = TokenRefresher::new(
            self.transport.clone(),
            self.store.clone(),
            &self.settings.api_url,
            client_id.to_string(),
            client_secret.to_string(),
            self.settings.redirect_uri.clone(),
        );

        let history_url = format!("{}/users/me/history", self.settings.api_url);
        let (response, credentials) = refresher
            .send_authorized(credentials, |token| {
                self.request(&history_url, client_id, token)
                    .query("page", 1)
                    .query("limit", limit)
            })
            .await?;
        let history: Vec<TraktHistoryItem> = response.error_for_status()?.json()?;

        let stats_url = format!("{}/users/me/stats", self.settings.api_url);
        let (response, _) = refresher
            .send_authorized(credentials, |token| {
                self.request(&stats_url, client_id, token)
            })
            .await?;
        let stats: TraktStats = response.error_for_status()?.json()?;

        let posters = self
            .posters
            .enrich(&history, TraktHistoryItem::poster_key)
            .await;

        let fetched = history.len();
        let items: Vec<WatchItem> = history
            .into_iter()
            .zip(posters)
            .filter_map(|(item, poster)| WatchItem::from_history(item, poster))
            .collect();

        tracing::info!(
            fetched,
            items = items.len(),
            with_posters = items.iter().filter(|i| i.poster.is_some()).count(),
            provider = "trakt",
            "Watch history fetched"
        );

        Ok(WatchSummary {
            items,
            stats: WatchStats::from(stats),
        })
    }

    fn request(&self, url: &str, client_id: &str, token: &str) -> HttpRequest {
        HttpRequest::get(url)
            .header("Content-Type", "application/json")
            .header("trakt-api-version", TRAKT_API_VERSION)
            .header("trakt-api-key", client_id)
            .bearer(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, MockCredentialStore};
    use crate::error::AppError;
    use crate::services::http::{HttpResponse, MockHttpTransport};
    use std::time::Duration;

    const HISTORY: &str = r#"[
        {"id": 3, "watched_at": "2024-05-03T21:00:00.000Z", "action": "watch", "type": "movie",
         "movie": {"title": "The Matrix", "year": 1999, "ids": {"trakt": 481, "tmdb": 603}}},
        {"id": 2, "watched_at": "2024-05-02T21:00:00.000Z", "action": "watch", "type": "episode",
         "episode": {"season": 2, "number": 5, "title": "Breakage"},
         "show": {"title": "Breaking Bad", "year": 2008, "ids": {"trakt": 1, "tmdb": 1396}}},
        {"id": 1, "watched_at": "2024-05-01T21:00:00.000Z", "action": "watch", "type": "movie",
         "movie": {"title": "The Matrix", "year": 1999, "ids": {"trakt": 481, "tmdb": 603}}}
    ]"#;
    const STATS: &str = r#"{
        "movies": {"plays": 120, "watched": 100, "minutes": 12000},
        "shows": {"watched": 20},
        "episodes": {"plays": 700, "watched": 650, "minutes": 30000}
    }"#;
    const TOKEN_BODY: &str = r#"{
        "access_token": "new-access",
        "refresh_token": "new-refresh",
        "expires_in": 7776000
    }"#;

    fn stored() -> Credentials {
        Credentials {
            access_token: "old-access".to_string(),
            refresh_token: "old-refresh".to_string(),
            ..Default::default()
        }
    }

    fn has_token(req: &HttpRequest, token: &str) -> bool {
        req.header_value("Authorization") == Some(format!("Bearer {}", token).as_str())
    }

    fn expect_posters(transport: &mut MockHttpTransport) {
        transport
            .expect_send()
            .withf(|req| req.url == "https://tmdb.test/3/movie/603")
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"poster_path":"/matrix.jpg"}"#)));
        transport
            .expect_send()
            .withf(|req| req.url == "https://tmdb.test/3/tv/1396/season/2")
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"poster_path":"/bb-s2.jpg"}"#)));
    }

    fn service(
        transport: MockHttpTransport,
        store: MockCredentialStore,
        client_secret: Option<&str>,
    ) -> WatchHistoryService {
        let transport: Arc<dyn HttpTransport> = Arc::new(transport);
        let posters = PosterLookup::new(
            transport.clone(),
            TtlCache::new(Duration::from_secs(7 * 24 * 60 * 60)),
            "https://tmdb.test/3",
            "https://img.test/t/p",
            Some("tmdb-key".to_string()),
        );
        WatchHistoryService::new(
            transport,
            Arc::new(store),
            posters,
            TtlCache::new(Duration::from_secs(30 * 60)),
            TraktSettings {
                api_url: "https://trakt.test/".to_string(),
                client_id: Some("client".to_string()),
                client_secret: client_secret.map(str::to_string),
                redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_summary_with_posters_and_stats() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.url == "https://trakt.test/users/me/history"
                    && req.query_value("limit") == Some("20")
                    && req.header_value("trakt-api-version") == Some("2")
                    && req.header_value("trakt-api-key") == Some("client")
                    && has_token(req, "old-access")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, HISTORY)));
        transport
            .expect_send()
            .withf(|req| req.url == "https://trakt.test/users/me/stats")
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, STATS)));
        expect_posters(&mut transport);

        let mut store = MockCredentialStore::new();
        store.expect_read().times(1).returning(|| Ok(stored()));
        store.expect_write().never();

        let summary = service(transport, store, Some("secret"))
            .get_summary(AggregationRequest::default())
            .await
            .unwrap();

        assert_eq!(summary.items.len(), 3);
        assert_eq!(
            summary.items[0].poster.as_deref(),
            Some("https://img.test/t/p/w342/matrix.jpg")
        );
        assert_eq!(
            summary.items[1].poster.as_deref(),
            Some("https://img.test/t/p/w342/bb-s2.jpg")
        );
        assert_eq!(summary.items[2].poster, summary.items[0].poster);
        assert_eq!(summary.stats.minutes_watched, 42_000);
        assert_eq!(summary.stats.episodes_watched, 650);
    }

    #[tokio::test]
    async fn test_refreshed_token_is_used_for_stats() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/users/me/history") && has_token(req, "old-access"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "")));
        transport
            .expect_send()
            .withf(|req| req.url == "https://trakt.test/oauth/token")
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, TOKEN_BODY)));
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/users/me/history") && has_token(req, "new-access"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, HISTORY)));
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/users/me/stats") && has_token(req, "new-access"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, STATS)));
        expect_posters(&mut transport);

        let mut store = MockCredentialStore::new();
        store.expect_read().times(1).returning(|| Ok(stored()));
        store
            .expect_write()
            .withf(|c| c.access_token == "new-access")
            .times(1)
            .returning(|_| Ok(()));

        let summary = service(transport, store, Some("secret"))
            .get_summary(AggregationRequest::default())
            .await
            .unwrap();

        assert_eq!(summary.items.len(), 3);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store_and_upstream() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/users/me/history"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "[]")));
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/users/me/stats"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, STATS)));

        let mut store = MockCredentialStore::new();
        store.expect_read().times(1).returning(|| Ok(stored()));

        let svc = service(transport, store, Some("secret"));
        let first = svc.get_summary(AggregationRequest::default()).await.unwrap();
        let second = svc.get_summary(AggregationRequest::default()).await.unwrap();

        assert!(first.items.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_client_secret_makes_no_calls() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().never();
        let mut store = MockCredentialStore::new();
        store.expect_read().never();

        let result = service(transport, store, None)
            .get_summary(AggregationRequest::default())
            .await;

        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_blank_stored_tokens_make_no_upstream_calls() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().never();
        let mut store = MockCredentialStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|| Ok(Credentials::default()));

        let result = service(transport, store, Some("secret"))
            .get_summary(AggregationRequest::default())
            .await;

        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_history_server_error_is_upstream() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req| req.url.ends_with("/users/me/history"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(503, "maintenance")));

        let mut store = MockCredentialStore::new();
        store.expect_read().returning(|| Ok(stored()));

        let result = service(transport, store, Some("secret"))
            .get_summary(AggregationRequest::default())
            .await;

        assert!(matches!(result, Err(AppError::Upstream { status: 503, .. })));
    }
}
