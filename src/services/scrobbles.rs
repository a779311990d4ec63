use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::{
    cache::{CacheKey, TtlCache},
    cached,
    config::require,
    error::{AppError, AppResult},
    models::{
        AggregationRequest, LastfmError, LastfmRecentTracksResponse, LastfmUserResponse,
        ScrobbleSummary, ScrobbleUser, Track,
    },
    services::http::{HttpRequest, HttpTransport},
};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 200;
/// Last.fm error code for an unknown user or resource
const LASTFM_INVALID_RESOURCE: u32 = 6;

/// Recent tracks and profile for one Last.fm user
pub struct ScrobbleService {
    transport: Arc<dyn HttpTransport>,
    cache: TtlCache<ScrobbleSummary>,
    api_url: String,
    api_key: Option<String>,
    username: Option<String>,
}

impl ScrobbleService {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: TtlCache<ScrobbleSummary>,
        api_url: &str,
        api_key: Option<String>,
        username: Option<String>,
    ) -> Self {
        Self {
            transport,
            cache,
            api_url: api_url.to_string(),
            api_key,
            username,
        }
    }

    pub async fn get_summary(&self, request: AggregationRequest) -> AppResult<ScrobbleSummary> {
        let limit = request.limit_or(DEFAULT_LIMIT, MAX_LIMIT);

        cached!(
            self.cache,
            CacheKey::Scrobbles(limit),
            request.force_refresh,
            self.fetch_summary(limit)
        )
    }

    async fn fetch_summary(&self, limit: u32) -> AppResult<ScrobbleSummary> {
        let api_key = require(&self.api_key, "Last.fm API key")?;
        let username = require(&self.username, "Last.fm username")?;

        let (recent, profile) = futures::try_join!(
            self.call::<LastfmRecentTracksResponse>(
                self.request("user.getrecenttracks", api_key, username)
                    .query("limit", limit)
            ),
            self.call::<LastfmUserResponse>(self.request("user.getinfo", api_key, username)),
        )?;

        // A playing track is reported on top of the requested page
        let tracks: Vec<Track> = recent
            .recenttracks
            .track
            .into_iter()
            .take(limit as usize)
            .map(Track::from)
            .collect();

        tracing::info!(
            user = %username,
            tracks = tracks.len(),
            provider = "lastfm",
            "Scrobble summary fetched"
        );

        Ok(ScrobbleSummary {
            user: ScrobbleUser::from(profile.user),
            tracks,
        })
    }

    fn request(&self, method: &str, api_key: &str, username: &str) -> HttpRequest {
        HttpRequest::get(&self.api_url)
            .query("method", method)
            .query("user", username)
            .query("api_key", api_key)
            .query("format", "json")
    }

    async fn call<T: DeserializeOwned>(&self, request: HttpRequest) -> AppResult<T> {
        let response = self.transport.send(request).await?;

        if let Ok(error) = serde_json::from_str::<LastfmError>(&response.body) {
            tracing::warn!(
                code = error.error,
                message = %error.message,
                status = response.status,
                "Last.fm returned an error"
            );
            return Err(match error.error {
                LASTFM_INVALID_RESOURCE => AppError::NotFound(error.message),
                _ => AppError::upstream(response.status, error.message),
            });
        }

        response.error_for_status()?.json()
    }
}
