use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::services::enrichment::PosterKey;

pub mod marketplace;

/// Input accepted by every aggregation operation
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequest {
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl AggregationRequest {
    /// Requested limit, defaulted and clamped to `1..=max`
    pub fn limit_or(&self, default: u32, max: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, max)
    }
}

// ============================================================================
// Fitness (Hevy) Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RoutineFolder {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutCount {
    #[serde(default)]
    pub workout_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HevyWorkout {
    pub title: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HevyWorkoutPage {
    #[serde(default)]
    pub workouts: Vec<HevyWorkout>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentWorkout {
    pub title: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl From<HevyWorkout> for RecentWorkout {
    fn from(workout: HevyWorkout) -> Self {
        Self {
            title: workout.title,
            start_time: workout.start_time,
            end_time: workout.end_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessStats {
    pub workout_count: u64,
    pub recent_workouts: Vec<RecentWorkout>,
}

/// Routines from the "Current" folder plus workout statistics
///
/// Routines are passed through as the upstream returned them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessSummary {
    pub routines: Vec<serde_json::Value>,
    pub stats: FitnessStats,
}

// ============================================================================
// Scrobbling (Last.fm) Types
// ============================================================================

/// Last.fm reports numbers as strings; accept either
fn string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn from_unix(seconds: u64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds as i64, 0).single()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmText {
    #[serde(rename = "#text", default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmImage {
    #[serde(default)]
    pub size: String,
    #[serde(rename = "#text", default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmDate {
    #[serde(deserialize_with = "string_or_number")]
    pub uts: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastfmTrackAttr {
    #[serde(default)]
    pub nowplaying: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmTrack {
    pub name: String,
    pub artist: LastfmText,
    #[serde(default)]
    pub album: Option<LastfmText>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Vec<LastfmImage>,
    #[serde(default)]
    pub date: Option<LastfmDate>,
    #[serde(rename = "@attr", default)]
    pub attr: Option<LastfmTrackAttr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmRecentTracks {
    #[serde(default)]
    pub track: Vec<LastfmTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmRecentTracksResponse {
    pub recenttracks: LastfmRecentTracks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmRegistered {
    #[serde(deserialize_with = "string_or_number")]
    pub unixtime: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmUser {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub playcount: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub registered: Option<LastfmRegistered>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastfmUserResponse {
    pub user: LastfmUser,
}

/// Last.fm signals failures in the body, often with a 200 status
#[derive(Debug, Clone, Deserialize)]
pub struct LastfmError {
    pub error: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub now_playing: bool,
    pub played_at: Option<DateTime<Utc>>,
}

impl From<LastfmTrack> for Track {
    fn from(track: LastfmTrack) -> Self {
        // Images are listed smallest first
        let image = track
            .image
            .iter()
            .rev()
            .find(|img| !img.url.is_empty())
            .map(|img| img.url.clone());

        Track {
            name: track.name,
            artist: track.artist.text,
            album: track.album.map(|a| a.text).filter(|a| !a.is_empty()),
            url: track.url,
            image,
            now_playing: track
                .attr
                .and_then(|a| a.nowplaying)
                .map(|v| v == "true")
                .unwrap_or(false),
            played_at: track.date.and_then(|d| from_unix(d.uts)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrobbleUser {
    pub name: String,
    pub playcount: u64,
    pub url: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
}

impl From<LastfmUser> for ScrobbleUser {
    fn from(user: LastfmUser) -> Self {
        ScrobbleUser {
            name: user.name,
            playcount: user.playcount,
            url: user.url,
            registered_at: user.registered.and_then(|r| from_unix(r.unixtime)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrobbleSummary {
    pub user: ScrobbleUser,
    pub tracks: Vec<Track>,
}

// ============================================================================
// Watch History (Trakt) Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraktIds {
    #[serde(default)]
    pub trakt: Option<u64>,
    #[serde(default)]
    pub tmdb: Option<u64>,
    #[serde(default)]
    pub imdb: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktMedia {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub ids: TraktIds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktEpisode {
    pub season: u32,
    pub number: u32,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktHistoryItem {
    pub id: u64,
    pub watched_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub movie: Option<TraktMedia>,
    #[serde(default)]
    pub show: Option<TraktMedia>,
    #[serde(default)]
    pub episode: Option<TraktEpisode>,
}

impl TraktHistoryItem {
    /// Movies use their own poster; episodes use their season's poster
    pub fn poster_key(&self) -> Option<PosterKey> {
        match (&self.movie, &self.show) {
            (Some(movie), _) => movie.ids.tmdb.map(PosterKey::movie),
            (None, Some(show)) => show
                .ids
                .tmdb
                .map(|id| PosterKey::show(id, self.episode.as_ref().map(|e| e.season))),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraktStatBlock {
    #[serde(default)]
    pub plays: u64,
    #[serde(default)]
    pub watched: u64,
    #[serde(default)]
    pub minutes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraktStats {
    #[serde(default)]
    pub movies: TraktStatBlock,
    #[serde(default)]
    pub shows: TraktStatBlock,
    #[serde(default)]
    pub episodes: TraktStatBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchKind {
    Movie,
    Episode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchItem {
    pub id: u64,
    pub watched_at: DateTime<Utc>,
    pub kind: WatchKind,
    pub title: String,
    pub year: Option<i32>,
    pub show: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub poster: Option<String>,
}

impl WatchItem {
    /// Normalizes a history entry; entries that are neither movie nor episode are skipped
    pub fn from_history(item: TraktHistoryItem, poster: Option<String>) -> Option<Self> {
        match (item.movie, item.show, item.episode) {
            (Some(movie), _, _) => Some(WatchItem {
                id: item.id,
                watched_at: item.watched_at,
                kind: WatchKind::Movie,
                title: movie.title,
                year: movie.year,
                show: None,
                season: None,
                episode: None,
                poster,
            }),
            (None, Some(show), Some(episode)) => Some(WatchItem {
                id: item.id,
                watched_at: item.watched_at,
                kind: WatchKind::Episode,
                title: episode
                    .title
                    .unwrap_or_else(|| format!("Episode {}", episode.number)),
                year: show.year,
                show: Some(show.title),
                season: Some(episode.season),
                episode: Some(episode.number),
                poster,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStats {
    pub movies_watched: u64,
    pub shows_watched: u64,
    pub episodes_watched: u64,
    pub minutes_watched: u64,
}

impl From<TraktStats> for WatchStats {
    fn from(stats: TraktStats) -> Self {
        WatchStats {
            movies_watched: stats.movies.watched,
            shows_watched: stats.shows.watched,
            episodes_watched: stats.episodes.watched,
            minutes_watched: stats.movies.minutes + stats.episodes.minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchSummary {
    pub items: Vec<WatchItem>,
    pub stats: WatchStats,
}
