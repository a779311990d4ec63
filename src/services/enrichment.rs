/// Poster enrichment for watch-history items
///
/// Lookups are best-effort: a missing key, a failed request or an unparseable
/// body yields "no poster" for that key and never fails the batch.
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheKey, TtlCache},
    error::AppResult,
    services::http::{HttpRequest, HttpTransport},
};

const POSTER_SIZE: &str = "w342";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Show => write!(f, "show"),
        }
    }
}

/// Identity of one poster lookup: kind, TMDB id and optional season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PosterKey {
    pub kind: MediaKind,
    pub tmdb_id: u64,
    pub season: Option<u32>,
}

impl PosterKey {
    pub fn movie(tmdb_id: u64) -> Self {
        Self {
            kind: MediaKind::Movie,
            tmdb_id,
            season: None,
        }
    }

    pub fn show(tmdb_id: u64, season: Option<u32>) -> Self {
        Self {
            kind: MediaKind::Show,
            tmdb_id,
            season,
        }
    }
}

impl Display for PosterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.season {
            Some(season) => write!(f, "{}:{}:s{}", self.kind, self.tmdb_id, season),
            None => write!(f, "{}:{}", self.kind, self.tmdb_id),
        }
    }
}

#[derive(Deserialize)]
struct PosterResponse {
    #[serde(default)]
    poster_path: Option<String>,
}

pub struct PosterLookup {
    transport: Arc<dyn HttpTransport>,
    cache: TtlCache<Option<String>>,
    api_url: String,
    image_url: String,
    api_key: Option<String>,
}

impl PosterLookup {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: TtlCache<Option<String>>,
        api_url: &str,
        image_url: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            transport,
            cache,
            api_url: api_url.trim_end_matches('/').to_string(),
            image_url: image_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Resolves a poster for each item, in item order
    ///
    /// Items without a key get `None` without any lookup.
    pub async fn enrich<T, K>(&self, items: &[T], key_of: K) -> Vec<Option<String>>
    where
        K: Fn(&T) -> Option<PosterKey>,
    {
        let keys: Vec<Option<PosterKey>> = items.iter().map(&key_of).collect();
        let resolved = self.resolve(keys.iter().flatten().copied()).await;

        keys.iter()
            .map(|key| key.and_then(|k| resolved.get(&k).cloned().flatten()))
            .collect()
    }

    /// Looks up every distinct key once, concurrently, serving cache hits first
    pub async fn resolve<I>(&self, keys: I) -> HashMap<PosterKey, Option<String>>
    where
        I: IntoIterator<Item = PosterKey>,
    {
        let distinct: HashSet<PosterKey> = keys.into_iter().collect();
        let mut results = HashMap::with_capacity(distinct.len());

        let Some(api_key) = self.api_key.as_deref() else {
            if !distinct.is_empty() {
                tracing::warn!(
                    keys = distinct.len(),
                    "TMDB API key not configured, skipping poster lookups"
                );
            }
            return distinct.into_iter().map(|k| (k, None)).collect();
        };

        let mut misses = Vec::new();
        for key in distinct {
            match self.cache.get(&CacheKey::Poster(key)) {
                Some(poster) => {
                    results.insert(key, poster);
                }
                None => misses.push(key),
            }
        }

        let hits = results.len();
        let lookups = misses.iter().map(|key| async move {
            let outcome = self.lookup(key, api_key).await;
            (*key, outcome)
        });
        let settled = join_all(lookups).await;

        let mut failures = 0usize;
        for (key, outcome) in settled {
            match outcome {
                Ok(poster) => {
                    self.cache.set(&CacheKey::Poster(key), poster.clone());
                    results.insert(key, poster);
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(key = %key, error = %e, "Poster lookup failed");
                    results.insert(key, None);
                }
            }
        }

        tracing::debug!(
            cache_hits = hits,
            fetched = results.len() - hits - failures,
            failures,
            "Poster batch resolved"
        );

        results
    }

    async fn lookup(&self, key: &PosterKey, api_key: &str) -> AppResult<Option<String>> {
        let url = match (key.kind, key.season) {
            (MediaKind::Movie, _) => format!("{}/movie/{}", self.api_url, key.tmdb_id),
            (MediaKind::Show, None) => format!("{}/tv/{}", self.api_url, key.tmdb_id),
            (MediaKind::Show, Some(season)) => {
                format!("{}/tv/{}/season/{}", self.api_url, key.tmdb_id, season)
            }
        };

        let response = self
            .transport
            .send(HttpRequest::get(url).query("api_key", api_key))
            .await?
            .error_for_status()?;

        let body: PosterResponse = response.json()?;

        Ok(body
            .poster_path
            .map(|path| format!("{}/{}{}", self.image_url, POSTER_SIZE, path)))
    }
}
