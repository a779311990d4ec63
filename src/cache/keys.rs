use std::fmt::Display;

use crate::services::enrichment::PosterKey;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Fitness summary, keyed by the number of recent workouts requested
    Fitness(u32),
    Scrobbles(u32),
    WatchHistory(u32),
    Poster(PosterKey),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Fitness(limit) => write!(f, "fitness:{}", limit),
            CacheKey::Scrobbles(limit) => write!(f, "scrobbles:{}", limit),
            CacheKey::WatchHistory(limit) => write!(f, "watch:{}", limit),
            CacheKey::Poster(key) => write!(f, "poster:{}", key),
        }
    }
}
