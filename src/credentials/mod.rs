/// OAuth credentials for the watch-history provider and where they live
///
/// The canonical copy is kept in an external key/value singleton. Callers
/// read it once per aggregation, thread the working copy through their
/// upstream calls, and write back only after a successful refresh.
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};

pub mod directus;

pub use directus::{DirectusCredentialStore, UnconfiguredCredentialStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Accepts RFC 3339 or an offset-less timestamp (read as UTC); anything else is `None`
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok());
    if naive.is_none() && !raw.is_empty() {
        tracing::warn!(value = %raw, "Unrecognized credential expiry, ignoring it");
    }

    Ok(naive.map(|at| at.and_utc()))
}

impl Credentials {
    /// Fails with a configuration error when either token is blank
    pub fn ensure_complete(&self) -> AppResult<()> {
        if self.access_token.trim().is_empty() {
            return Err(AppError::Configuration(
                "Watch-history access token not configured".to_string(),
            ));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(AppError::Configuration(
                "Watch-history refresh token not configured".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Persistence for the single credentials record
///
/// Writes must replace every field at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn read(&self) -> AppResult<Credentials>;

    async fn write(&self, credentials: Credentials) -> AppResult<()>;
}
