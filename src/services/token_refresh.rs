use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    credentials::{CredentialStore, Credentials},
    error::{AppError, AppResult},
    services::http::{HttpRequest, HttpResponse, HttpTransport},
};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Exchanges refresh tokens against the provider's OAuth endpoint
///
/// A call made through [`TokenRefresher::send_authorized`] goes through at
/// most one refresh: `Valid` → 401 → refresh → retry once. A second 401 is
/// final so a revoked refresh token cannot loop.
pub struct TokenRefresher {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn CredentialStore>,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl TokenRefresher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        api_url: &str,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            transport,
            store,
            token_url: format!("{}/oauth/token", api_url.trim_end_matches('/')),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Trades the refresh token for a new pair and persists it
    ///
    /// A failed exchange means the stored credentials can no longer be used
    /// and is reported as a configuration error. A failed write is only
    /// logged: the new pair is still returned for the caller's retry.
    pub async fn refresh(&self, current: &Credentials) -> AppResult<Credentials> {
        let body = json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "grant_type": "refresh_token",
            "redirect_uri": self.redirect_uri,
            "refresh_token": current.refresh_token,
        });

        let response = self
            .transport
            .send(
                HttpRequest::post(&self.token_url)
                    .header("Content-Type", "application/json")
                    .json(body),
            )
            .await
            .map_err(|e| {
                AppError::Configuration(format!("Unable to refresh watch-history token: {}", e))
            })?;

        if !response.is_success() {
            tracing::error!(
                status = response.status,
                body = %response.body,
                "Token refresh rejected"
            );
            return Err(AppError::Configuration(format!(
                "Watch-history token refresh rejected with status {}; re-authorize the application",
                response.status
            )));
        }

        let tokens: TokenResponse = response.json().map_err(|e| {
            AppError::Configuration(format!("Malformed token refresh response: {}", e))
        })?;

        let refreshed = Credentials {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: Some(Utc::now() + Duration::seconds(tokens.expires_in)),
            token_type: tokens.token_type,
            scope: tokens.scope,
        };

        // The exchange already spent the old refresh token, so keep going with the new pair
        if let Err(e) = self.store.write(refreshed.clone()).await {
            tracing::error!(error = %e, "Failed to persist refreshed watch-history token");
        }

        tracing::info!(expires_at = ?refreshed.expires_at, "Watch-history token refreshed");

        Ok(refreshed)
    }

    /// Sends the request built for the current access token, refreshing once on 401
    ///
    /// Returns the response together with the credentials that produced it
    /// so the caller can hand them to its next upstream call. Non-401 error
    /// statuses are returned untouched for the caller to classify.
    pub async fn send_authorized<F>(
        &self,
        credentials: Credentials,
        build: F,
    ) -> AppResult<(HttpResponse, Credentials)>
    where
        F: Fn(&str) -> HttpRequest + Send + Sync,
    {
        let response = self
            .transport
            .send(build(&credentials.access_token))
            .await?;

        if response.status != 401 {
            return Ok((response, credentials));
        }

        tracing::info!("Access token rejected by upstream, attempting refresh");

        let refreshed = self.refresh(&credentials).await?;
        let retried = self.transport.send(build(&refreshed.access_token)).await?;

        if retried.status == 401 {
            tracing::error!("Upstream rejected freshly refreshed token");
            return Err(AppError::upstream(401, retried.body));
        }

        Ok((retried, refreshed))
    }
}
