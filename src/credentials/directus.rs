use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    services::http::{HttpRequest, HttpTransport},
};

use super::{CredentialStore, Credentials};

const COLLECTION: &str = "trakt_tokens";

#[derive(Deserialize)]
struct SingletonResponse {
    data: Option<Credentials>,
}

/// Credentials kept in a Directus singleton collection
pub struct DirectusCredentialStore {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    access_token: String,
}

impl DirectusCredentialStore {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: String, access_token: String) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/items/{}", self.base_url, COLLECTION)
    }
}

#[async_trait::async_trait]
impl CredentialStore for DirectusCredentialStore {
    async fn read(&self) -> AppResult<Credentials> {
        let response = self
            .transport
            .send(HttpRequest::get(self.endpoint()).bearer(&self.access_token))
            .await?
            .error_for_status()?;

        let singleton: SingletonResponse = response.json()?;
        singleton.data.ok_or_else(|| {
            AppError::Configuration("Credential store holds no watch-history tokens".to_string())
        })
    }

    async fn write(&self, credentials: Credentials) -> AppResult<()> {
        let body = json!({
            "access_token": credentials.access_token,
            "refresh_token": credentials.refresh_token,
            "expires_at": credentials.expires_at,
            "token_type": credentials.token_type,
            "scope": credentials.scope,
        });

        self.transport
            .send(
                HttpRequest::patch(self.endpoint())
                    .bearer(&self.access_token)
                    .json(body),
            )
            .await?
            .error_for_status()?;

        tracing::info!(collection = COLLECTION, "Persisted refreshed credentials");
        Ok(())
    }
}

/// Store used when no Directus instance is configured
pub struct UnconfiguredCredentialStore;

#[async_trait::async_trait]
impl CredentialStore for UnconfiguredCredentialStore {
    async fn read(&self) -> AppResult<Credentials> {
        Err(AppError::Configuration(
            "Credential store (DIRECTUS_URL / DIRECTUS_ACCESS_TOKEN) not configured".to_string(),
        ))
    }

    async fn write(&self, _credentials: Credentials) -> AppResult<()> {
        Err(AppError::Configuration(
            "Credential store (DIRECTUS_URL / DIRECTUS_ACCESS_TOKEN) not configured".to_string(),
        ))
    }
}
