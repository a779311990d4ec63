use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::marketplace::{FetchResult, ListingQuery},
    routes::AppState,
    services::marketplace::{required_percent, DynamicConstants},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdQuery {
    pub price: f64,
    pub base_price: Option<f64>,
    pub min_percent: Option<f64>,
    pub max_percent: Option<f64>,
    pub max_price: Option<f64>,
}

impl ThresholdQuery {
    fn constants(&self) -> DynamicConstants {
        let defaults = DynamicConstants::default();
        DynamicConstants {
            base_price: self.base_price.unwrap_or(defaults.base_price),
            min_percent: self.min_percent.unwrap_or(defaults.min_percent),
            max_percent: self.max_percent.unwrap_or(defaults.max_percent),
            max_price: self.max_price.unwrap_or(defaults.max_price),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdResponse {
    pub price: f64,
    pub required_percent: f64,
    pub constants: DynamicConstants,
}

/// Handler for the listings fetch endpoint
///
/// The outcome, including rate limiting and exhausted routes, is reported
/// in the body's `status` rather than the HTTP status.
pub async fn listings(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(query): Json<ListingQuery>,
) -> AppResult<Json<FetchResult>> {
    if query.limit == 0 {
        return Err(AppError::InvalidInput("limit must be positive".to_string()));
    }

    tracing::info!(
        request_id = %request_id,
        proxies = query.proxies.len(),
        sort_by = query.sort_by.as_str(),
        "Processing listings request"
    );

    let result = state.listings.fetch(&query).await;

    tracing::info!(
        request_id = %request_id,
        status = result.status,
        listings = result.listings.len(),
        proxy = ?result.proxy_used,
        "Listings request completed"
    );

    Ok(Json(result))
}

/// Handler for the required-discount endpoint
pub async fn threshold(Query(params): Query<ThresholdQuery>) -> AppResult<Json<ThresholdResponse>> {
    if !params.price.is_finite() || params.price < 0.0 {
        return Err(AppError::InvalidInput(
            "price must be a non-negative number".to_string(),
        ));
    }

    let constants = params.constants();
    if constants.min_percent > constants.max_percent {
        return Err(AppError::InvalidInput(
            "minPercent must not exceed maxPercent".to_string(),
        ));
    }

    Ok(Json(ThresholdResponse {
        price: params.price,
        required_percent: required_percent(params.price, &constants),
        constants,
    }))
}
