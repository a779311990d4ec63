use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{AggregationRequest, FitnessSummary, ScrobbleSummary, WatchSummary},
    routes::AppState,
};

/// A request without a JSON body gets the defaults; a malformed one is rejected
fn parse_request(
    body: Result<Json<AggregationRequest>, JsonRejection>,
) -> AppResult<AggregationRequest> {
    match body {
        Ok(Json(request)) => Ok(request),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(AggregationRequest::default()),
        Err(rejection) => Err(AppError::InvalidInput(rejection.body_text())),
    }
}

/// Handler for the fitness summary endpoint
pub async fn fitness(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<AggregationRequest>, JsonRejection>,
) -> AppResult<Json<FitnessSummary>> {
    let request = parse_request(body)?;
    tracing::info!(
        request_id = %request_id,
        force_refresh = request.force_refresh,
        limit = ?request.limit,
        "Processing fitness request"
    );

    let summary = state.fitness.get_summary(request).await?;
    Ok(Json(summary))
}

/// Handler for the scrobbles endpoint
pub async fn scrobbles(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<AggregationRequest>, JsonRejection>,
) -> AppResult<Json<ScrobbleSummary>> {
    let request = parse_request(body)?;
    tracing::info!(
        request_id = %request_id,
        force_refresh = request.force_refresh,
        limit = ?request.limit,
        "Processing scrobbles request"
    );

    let summary = state.scrobbles.get_summary(request).await?;
    Ok(Json(summary))
}

/// Handler for the watch history endpoint
pub async fn watch_history(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<AggregationRequest>, JsonRejection>,
) -> AppResult<Json<WatchSummary>> {
    let request = parse_request(body)?;
    tracing::info!(
        request_id = %request_id,
        force_refresh = request.force_refresh,
        limit = ?request.limit,
        "Processing watch history request"
    );

    let summary = state.watch_history.get_summary(request).await?;

    tracing::info!(
        request_id = %request_id,
        items = summary.items.len(),
        "Watch history completed"
    );

    Ok(Json(summary))
}
