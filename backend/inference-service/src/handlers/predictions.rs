use actix_web::{get, web, HttpResponse};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{ErrorResponse, PredictionHistoryQuery, PredictionRecord};
use crate::services::history::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use crate::services::InferenceState;

/// GET /api/v1/predictions/latest
#[utoipa::path(
    get,
    path = "/api/v1/predictions/latest",
    responses(
        (status = 200, description = "Most recent prediction", body = PredictionRecord),
        (status = 404, description = "No prediction has completed yet", body = ErrorResponse)
    ),
    tag = "Predictions"
)]
#[get("/api/v1/predictions/latest")]
pub async fn get_latest_prediction(state: web::Data<Arc<InferenceState>>) -> Result<HttpResponse> {
    let record = state
        .last_prediction()
        .ok_or_else(|| AppError::NotFound("no prediction has completed yet".to_string()))?;
    Ok(HttpResponse::Ok().json(record))
}

/// GET /api/v1/predictions
#[utoipa::path(
    get,
    path = "/api/v1/predictions",
    params(PredictionHistoryQuery),
    responses(
        (status = 200, description = "Stored predictions, newest first", body = Vec<PredictionRecord>),
        (status = 400, description = "Limit out of range", body = ErrorResponse),
        (status = 503, description = "Prediction history is not configured", body = ErrorResponse)
    ),
    tag = "Predictions"
)]
#[get("/api/v1/predictions")]
pub async fn list_predictions(
    state: web::Data<Arc<InferenceState>>,
    query: web::Query<PredictionHistoryQuery>,
) -> Result<HttpResponse> {
    let history = state
        .history()
        .ok_or_else(|| AppError::ServiceUnavailable("prediction history is disabled".to_string()))?;

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}, got {}",
            MAX_HISTORY_LIMIT, limit
        )));
    }

    let records = history.recent(limit).await?;
    Ok(HttpResponse::Ok().json(records))
}
