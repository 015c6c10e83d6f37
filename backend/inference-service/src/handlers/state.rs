/// Service state API Handlers
///
/// Read the operational summary of the inference service and adjust the
/// prediction cadence at runtime.
use actix_web::{get, put, web, HttpResponse};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::{ErrorResponse, InternalStateDto, PredictionIntervalRequest};
use crate::services::InferenceState;

/// GET /api/v1/state
#[utoipa::path(
    get,
    path = "/api/v1/state",
    responses(
        (status = 200, description = "Current service state", body = InternalStateDto)
    ),
    tag = "State"
)]
#[get("/api/v1/state")]
pub async fn get_state(state: web::Data<Arc<InferenceState>>) -> Result<HttpResponse> {
    let snapshot = state.snapshot();
    debug!(image_queue_size = snapshot.image_queue_size, "state requested");
    Ok(HttpResponse::Ok().json(snapshot))
}

/// PUT /api/v1/state/prediction-interval
#[utoipa::path(
    put,
    path = "/api/v1/state/prediction-interval",
    request_body = PredictionIntervalRequest,
    responses(
        (status = 200, description = "Interval updated", body = InternalStateDto),
        (status = 400, description = "Interval is not positive or body is malformed", body = ErrorResponse)
    ),
    tag = "State"
)]
#[put("/api/v1/state/prediction-interval")]
pub async fn put_prediction_interval(
    state: web::Data<Arc<InferenceState>>,
    body: web::Json<PredictionIntervalRequest>,
) -> Result<HttpResponse> {
    state.set_prediction_interval(body.prediction_interval_ms)?;
    Ok(HttpResponse::Ok().json(state.snapshot()))
}
