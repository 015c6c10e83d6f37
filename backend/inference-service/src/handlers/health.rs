use actix_web::{get, web, HttpResponse};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::services::InferenceState;

#[utoipa::path(
    get,
    path = "/api/v1/health/live",
    responses((status = 200, description = "Process is up")),
    tag = "Health"
)]
#[get("/api/v1/health/live")]
pub async fn health_live() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Ready once the model ensemble is loaded.
#[utoipa::path(
    get,
    path = "/api/v1/health/ready",
    responses(
        (status = 200, description = "Models loaded"),
        (status = 503, description = "No model available")
    ),
    tag = "Health"
)]
#[get("/api/v1/health/ready")]
pub async fn health_ready(state: web::Data<Arc<InferenceState>>) -> Result<HttpResponse> {
    if state.classifier().model_ids().is_empty() {
        return Err(AppError::ServiceUnavailable("no model loaded".to_string()));
    }
    Ok(HttpResponse::Ok().body("OK"))
}
