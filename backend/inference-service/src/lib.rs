pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod openapi;
pub mod services;
pub mod swagger;

pub use config::Config;
pub use services::{InferenceState, PredictionLoop};

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::AppError;

/// Register the JSON API, health probes and the metrics endpoint.
///
/// Expects `web::Data<Arc<InferenceState>>` to be installed by the caller.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/health", web::get().to(|| async { "OK" }))
        .route("/metrics", web::get().to(metrics::serve_metrics))
        .service(handlers::health_live)
        .service(handlers::health_ready)
        .service(handlers::get_state)
        .service(handlers::put_prediction_interval)
        .service(handlers::post_frame)
        .service(handlers::get_latest_prediction)
        .service(handlers::list_predictions);
}

/// Malformed bodies get the same `ErrorResponse` shape as handler errors.
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    if err.status_code() == StatusCode::PAYLOAD_TOO_LARGE {
        return err.into();
    }
    AppError::Validation(err.to_string()).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}

/// Serve the OpenAPI document and the Swagger UI.
///
/// With `resources` the UI is the bundle read from disk, otherwise the one
/// embedded in `utoipa-swagger-ui`.
pub fn configure_docs(
    doc: utoipa::openapi::OpenApi,
    resources: Option<swagger::SwaggerResources>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| match resources {
        Some(resources) => {
            let body = web::Data::new(doc);
            cfg.app_data(body).route(
                swagger::OPENAPI_JSON_PATH,
                web::get().to(openapi_json),
            );
            swagger::configure(resources)(cfg);
        }
        None => {
            cfg.service(
                SwaggerUi::new("/swagger/ui/{_:.*}").url(swagger::OPENAPI_JSON_PATH, doc),
            );
        }
    }
}

async fn openapi_json(doc: web::Data<utoipa::openapi::OpenApi>) -> error::Result<HttpResponse> {
    let body = serde_json::to_string(&**doc)?;

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}
