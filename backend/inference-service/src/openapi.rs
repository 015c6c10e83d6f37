/// OpenAPI documentation for the inference service
use utoipa::openapi::{
    ContactBuilder, InfoBuilder, LicenseBuilder, OpenApi as OpenApiDocument, ServerBuilder,
};
use utoipa::OpenApi;

use crate::handlers;
use crate::models::{
    ErrorResponse, FrameAcceptedResponse, InternalStateDto, PredictionIntervalRequest,
    PredictionRecord,
};

pub const TITLE: &str = "User entity service";
pub const DESCRIPTION: &str = "CRUD API Example project with swagger docs";
pub const VERSION: &str = "1.0";
pub const CONTACT_NAME: &str = "Alex Kong";
pub const CONTACT_URL: &str = "https://github.com/alex-lt-kong/";
pub const LICENSE_NAME: &str = "Apache License, Version 2.0";
pub const LICENSE_URL: &str = "http://www.apache.org/licenses/LICENSE-2.0";

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::state::get_state,
        handlers::state::put_prediction_interval,
        handlers::frames::post_frame,
        handlers::predictions::get_latest_prediction,
        handlers::predictions::list_predictions,
        handlers::health::health_live,
        handlers::health::health_ready,
    ),
    components(schemas(
        InternalStateDto,
        PredictionIntervalRequest,
        FrameAcceptedResponse,
        PredictionRecord,
        ErrorResponse,
    )),
    tags(
        (name = "State", description = "Inference service state"),
        (name = "Frames", description = "Frame ingestion"),
        (name = "Predictions", description = "Prediction results"),
        (name = "Health", description = "Service health checks"),
    )
)]
pub struct ApiDoc;

/// Full OpenAPI document advertised at `advertised_host`.
///
/// Descriptive metadata is fixed; the only input is the base URL listed as
/// the single server entry.
pub fn doc(advertised_host: &str) -> OpenApiDocument {
    let mut doc = ApiDoc::openapi();

    doc.info = InfoBuilder::new()
        .title(TITLE)
        .description(Some(DESCRIPTION))
        .version(VERSION)
        .contact(Some(
            ContactBuilder::new()
                .name(Some(CONTACT_NAME))
                .url(Some(CONTACT_URL))
                .build(),
        ))
        .license(Some(
            LicenseBuilder::new()
                .name(LICENSE_NAME)
                .url(Some(LICENSE_URL))
                .build(),
        ))
        .build();

    doc.servers = Some(vec![ServerBuilder::new()
        .url(advertised_host)
        .description(Some(format!("server on {}", advertised_host)))
        .build()]);

    doc
}
