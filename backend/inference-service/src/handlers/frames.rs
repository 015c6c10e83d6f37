use actix_web::{post, web, HttpResponse};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::{ErrorResponse, FrameAcceptedResponse};
use crate::services::InferenceState;

/// POST /api/v1/frames
///
/// Body is one encoded camera frame (JPEG or PNG). The frame is buffered
/// as-is; decoding happens only when it is picked for prediction.
#[utoipa::path(
    post,
    path = "/api/v1/frames",
    request_body(content = Vec<u8>, content_type = "image/jpeg", description = "Encoded frame"),
    responses(
        (status = 202, description = "Frame queued", body = FrameAcceptedResponse),
        (status = 400, description = "Empty payload", body = ErrorResponse),
        (status = 413, description = "Frame larger than MAX_FRAME_BYTES")
    ),
    tag = "Frames"
)]
#[post("/api/v1/frames")]
pub async fn post_frame(
    state: web::Data<Arc<InferenceState>>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let size = body.len();
    let dropped = state.push_frame(body)?;
    let queue_len = state.queue().len();
    debug!(size, queue_len, dropped, "frame queued");

    Ok(HttpResponse::Accepted().json(FrameAcceptedResponse {
        image_queue_size: u32::try_from(queue_len).unwrap_or(u32::MAX),
        dropped,
    }))
}
