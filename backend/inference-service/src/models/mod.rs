//! Wire types for the inference service HTTP API.
//!
//! JSON keys are camelCase and must stay stable: external dashboards poll
//! `/api/v1/state` and parse these names directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

/// Point-in-time operational summary of the inference service.
///
/// Built fresh for every status request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InternalStateDto {
    /// Cadence, in milliseconds, at which predictions are produced
    #[serde(rename = "predictionIntervalMs")]
    pub prediction_interval_ms: i32,

    /// The IDs of the ensemble of CNN models
    #[serde(rename = "modelIds")]
    pub model_ids: String,

    /// Number of frames currently buffered for prediction
    #[serde(rename = "imageQueueSize")]
    pub image_queue_size: u32,

    /// Percentiles of time (in us) needed to infer one image
    #[serde(rename = "inferenceDurationStats")]
    pub inference_duration_stats: Vec<BTreeMap<String, f64>>,
}

/// Body of `PUT /api/v1/state/prediction-interval`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PredictionIntervalRequest {
    /// New prediction cadence in milliseconds, must be positive
    #[serde(rename = "predictionIntervalMs")]
    pub prediction_interval_ms: i32,
}

/// Response of `POST /api/v1/frames`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FrameAcceptedResponse {
    #[serde(rename = "imageQueueSize")]
    pub image_queue_size: u32,

    /// True when the oldest buffered frame was evicted to make room
    pub dropped: bool,
}

/// Outcome of a single prediction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,

    /// Ensemble mean score in [0, 1]
    pub prediction: f32,

    #[serde(rename = "elapsedTimeMs")]
    pub elapsed_time_ms: f64,

    #[serde(rename = "modelIds")]
    pub model_ids: String,
}

/// Query of `GET /api/v1/predictions`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PredictionHistoryQuery {
    /// Number of records to return, newest first (1 to 1000, default 100)
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}
