//! CNN ensemble classification of camera frames (tract ONNX runtime).

use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, info};

/// Type alias for the optimized tract model
type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("no models configured")]
    NoModels,

    #[error("model file not found: {0}")]
    ModelNotFound(String),

    #[error("failed to load model {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Scores a single encoded frame. Implementations must be cheap to share
/// between the HTTP workers and the prediction loop.
pub trait FrameClassifier: Send + Sync {
    /// Identifiers of the models that take part in a prediction
    fn model_ids(&self) -> &[String];

    /// Probability in [0, 1] that the frame contains the target
    fn classify(&self, frame: &[u8]) -> Result<f32, ClassifierError>;

    /// Comma-separated model IDs as exposed in `modelIds`
    fn model_ids_joined(&self) -> String {
        self.model_ids().join(",")
    }
}

struct LoadedModel {
    id: String,
    plan: TractModel,
}

/// Ensemble of binary image classifiers; the prediction is the mean score.
pub struct OnnxEnsemble {
    models: Vec<LoadedModel>,
    ids: Vec<String>,
    input_size: (u32, u32),
}

impl OnnxEnsemble {
    /// Load every model in `paths`. Input is expected as NHWC f32
    /// `[1, height, width, 3]`.
    pub fn load(paths: &[PathBuf], input_size: (u32, u32)) -> Result<Self, ClassifierError> {
        if paths.is_empty() {
            return Err(ClassifierError::NoModels);
        }

        let mut models = Vec::with_capacity(paths.len());
        for path in paths {
            let plan = Self::load_tract_model(path, input_size)?;
            let id = model_id(path);
            info!(model_id = %id, path = %path.display(), "ONNX model loaded");
            models.push(LoadedModel { id, plan });
        }

        let ids = models.iter().map(|m| m.id.clone()).collect();
        Ok(Self {
            models,
            ids,
            input_size,
        })
    }

    fn load_tract_model(path: &Path, (width, height): (u32, u32)) -> Result<TractModel, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::ModelNotFound(path.display().to_string()));
        }

        let load_err = |e: TractError| ClassifierError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_err)?
            .with_input_fact(0, f32::fact([1, height as usize, width as usize, 3]).into())
            .map_err(load_err)?
            .into_optimized()
            .map_err(load_err)?
            .into_runnable()
            .map_err(load_err)
    }

    fn run_model(model: &LoadedModel, input: &Tensor) -> Result<f32, ClassifierError> {
        let result = model
            .plan
            .run(tvec!(input.clone().into()))
            .map_err(|e| ClassifierError::Inference(format!("{}: {}", model.id, e)))?;

        let output = result[0]
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("{}: {}", model.id, e)))?;

        let score = output.iter().next().copied().ok_or_else(|| {
            ClassifierError::Inference(format!("{}: empty output tensor", model.id))
        })?;

        Ok(score.clamp(0.0, 1.0))
    }
}

impl FrameClassifier for OnnxEnsemble {
    fn model_ids(&self) -> &[String] {
        &self.ids
    }

    fn classify(&self, frame: &[u8]) -> Result<f32, ClassifierError> {
        let input = preprocess(frame, self.input_size)?;

        let mut total = 0.0f32;
        for model in &self.models {
            let score = Self::run_model(model, &input)?;
            debug!(model_id = %model.id, score, "model scored frame");
            total += score;
        }

        Ok(total / self.models.len() as f32)
    }
}

/// Decode an encoded frame and lay it out as an NHWC tensor of raw 0..255
/// values. Scaling is part of the exported models.
pub fn preprocess(frame: &[u8], (width, height): (u32, u32)) -> Result<Tensor, ClassifierError> {
    let img = image::load_from_memory(frame).map_err(|e| ClassifierError::Decode(e.to_string()))?;
    let rgb = img
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    let array = tract_ndarray::Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, y, x, c)| rgb.get_pixel(x as u32, y as u32)[c] as f32,
    );
    Ok(array.into())
}

/// Model ID is the file stem, e.g. `models/cnn-v3.onnx` -> `cnn-v3`.
fn model_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
