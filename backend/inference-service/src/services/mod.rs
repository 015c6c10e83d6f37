pub mod classifier;
pub mod frame_queue;
pub mod history;
pub mod latency;
pub mod pipeline;

pub use classifier::{ClassifierError, FrameClassifier, OnnxEnsemble};
pub use frame_queue::FrameQueue;
pub use history::PredictionHistory;
pub use latency::LatencyTracker;
pub use pipeline::{
    InferenceState, PassOutcome, PredictionLoop, PredictionLoopConfig, PREDICTION_FRAME_INDEX,
};
