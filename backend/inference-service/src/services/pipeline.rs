//! Shared inference state and the background prediction loop.

use bytes::Bytes;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tracing::{error, info, warn};

use super::classifier::FrameClassifier;
use super::frame_queue::FrameQueue;
use super::history::PredictionHistory;
use super::latency::LatencyTracker;
use crate::config::{DetectionConfig, InferenceConfig};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{InternalStateDto, PredictionRecord};

/// Index of the frame classified in each pass. Frames before it stay in the
/// queue as lead-in context for downstream consumers.
pub const PREDICTION_FRAME_INDEX: usize = 3;

/// State shared between HTTP handlers and the prediction loop.
pub struct InferenceState {
    prediction_interval_ms: AtomicI32,
    interval_changed: Notify,
    queue: FrameQueue,
    latency: LatencyTracker,
    classifier: Arc<dyn FrameClassifier>,
    last_prediction: RwLock<Option<PredictionRecord>>,
    history: Option<PredictionHistory>,
}

impl InferenceState {
    pub fn new(config: &InferenceConfig, classifier: Arc<dyn FrameClassifier>) -> Self {
        Self {
            prediction_interval_ms: AtomicI32::new(config.prediction_interval_ms),
            interval_changed: Notify::new(),
            queue: FrameQueue::new(config.image_queue_min_len),
            latency: LatencyTracker::new(config.latency_window),
            classifier,
            last_prediction: RwLock::new(None),
            history: None,
        }
    }

    /// Persist every completed prediction to `history`.
    pub fn with_history(mut self, history: PredictionHistory) -> Self {
        self.history = Some(history);
        self
    }

    /// Point-in-time summary served by `GET /api/v1/state`.
    pub fn snapshot(&self) -> InternalStateDto {
        InternalStateDto {
            prediction_interval_ms: self.prediction_interval_ms(),
            model_ids: self.classifier.model_ids_joined(),
            image_queue_size: u32::try_from(self.queue.len()).unwrap_or(u32::MAX),
            inference_duration_stats: self.latency.percentiles(),
        }
    }

    pub fn prediction_interval_ms(&self) -> i32 {
        self.prediction_interval_ms.load(Ordering::Relaxed)
    }

    pub fn set_prediction_interval(&self, interval_ms: i32) -> Result<()> {
        if interval_ms <= 0 {
            return Err(AppError::Validation(format!(
                "predictionIntervalMs must be positive, got {}",
                interval_ms
            )));
        }
        let previous = self
            .prediction_interval_ms
            .swap(interval_ms, Ordering::Relaxed);
        self.interval_changed.notify_waiters();
        info!(previous, current = interval_ms, "prediction interval changed");
        Ok(())
    }

    /// Buffer an encoded frame. Returns whether an old frame was evicted.
    pub fn push_frame(&self, frame: Bytes) -> Result<bool> {
        if frame.is_empty() {
            return Err(AppError::Validation("frame payload is empty".to_string()));
        }
        let dropped = self.queue.push(frame);
        metrics::record_frame(dropped, self.queue.len());
        Ok(dropped)
    }

    pub fn queue(&self) -> &FrameQueue {
        &self.queue
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn classifier(&self) -> &Arc<dyn FrameClassifier> {
        &self.classifier
    }

    pub fn last_prediction(&self) -> Option<PredictionRecord> {
        self.last_prediction
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn history(&self) -> Option<&PredictionHistory> {
        self.history.as_ref()
    }

    fn store_prediction(&self, record: PredictionRecord) {
        match self.last_prediction.write() {
            Ok(mut guard) => *guard = Some(record),
            Err(poisoned) => *poisoned.into_inner() = Some(record),
        }
    }
}

/// Settings of the prediction loop that do not change at runtime.
#[derive(Clone, Debug)]
pub struct PredictionLoopConfig {
    pub detection_threshold: f32,
    pub on_detected_command: Option<String>,
    pub context_frames_dir: PathBuf,
    pub cooldown: Duration,
    pub starved_backoff: Duration,
}

impl PredictionLoopConfig {
    pub fn new(inference: &InferenceConfig, detection: &DetectionConfig) -> Self {
        Self {
            detection_threshold: inference.detection_threshold,
            on_detected_command: detection.on_detected_command.clone(),
            context_frames_dir: detection.context_frames_dir.clone(),
            cooldown: detection.cooldown,
            starved_backoff: detection.starved_backoff,
        }
    }
}

/// What a single pass of the loop did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassOutcome {
    /// Not enough frames buffered yet
    Starved(usize),
    Negative(f32),
    Detected(f32),
    Failed,
}

pub struct PredictionLoop {
    state: Arc<InferenceState>,
    config: PredictionLoopConfig,
    shutdown_rx: watch::Receiver<bool>,
    stopped: bool,
}

impl PredictionLoop {
    pub fn new(
        state: Arc<InferenceState>,
        config: PredictionLoopConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state,
            config,
            shutdown_rx,
            stopped: false,
        }
    }

    /// Run until shutdown is signalled.
    pub async fn run(mut self) {
        info!(
            models = %self.state.classifier.model_ids_joined(),
            interval_ms = self.state.prediction_interval_ms(),
            "prediction loop started"
        );

        while !self.is_shutdown() {
            match self.run_once().await {
                PassOutcome::Starved(len) => {
                    warn!(
                        queue_len = len,
                        min_len = self.state.queue.min_len(),
                        "waiting for more frames"
                    );
                    self.sleep(self.config.starved_backoff).await;
                    continue;
                }
                PassOutcome::Detected(_) => {
                    self.sleep(self.config.cooldown).await;
                }
                PassOutcome::Negative(_) | PassOutcome::Failed => {}
            }
            self.wait_prediction_interval().await;
        }

        info!("prediction loop stopped");
    }

    /// One prediction pass: classify, record, and react to a detection.
    pub async fn run_once(&self) -> PassOutcome {
        let frames = match self.state.queue.snapshot() {
            Some(frames) => frames,
            None => return PassOutcome::Starved(self.state.queue.len()),
        };
        let target = frames[PREDICTION_FRAME_INDEX.min(frames.len() - 1)].clone();

        let classifier = Arc::clone(&self.state.classifier);
        let start = Instant::now();
        let result = tokio::task::spawn_blocking(move || classifier.classify(&target)).await;
        let elapsed = start.elapsed();

        let prediction = match result {
            Ok(Ok(score)) => score,
            Ok(Err(e)) => {
                error!(error = %e, "frame classification failed");
                metrics::record_prediction(metrics::outcome::ERROR);
                return PassOutcome::Failed;
            }
            Err(e) => {
                error!(error = %e, "classification task panicked");
                metrics::record_prediction(metrics::outcome::ERROR);
                return PassOutcome::Failed;
            }
        };

        self.state.latency.record(elapsed);
        metrics::observe_inference(elapsed);
        let record = PredictionRecord {
            timestamp: Utc::now(),
            prediction,
            elapsed_time_ms: (elapsed.as_secs_f64() * 10_000.0).round() / 10.0,
            model_ids: self.state.classifier.model_ids_joined(),
        };
        self.state.store_prediction(record.clone());
        if let Some(history) = self.state.history() {
            if let Err(e) = history.insert(&record).await {
                error!(error = %e, "failed to persist prediction");
            }
        }

        if prediction > self.config.detection_threshold {
            warn!(prediction, "target detected, preparing context frames");
            metrics::record_prediction(metrics::outcome::DETECTED);
            let context = &frames[..self.state.queue.min_len().min(frames.len())];
            if let Err(e) = self.write_context_frames(context).await {
                error!(error = %e, "failed to write context frames");
            }
            self.run_on_detected().await;
            PassOutcome::Detected(prediction)
        } else {
            info!(prediction, elapsed_ms = elapsed.as_millis() as u64, "frame classified");
            metrics::record_prediction(metrics::outcome::NEGATIVE);
            PassOutcome::Negative(prediction)
        }
    }

    async fn write_context_frames(&self, frames: &[Bytes]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config.context_frames_dir).await?;
        for (i, frame) in frames.iter().enumerate() {
            let path = self.config.context_frames_dir.join(format!("frame{}.jpg", i));
            tokio::fs::write(&path, frame).await?;
        }
        Ok(())
    }

    async fn run_on_detected(&self) {
        let Some(command) = self.config.on_detected_command.as_deref() else {
            return;
        };

        info!(command, "calling downstream program");
        match tokio::process::Command::new(command)
            .current_dir(&self.config.context_frames_dir)
            .output()
            .await
        {
            Ok(output) => {
                info!(
                    status = %output.status,
                    stdout = %String::from_utf8_lossy(&output.stdout),
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "downstream program finished"
                );
            }
            Err(e) => error!(command, error = %e, "failed to run downstream program"),
        }
    }

    /// Wait out the prediction interval. A change of interval re-arms the
    /// wait with the new value minus the time already waited.
    async fn wait_prediction_interval(&mut self) {
        let started = tokio::time::Instant::now();
        let state = Arc::clone(&self.state);
        loop {
            // Registered before the interval is read so a concurrent change
            // cannot slip between the load and the wait.
            let changed = state.interval_changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let interval = Duration::from_millis(state.prediction_interval_ms().max(0) as u64);
            let remaining = interval.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(remaining) => return,
                _ = &mut changed => continue,
                res = self.shutdown_rx.changed() => {
                    self.observe_shutdown(res.is_err());
                    if self.is_shutdown() {
                        return;
                    }
                }
            }
        }
    }

    async fn sleep(&mut self, duration: Duration) {
        let deadline = tokio::time::Instant::now() + duration;
        while !self.is_shutdown() {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return,
                res = self.shutdown_rx.changed() => self.observe_shutdown(res.is_err()),
            }
        }
    }

    /// A dropped sender counts as shutdown.
    fn observe_shutdown(&mut self, sender_closed: bool) {
        if sender_closed {
            self.stopped = true;
        }
    }

    fn is_shutdown(&self) -> bool {
        self.stopped || *self.shutdown_rx.borrow()
    }
}
