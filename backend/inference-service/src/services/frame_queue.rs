use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded FIFO of encoded camera frames.
///
/// Holds at most `2 * min_len` frames; the oldest are evicted first.
/// Prediction only starts once `min_len` frames are buffered so detections
/// always have surrounding context frames to hand downstream.
pub struct FrameQueue {
    frames: Mutex<VecDeque<Bytes>>,
    min_len: usize,
    max_len: usize,
}

impl FrameQueue {
    pub fn new(min_len: usize) -> Self {
        let min_len = min_len.max(1);
        let max_len = min_len * 2;
        Self {
            frames: Mutex::new(VecDeque::with_capacity(max_len)),
            min_len,
            max_len,
        }
    }

    /// Append a frame, evicting from the front while full.
    ///
    /// Returns `true` if at least one frame was evicted.
    pub fn push(&self, frame: Bytes) -> bool {
        let mut frames = self.lock();
        let mut dropped = false;
        while frames.len() >= self.max_len {
            frames.pop_front();
            dropped = true;
        }
        frames.push_back(frame);
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.len() >= self.min_len
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Copy of the buffered frames in arrival order, or `None` while fewer
    /// than `min_len` frames are available.
    pub fn snapshot(&self) -> Option<Vec<Bytes>> {
        let frames = self.lock();
        if frames.len() < self.min_len {
            return None;
        }
        Some(frames.iter().cloned().collect())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Bytes>> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
