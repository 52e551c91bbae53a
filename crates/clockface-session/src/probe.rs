//! Face probes: where a session gets its per-cycle detection from.
//!
//! The detector itself is external. A probe either wraps a synchronous
//! detector callback ([`BlockingProbe`], run on the blocking pool) or replays
//! recorded detections ([`ReplayProbe`]).

use clockface_core::Detection;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("detector error: {0}")]
    Detector(String),
    #[error("no more frames")]
    Exhausted,
    #[error("detector task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One detection per call: `Ok(None)` means no face in the frame.
pub trait FaceProbe: Send + 'static {
    fn detect(&mut self) -> impl Future<Output = Result<Option<Detection>, ProbeError>> + Send;
}

/// Runs a synchronous detector callback on tokio's blocking pool.
///
/// Calls are serialized: the callback is never entered concurrently, even if
/// a session abandons an in-flight call.
pub struct BlockingProbe<F> {
    detector: Arc<Mutex<F>>,
}

impl<F> BlockingProbe<F>
where
    F: FnMut() -> Result<Option<Detection>, ProbeError> + Send + 'static,
{
    pub fn new(detector: F) -> Self {
        Self {
            detector: Arc::new(Mutex::new(detector)),
        }
    }
}

impl<F> FaceProbe for BlockingProbe<F>
where
    F: FnMut() -> Result<Option<Detection>, ProbeError> + Send + 'static,
{
    fn detect(&mut self) -> impl Future<Output = Result<Option<Detection>, ProbeError>> + Send {
        let detector = Arc::clone(&self.detector);
        async move {
            tokio::task::spawn_blocking(move || {
                let mut detect = detector
                    .lock()
                    .map_err(|_| ProbeError::Detector("detector poisoned by an earlier panic".into()))?;
                (&mut *detect)()
            })
            .await?
        }
    }
}

/// Replays a fixed sequence of detections, then reports [`ProbeError::Exhausted`].
#[derive(Debug, Clone, Default)]
pub struct ReplayProbe {
    frames: VecDeque<Option<Detection>>,
}

impl ReplayProbe {
    pub fn new(frames: impl IntoIterator<Item = Option<Detection>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Parse a JSON array of detections; `null` entries are empty frames.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let frames: Vec<Option<Detection>> = serde_json::from_str(json)?;
        Ok(Self::new(frames))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FaceProbe for ReplayProbe {
    fn detect(&mut self) -> impl Future<Output = Result<Option<Detection>, ProbeError>> + Send {
        std::future::ready(self.frames.pop_front().ok_or(ProbeError::Exhausted))
    }
}
