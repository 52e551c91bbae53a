//! Capture session: polls a [`FaceProbe`] on a fixed interval and feeds each
//! detection through a [`FramePipeline`] until an identity is confirmed.
//!
//! The session runs as one tokio task that owns all per-session state. The
//! caller holds a [`SessionHandle`] with an outcome stream and a control
//! channel. Cycles never overlap: the probe call is awaited inline, and ticks
//! missed while it runs are skipped. A reset or stop that arrives while the
//! probe is in flight drops that detection unprocessed.

use crate::config::SessionConfig;
use crate::probe::{FaceProbe, ProbeError};
use clockface_core::{CaptureMode, EnrolledFace, FrameOutcome, FramePipeline};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),
    #[error("session task exited")]
    ChannelClosed,
    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The final (confirmed) outcome. In enrollment it carries the descriptor.
    Confirmed(FrameOutcome),
    /// Stopped by the caller, or the caller stopped listening.
    Stopped,
    /// The probe ran out of frames.
    Exhausted,
}

/// Messages from the handle to the session task.
#[derive(Debug)]
enum Control {
    Reset,
    Stop,
}

/// Caller's side of a running session.
pub struct SessionHandle {
    control: mpsc::Sender<Control>,
    outcomes: mpsc::Receiver<FrameOutcome>,
    task: JoinHandle<Result<SessionEnd, SessionError>>,
}

impl SessionHandle {
    /// Next per-frame outcome, or `None` once the session has ended.
    pub async fn next_outcome(&mut self) -> Option<FrameOutcome> {
        self.outcomes.recv().await
    }

    /// Abort the current streak without ending the session.
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.control
            .send(Control::Reset)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Stop polling and discard any in-flight detection.
    pub async fn stop(self) -> Result<SessionEnd, SessionError> {
        let Self {
            control,
            outcomes,
            task,
        } = self;
        // The task may already have ended on its own.
        let _ = control.send(Control::Stop).await;
        drop(outcomes);
        task.await?
    }

    /// Wait for the session to end on its own, discarding unread outcomes.
    pub async fn wait(mut self) -> Result<SessionEnd, SessionError> {
        while self.outcomes.recv().await.is_some() {}
        self.task.await?
    }
}

/// Start a capture session on the current tokio runtime.
///
/// `roster` is shared read-only for the session's lifetime.
pub fn spawn_session<P: FaceProbe>(
    probe: P,
    roster: Arc<[EnrolledFace]>,
    mode: CaptureMode,
    config: &SessionConfig,
) -> SessionHandle {
    let (control_tx, control_rx) = mpsc::channel(4);
    let (outcome_tx, outcome_rx) = mpsc::channel(config.outcome_buffer.max(1));
    let pipeline = FramePipeline::new(mode, config.thresholds, config.required_matches);

    let task = tokio::spawn(run_session(
        probe,
        roster,
        pipeline,
        config.poll_interval(),
        control_rx,
        outcome_tx,
    ));

    SessionHandle {
        control: control_tx,
        outcomes: outcome_rx,
        task,
    }
}

async fn run_session<P: FaceProbe>(
    mut probe: P,
    roster: Arc<[EnrolledFace]>,
    mut pipeline: FramePipeline,
    period: Duration,
    mut control: mpsc::Receiver<Control>,
    outcomes: mpsc::Sender<FrameOutcome>,
) -> Result<SessionEnd, SessionError> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        mode = ?pipeline.mode(),
        roster = roster.len(),
        required = pipeline.tracker().required(),
        interval_ms = period.as_millis() as u64,
        "capture session started"
    );

    let end = loop {
        tokio::select! {
            biased;
            cmd = control.recv() => match cmd {
                Some(Control::Reset) => {
                    tracing::debug!("session reset");
                    pipeline.reset();
                    continue;
                }
                Some(Control::Stop) | None => break SessionEnd::Stopped,
            },
            _ = ticker.tick() => {}
        }

        let detection = tokio::select! {
            biased;
            cmd = control.recv() => match cmd {
                Some(Control::Reset) => {
                    tracing::debug!("session reset; discarding in-flight detection");
                    pipeline.reset();
                    continue;
                }
                Some(Control::Stop) | None => {
                    tracing::debug!("session stopped; discarding in-flight detection");
                    break SessionEnd::Stopped;
                }
            },
            result = probe.detect() => match result {
                Ok(detection) => detection,
                Err(ProbeError::Exhausted) => break SessionEnd::Exhausted,
                Err(e) => {
                    tracing::error!(error = %e, "probe failed; ending session");
                    return Err(e.into());
                }
            },
        };

        let outcome = pipeline.process(detection.as_ref(), &roster);
        let confirmed = outcome.is_confirmed();
        if outcomes.send(outcome.clone()).await.is_err() {
            tracing::debug!("outcome receiver dropped");
            break SessionEnd::Stopped;
        }
        if confirmed {
            break SessionEnd::Confirmed(outcome);
        }
    };

    match &end {
        SessionEnd::Confirmed(outcome) => tracing::info!(
            employee_id = outcome.employee_id.as_deref().unwrap_or_default(),
            "capture session confirmed"
        ),
        SessionEnd::Stopped => tracing::info!("capture session stopped"),
        SessionEnd::Exhausted => tracing::info!("capture session ran out of frames"),
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{BlockingProbe, ReplayProbe};
    use clockface_core::fixtures::{descriptor, good_detection};
    use clockface_core::{Detection, FrameStatus, Rejection};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn roster() -> Arc<[EnrolledFace]> {
        vec![
            EnrolledFace {
                employee_id: "E1".into(),
                descriptor: descriptor(0.0),
            },
            EnrolledFace {
                employee_id: "E2".into(),
                descriptor: descriptor(1.0),
            },
        ]
        .into()
    }

    fn config(required_matches: u32) -> SessionConfig {
        SessionConfig {
            required_matches,
            ..SessionConfig::default()
        }
    }

    /// Probe that takes `delay` per call and records each completed call window.
    struct SlowProbe {
        delay: Duration,
        limit: usize,
        detection: Detection,
        calls: Arc<AtomicUsize>,
        windows: Arc<Mutex<Vec<(Instant, Instant)>>>,
    }

    impl SlowProbe {
        fn new(delay: Duration, limit: usize) -> Self {
            Self {
                delay,
                limit,
                detection: good_detection(descriptor(0.0)),
                calls: Arc::new(AtomicUsize::new(0)),
                windows: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FaceProbe for SlowProbe {
        fn detect(&mut self) -> impl Future<Output = Result<Option<Detection>, ProbeError>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let (delay, limit) = (self.delay, self.limit);
            let detection = self.detection.clone();
            let windows = Arc::clone(&self.windows);
            async move {
                if n > limit {
                    return Err(ProbeError::Exhausted);
                }
                let start = Instant::now();
                tokio::time::sleep(delay).await;
                windows.lock().unwrap().push((start, Instant::now()));
                Ok(Some(detection))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_on_first_frame() {
        let probe = ReplayProbe::new([Some(good_detection(descriptor(0.0)))]);
        let mut handle = spawn_session(probe, roster(), CaptureMode::Verify, &config(1));

        let outcome = handle.next_outcome().await.unwrap();
        assert_eq!(outcome.status, FrameStatus::Confirmed);
        assert_eq!(outcome.employee_id.as_deref(), Some("E1"));

        match handle.wait().await.unwrap() {
            SessionEnd::Confirmed(o) => assert_eq!(o.employee_id.as_deref(), Some("E1")),
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_face_breaks_streak() {
        let good = || Some(good_detection(descriptor(0.0)));
        let probe = ReplayProbe::new([good(), good(), None, good(), good(), good()]);
        let mut handle = spawn_session(probe, roster(), CaptureMode::Verify, &config(3));

        let mut seen = Vec::new();
        while let Some(o) = handle.next_outcome().await {
            seen.push((o.status, o.streak));
        }
        assert_eq!(
            seen,
            vec![
                (FrameStatus::Progressing, Some(1)),
                (FrameStatus::Progressing, Some(2)),
                (FrameStatus::Rejected, None),
                (FrameStatus::Progressing, Some(1)),
                (FrameStatus::Progressing, Some(2)),
                (FrameStatus::Confirmed, Some(3)),
            ]
        );
        assert!(matches!(handle.wait().await.unwrap(), SessionEnd::Confirmed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval_until_exhausted() {
        let probe = ReplayProbe::new([None, None, None]);
        let mut handle = spawn_session(probe, roster(), CaptureMode::Verify, &config(1));

        let mut times = Vec::new();
        while let Some(o) = handle.next_outcome().await {
            assert_eq!(o.rejection, Some(Rejection::NoFace));
            times.push(Instant::now());
        }
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(500));
        assert!(times[2] - times[1] >= Duration::from_millis(500));
        assert_eq!(handle.wait().await.unwrap(), SessionEnd::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_never_overlaps() {
        let probe = SlowProbe::new(Duration::from_millis(1200), 3);
        let windows = Arc::clone(&probe.windows);
        // Never confirms, so every probe call runs.
        let mut handle = spawn_session(probe, roster(), CaptureMode::Verify, &config(100));

        let mut count = 0;
        while let Some(o) = handle.next_outcome().await {
            assert_eq!(o.status, FrameStatus::Progressing);
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(handle.wait().await.unwrap(), SessionEnd::Exhausted);

        let windows = windows.lock().unwrap();
        assert_eq!(windows.len(), 3);
        for pair in windows.windows(2) {
            assert!(pair[1].0 >= pair[0].1, "probe calls overlapped");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_discards_in_flight_detection() {
        let probe = SlowProbe::new(Duration::from_secs(1), 10);
        let calls = Arc::clone(&probe.calls);
        let windows = Arc::clone(&probe.windows);
        let mut handle = spawn_session(probe, roster(), CaptureMode::Verify, &config(1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        handle.reset().await.unwrap();

        let outcome = handle.next_outcome().await.unwrap();
        assert!(outcome.is_confirmed());
        // The first call was abandoned; confirmation came from the second.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(windows.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_detection() {
        let probe = SlowProbe::new(Duration::from_secs(60), 10);
        let calls = Arc::clone(&probe.calls);
        let windows = Arc::clone(&probe.windows);
        let handle = spawn_session(probe, roster(), CaptureMode::Verify, &config(1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.stop().await.unwrap(), SessionEnd::Stopped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(windows.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrollment_returns_descriptor() {
        let probe = ReplayProbe::new([Some(good_detection(descriptor(0.3)))]);
        let mode = CaptureMode::Enroll {
            employee_id: "E9".into(),
        };
        let handle = spawn_session(probe, Arc::from(Vec::new()), mode, &config(1));

        match handle.wait().await.unwrap() {
            SessionEnd::Confirmed(o) => {
                assert_eq!(o.employee_id.as_deref(), Some("E9"));
                assert_eq!(o.descriptor, Some(descriptor(0.3)));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_error_surfaces_as_session_error() {
        let probe = BlockingProbe::new(|| Err(ProbeError::Detector("model failed to load".into())));
        let handle = spawn_session(probe, roster(), CaptureMode::Verify, &config(1));

        match handle.wait().await {
            Err(SessionError::Probe(ProbeError::Detector(msg))) => {
                assert_eq!(msg, "model failed to load")
            }
            other => panic!("expected probe error, got {other:?}"),
        }
    }
}
