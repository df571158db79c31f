//! Recording coordinator
//!
//! Drives one camera through IDLE → ARMED → RECORDING → FINALIZING → IDLE.
//! The loop is blocking and single-threaded; other threads only read the state
//! or raise the cancel flag.

use super::edge::{Edge, EdgeDetector};
use super::error::{RecordingError, RecordingResult};
use super::naming::next_sequence_name;
use super::state::{RecorderConfig, RecorderState, RecordingMode, RecordingSession, StopReason};
use super::stop::{StopContext, StopPolicy};
use crate::capture::{AcquisitionMode, Camera, CameraSession, ConfigureReport, Frame, FramePull};
use crate::output::sidecar;
use crate::output::{FrameSink, RecordingFile};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// Waiting for the trigger
    Armed,
    /// Output file opened, frames are being written
    Started { stem: String, path: String },
    /// Frames written so far
    Progress(u64),
    /// Output file closed
    Stopped { reason: StopReason, frames: u64 },
    /// Recording attempt failed
    Error(String),
}

/// How the armed wait ended
enum StartSignal {
    /// Rising edge seen on the polled line
    Edge,
    /// The camera delivered a frame, so its hardware trigger fired
    Frame(Frame),
}

/// Owns the camera and runs recordings one at a time
pub struct RecordingCoordinator<C: Camera> {
    /// Current recorder state
    state: Arc<RwLock<RecorderState>>,

    camera: CameraSession<C>,

    sink: Box<dyn FrameSink>,

    config: RecorderConfig,

    /// Raised by the operator to abort; never cleared
    cancel: Arc<AtomicBool>,

    last_session: Option<RecordingSession>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl<C: Camera> RecordingCoordinator<C> {
    pub fn new(camera: CameraSession<C>, sink: Box<dyn FrameSink>, config: RecorderConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(RecorderState::Idle)),
            camera,
            sink,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            last_session: None,
            event_tx,
        }
    }

    /// Get the current recorder state
    pub fn state(&self) -> RecorderState {
        *self.state.read()
    }

    /// Shared view of the state for other threads
    pub fn state_handle(&self) -> Arc<RwLock<RecorderState>> {
        self.state.clone()
    }

    /// Flag that aborts an armed wait or a running recording when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraSession<C> {
        &self.camera
    }

    /// Most recent finished recording
    pub fn last_session(&self) -> Option<&RecordingSession> {
        self.last_session.as_ref()
    }

    fn set_state(&self, state: RecorderState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run one recording to completion.
    ///
    /// Returns `Ok(None)` when cancelled before the start condition fired; no
    /// file is created in that case. Whatever happens, the camera is returned
    /// to free-run and the state to `Idle` before this returns.
    pub fn record(&mut self, mode: RecordingMode) -> RecordingResult<Option<RecordingSession>> {
        if self.state() != RecorderState::Idle {
            return Err(RecordingError::AlreadyRecording);
        }

        let result = self.run(mode);

        if let Err(e) = &result {
            tracing::error!("Recording attempt failed: {}", e);
            self.emit(RecordingEvent::Error(e.to_string()));
        }

        // A failed reconfigure leaves the stream stopped.
        if self.camera.mode().is_triggered() || !self.camera.is_streaming() {
            match self.camera.reconfigure(AcquisitionMode::FreeRun) {
                Ok(_) => tracing::info!("Returned to free-run mode"),
                Err(e) => {
                    tracing::error!("Failed to restore free-run mode: {}", e);
                    self.emit(RecordingEvent::Error(format!("free-run restore failed: {e}")));
                }
            }
        }

        self.set_state(RecorderState::Idle);

        if let Ok(Some(session)) = &result {
            self.last_session = Some(session.clone());
        }
        result
    }

    fn run(&mut self, mode: RecordingMode) -> RecordingResult<Option<RecordingSession>> {
        let mut detector = EdgeDetector::new();
        let mut line_seen = false;

        let (report, first_frame) = match &mode {
            RecordingMode::Triggered { trigger, .. } => {
                self.set_state(RecorderState::Armed);
                let report = self
                    .camera
                    .reconfigure(AcquisitionMode::Triggered(trigger.clone()))
                    .map_err(RecordingError::Configuration)?
                    .clone();
                if report.acquisition_stop_armed {
                    tracing::info!("AcquisitionStop trigger configured (falling edge)");
                }
                self.emit(RecordingEvent::Armed);
                tracing::info!("Armed on {}, waiting for rising edge", trigger.line);

                match self.wait_for_start(&trigger.line, &mut detector, &mut line_seen) {
                    Some(StartSignal::Edge) => {
                        tracing::info!("Rising edge on {}, recording started", trigger.line);
                        (report, None)
                    }
                    Some(StartSignal::Frame(frame)) => {
                        tracing::info!("Trigger received (first frame), recording started");
                        (report, Some(frame))
                    }
                    None => {
                        tracing::info!("Arming cancelled");
                        return Ok(None);
                    }
                }
            }
            RecordingMode::FreeRun { .. } => {
                let report = self.camera.reconfigure(AcquisitionMode::FreeRun)?.clone();
                (report, None)
            }
        };

        self.record_frames(mode, report, detector, line_seen, first_frame)
            .map(Some)
    }

    /// Poll the line and the stream until the start condition fires
    fn wait_for_start(
        &mut self,
        line: &str,
        detector: &mut EdgeDetector,
        line_seen: &mut bool,
    ) -> Option<StartSignal> {
        let poll = self.config.poll_interval;
        loop {
            if self.is_cancelled() {
                return None;
            }
            let tick = Instant::now();

            let level = self.camera.read_trigger_line_level(line);
            *line_seen |= level.is_some();
            if detector.sample(level) == Edge::Rising {
                return Some(StartSignal::Edge);
            }

            match self.camera.pull_next_frame(poll) {
                Ok(FramePull::Frame(frame)) => {
                    detector.seed(true);
                    return Some(StartSignal::Frame(frame));
                }
                Ok(FramePull::Incomplete) => tracing::debug!("Incomplete frame while armed"),
                Ok(FramePull::Timeout) => {}
                Err(e) => tracing::debug!("Pull while armed failed: {}", e),
            }

            let spent = tick.elapsed();
            if spent < poll {
                std::thread::sleep(poll - spent);
            }
        }
    }

    fn record_frames(
        &mut self,
        mode: RecordingMode,
        report: ConfigureReport,
        mut detector: EdgeDetector,
        line_seen: bool,
        first_frame: Option<Frame>,
    ) -> RecordingResult<RecordingSession> {
        let name = next_sequence_name(&self.config.output_dir, &self.config.prefix, &self.config.extension)
            .map_err(RecordingError::Naming)?;
        let writer = self
            .sink
            .open(&name.path, self.config.frame_rate, self.config.quality)
            .map_err(|e| RecordingError::OutputOpen {
                path: name.path.clone(),
                message: e.to_string(),
            })?;
        let mut file = RecordingFile::new(name.path.clone(), writer);

        let mut session = RecordingSession::new(&name, mode);
        session.acquisition_stop_armed = report.acquisition_stop_armed;
        session.degraded_features = report.degraded.iter().map(|(f, _)| f.clone()).collect();

        let trigger_line = match &session.mode {
            RecordingMode::Triggered { trigger, .. } => Some(trigger.line.clone()),
            RecordingMode::FreeRun { .. } => None,
        };
        let policy = StopPolicy::for_mode(&session.mode, line_seen, self.config.max_consecutive_failures);

        if trigger_line.is_some() && !line_seen {
            tracing::warn!("Line status not readable; stop relies on timeouts and the safety cap");
        }
        if let Some(target) = session.target_frames {
            tracing::info!("Target: {} frames at ~{} fps", target, self.config.frame_rate);
        }
        if let Some(cap) = policy.safety_cap() {
            tracing::info!("Safety cap: {:.2}s", cap.as_secs_f64());
        }

        self.set_state(RecorderState::Recording);
        self.emit(RecordingEvent::Started {
            stem: session.stem.clone(),
            path: session.output_path.clone(),
        });
        tracing::info!(
            "Recording ({}, {:?}) to {}",
            session.mode.label(),
            self.camera.settings().pixel_format,
            session.output_path
        );

        let poll = self.config.poll_interval;
        let progress_every = (self.config.frame_rate.round() as u64).max(1);
        let started = Instant::now();
        let mut pending = first_frame;
        let mut consecutive_failures: u32 = 0;
        let mut last_line_sample: Option<Instant> = None;

        let reason = loop {
            if self.is_cancelled() {
                break StopReason::Aborted;
            }

            let mut edge = Edge::None;
            if let Some(line) = trigger_line.as_deref() {
                if policy.watches_line() && last_line_sample.map_or(true, |t| t.elapsed() >= poll) {
                    edge = detector.sample(self.camera.read_trigger_line_level(line));
                    last_line_sample = Some(Instant::now());
                }
            }

            let ctx = StopContext {
                edge,
                elapsed: started.elapsed(),
                frames_written: session.frames_written,
                consecutive_failures,
            };
            if let Some(reason) = policy.evaluate(&ctx) {
                break reason;
            }

            let frame = match pending.take() {
                Some(frame) => Some(frame),
                None => {
                    let timeout = pull_timeout(self.config.frame_timeout, policy.safety_cap(), ctx.elapsed);
                    match self.camera.pull_next_frame(timeout) {
                        Ok(FramePull::Frame(frame)) => {
                            consecutive_failures = 0;
                            Some(frame)
                        }
                        Ok(FramePull::Incomplete) => {
                            consecutive_failures = 0;
                            session.frames_incomplete += 1;
                            tracing::debug!("Discarded incomplete frame");
                            None
                        }
                        Ok(FramePull::Timeout) => {
                            consecutive_failures += 1;
                            session.pull_failures += 1;
                            tracing::warn!("Frame pull timed out ({} in a row)", consecutive_failures);
                            None
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            session.pull_failures += 1;
                            tracing::warn!("Frame pull failed ({} in a row): {}", consecutive_failures, e);
                            session.error = Some(e.to_string());
                            None
                        }
                    }
                }
            };

            if let Some(frame) = frame {
                if let Err(e) = file.append(&frame) {
                    tracing::error!("Failed to write frame {}: {}", frame.frame_id, e);
                    session.error = Some(e.to_string());
                    break StopReason::Error;
                }
                session.frames_written += 1;
                if session.frames_written % progress_every == 0 {
                    tracing::debug!("{} frames written", session.frames_written);
                    self.emit(RecordingEvent::Progress(session.frames_written));
                }
            }
        };

        match reason {
            StopReason::FallingEdge => tracing::info!("Trigger line went low, stopping recording"),
            StopReason::SafetyCap => tracing::info!("Safety cap reached, stopping recording"),
            StopReason::StreamStalled => {
                tracing::info!("Repeated pull failures after start, assuming acquisition stopped")
            }
            StopReason::Aborted => tracing::info!("Recording aborted by operator"),
            StopReason::TargetReached | StopReason::Error => {}
        }

        self.set_state(RecorderState::Finalizing);
        session.end(reason, started.elapsed());

        if let Err(e) = file.finalize() {
            tracing::error!("Failed to finalize {}: {}", file.path().display(), e);
            session.error = Some(e.to_string());
        }

        if self.config.write_sidecar {
            if let Err(e) = sidecar::write_session(&session) {
                tracing::warn!("Failed to write session record: {}", e);
            }
        }

        tracing::info!(
            "Saved {} frames in {:.2}s ({:.1} fps) -> {}",
            session.frames_written,
            session.duration_ms / 1000.0,
            session.measured_fps(),
            session.output_path
        );
        self.emit(RecordingEvent::Stopped {
            reason,
            frames: session.frames_written,
        });

        Ok(session)
    }
}

/// Pull timeout that never runs past the safety-cap deadline
fn pull_timeout(frame_timeout: Duration, safety_cap: Option<Duration>, elapsed: Duration) -> Duration {
    match safety_cap {
        Some(cap) => cap
            .saturating_sub(elapsed)
            .min(frame_timeout)
            .max(Duration::from_millis(1)),
        None => frame_timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::simulated::{ScriptedPull, SimulatedCamera};
    use crate::capture::{CameraSettings, TriggerSelector, TriggerSettings};
    use crate::output::writer::testing::MemorySink;
    use crate::recorder::state::StopKind;
    use std::path::Path;
    use tempfile::tempdir;

    fn config(dir: &Path) -> RecorderConfig {
        RecorderConfig {
            output_dir: dir.to_path_buf(),
            prefix: "trial_".to_string(),
            frame_rate: 100.0,
            frame_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(10),
            ..RecorderConfig::default()
        }
    }

    fn triggered(safety_cap: Option<Duration>) -> RecordingMode {
        RecordingMode::Triggered {
            trigger: TriggerSettings {
                line: "Line0".to_string(),
                selector: TriggerSelector::AcquisitionStart,
                use_acquisition_stop: true,
            },
            stop_on_falling: true,
            safety_cap,
            target_frames: None,
        }
    }

    fn coordinator(camera: SimulatedCamera, sink: MemorySink, dir: &Path) -> RecordingCoordinator<SimulatedCamera> {
        let session = CameraSession::open(camera, CameraSettings::default()).unwrap();
        RecordingCoordinator::new(session, Box::new(sink), config(dir))
    }

    #[test]
    fn test_timeouts_after_start_finalize_once() {
        let dir = tempdir().unwrap();
        let mut steps = vec![ScriptedPull::Frame; 5];
        steps.extend(vec![ScriptedPull::Timeout; 4]);
        let camera = SimulatedCamera::scripted(steps);
        let sink = MemorySink::default();
        let log = sink.log.clone();
        let mut recorder = coordinator(camera, sink, dir.path());
        let mut events = recorder.subscribe();

        let session = recorder.record(triggered(None)).unwrap().unwrap();

        assert_eq!(session.frames_written, 5);
        assert_eq!(session.stop_reason, Some(StopReason::StreamStalled));
        assert_eq!(session.stop_reason.unwrap().kind(), StopKind::Timeout);
        assert_eq!(log.lock().closes, 1);
        assert_eq!(log.lock().opened.len(), 1);
        assert_eq!(recorder.state(), RecorderState::Idle);

        let mut stopped = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, RecordingEvent::Stopped { .. }) {
                stopped += 1;
            }
        }
        assert_eq!(stopped, 1);
    }

    #[test]
    fn test_falling_edge_stops_recording() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::scripted(vec![
            ScriptedPull::SetLine(Some(true)),
            ScriptedPull::Frame,
            ScriptedPull::Frame,
            ScriptedPull::Frame,
            ScriptedPull::SetLine(Some(false)),
            ScriptedPull::Frame,
            ScriptedPull::Frame,
        ])
        .with_line_level(Some(false))
        .with_timeout_sleep(Duration::from_millis(15));
        let calls = camera.calls();
        let sink = MemorySink::default();
        let log = sink.log.clone();
        let mut recorder = coordinator(camera, sink, dir.path());

        let session = recorder.record(triggered(Some(Duration::from_secs(5)))).unwrap().unwrap();

        assert_eq!(session.stop_reason, Some(StopReason::FallingEdge));
        assert!(session.frames_written >= 3 && session.frames_written <= 5);
        assert!(session.acquisition_stop_armed);
        assert_eq!(log.lock().closes, 1);
        assert_eq!(calls.lock().modes.last(), Some(&AcquisitionMode::FreeRun));
    }

    #[test]
    fn test_incomplete_frames_not_counted() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::scripted(vec![
            ScriptedPull::Frame,
            ScriptedPull::Incomplete,
            ScriptedPull::Frame,
            ScriptedPull::Incomplete,
            ScriptedPull::Frame,
        ]);
        let sink = MemorySink::default();
        let mut recorder = coordinator(camera, sink, dir.path());
        let mode = RecordingMode::FreeRun {
            duration: Duration::from_millis(30),
            frame_rate: 100.0,
        };

        let session = recorder.record(mode).unwrap().unwrap();

        assert_eq!(session.target_frames, Some(3));
        assert_eq!(session.frames_written, 3);
        assert_eq!(session.frames_incomplete, 2);
        assert_eq!(session.stop_reason, Some(StopReason::TargetReached));
    }

    #[test]
    fn test_safety_cap_bounds() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::generated(4, 4, 100.0).with_line_level(Some(true));
        let session = CameraSession::open(camera, CameraSettings::default()).unwrap();
        let config = RecorderConfig {
            poll_interval: Duration::from_millis(50),
            ..config(dir.path())
        };
        let mut recorder = RecordingCoordinator::new(session, Box::new(MemorySink::default()), config);
        let cap = Duration::from_millis(300);
        let poll = recorder.config().poll_interval;

        let session = recorder.record(triggered(Some(cap))).unwrap().unwrap();

        assert_eq!(session.stop_reason, Some(StopReason::SafetyCap));
        let elapsed = Duration::from_secs_f64(session.duration_ms / 1000.0);
        assert!(elapsed >= cap, "stopped early: {:?}", elapsed);
        assert!(elapsed < cap + poll, "stopped late: {:?}", elapsed);
        assert!(session.frames_written > 0);
    }

    #[test]
    fn test_cancel_while_armed_creates_no_file() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::scripted(Vec::new()).with_line_level(Some(false));
        let sink = MemorySink::default();
        let log = sink.log.clone();
        let mut recorder = coordinator(camera, sink, dir.path());
        let cancel = recorder.cancel_handle();
        let state = recorder.state_handle();

        let canceller = std::thread::spawn(move || {
            while *state.read() != RecorderState::Armed {
                std::thread::sleep(Duration::from_millis(1));
            }
            std::thread::sleep(Duration::from_millis(30));
            cancel.store(true, Ordering::SeqCst);
        });

        let result = recorder.record(triggered(None)).unwrap();
        canceller.join().unwrap();

        assert!(result.is_none());
        assert!(log.lock().opened.is_empty());
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_trigger_configuration_failure_is_surfaced() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::scripted(vec![ScriptedPull::Frame]).fail_configure_trigger();
        let calls = camera.calls();
        let sink = MemorySink::default();
        let mut recorder = coordinator(camera, sink, dir.path());

        let err = recorder.record(triggered(None)).unwrap_err();

        assert!(matches!(err, RecordingError::Configuration(_)));
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(recorder.camera().mode(), &AcquisitionMode::FreeRun);
        assert!(calls.lock().begin_stream >= 2);
    }

    #[test]
    fn test_output_open_failure_is_surfaced() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::scripted(vec![ScriptedPull::Frame]);
        let sink = MemorySink {
            fail_open: true,
            ..MemorySink::default()
        };
        let mut recorder = coordinator(camera, sink, dir.path());
        let mode = RecordingMode::FreeRun {
            duration: Duration::from_secs(1),
            frame_rate: 10.0,
        };

        let err = recorder.record(mode.clone()).unwrap_err();
        assert!(matches!(err, RecordingError::OutputOpen { .. }));
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!(recorder.last_session().is_none());
    }

    #[test]
    fn test_writer_failure_still_finalizes() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::scripted(vec![ScriptedPull::Frame; 10]);
        let sink = MemorySink {
            fail_after: Some(2),
            ..MemorySink::default()
        };
        let log = sink.log.clone();
        let mut recorder = coordinator(camera, sink, dir.path());
        let mode = RecordingMode::FreeRun {
            duration: Duration::from_millis(100),
            frame_rate: 100.0,
        };

        let session = recorder.record(mode).unwrap().unwrap();

        assert_eq!(session.stop_reason, Some(StopReason::Error));
        assert_eq!(session.frames_written, 2);
        assert!(session.error.as_deref().unwrap_or_default().contains("disk full"));
        assert_eq!(log.lock().closes, 1);
    }

    #[test]
    fn test_back_to_back_recordings_advance_series() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::scripted(vec![ScriptedPull::Frame; 4]);
        let sink = MemorySink::default();
        let mut recorder = coordinator(camera, sink, dir.path());
        let mode = RecordingMode::FreeRun {
            duration: Duration::from_millis(20),
            frame_rate: 100.0,
        };

        let first = recorder.record(mode.clone()).unwrap().unwrap();
        assert_eq!(first.stem, "trial_A01");
        assert!(dir.path().join("trial_A01.json").exists());

        // MemorySink writes nothing, so put the video in place by hand.
        std::fs::write(&first.output_path, b"").unwrap();
        let second = recorder.record(mode).unwrap().unwrap();

        assert_eq!(second.stem, "trial_A02");
        assert_eq!(second.frames_written, 2);
        assert_eq!(recorder.last_session().map(|s| s.id), Some(second.id));
    }

    #[test]
    fn test_triggered_without_falling_stop_runs_to_target() {
        let dir = tempdir().unwrap();
        let mut steps = vec![ScriptedPull::SetLine(Some(true))];
        steps.extend(vec![ScriptedPull::Frame; 40]);
        steps.push(ScriptedPull::SetLine(Some(false)));
        steps.extend(vec![ScriptedPull::Frame; 400]);
        let camera = SimulatedCamera::scripted(steps).with_line_level(Some(false));
        let sink = MemorySink::default();
        let log = sink.log.clone();
        let mut recorder = coordinator(camera, sink, dir.path());
        let mode = RecordingMode::Triggered {
            trigger: TriggerSettings {
                line: "Line0".to_string(),
                selector: TriggerSelector::AcquisitionStart,
                use_acquisition_stop: false,
            },
            stop_on_falling: false,
            safety_cap: None,
            target_frames: Some(60),
        };

        let session = recorder.record(mode).unwrap().unwrap();

        assert_eq!(session.target_frames, Some(60));
        assert_eq!(session.frames_written, 60);
        assert_eq!(session.stop_reason, Some(StopReason::TargetReached));
        assert_eq!(log.lock().closes, 1);
    }

    #[test]
    fn test_unreadable_line_stops_on_stalled_stream() {
        let dir = tempdir().unwrap();
        let mut steps = vec![ScriptedPull::Frame; 5];
        steps.extend(vec![ScriptedPull::Timeout; 4]);
        let camera = SimulatedCamera::scripted(steps).without_trigger_line();
        let calls = camera.calls();
        let sink = MemorySink::default();
        let log = sink.log.clone();
        let mut recorder = coordinator(camera, sink, dir.path());

        let session = recorder.record(triggered(None)).unwrap().unwrap();

        assert_eq!(session.stop_reason, Some(StopReason::StreamStalled));
        assert_eq!(session.frames_written, 5);
        assert_eq!(log.lock().closes, 1);
        assert!(calls.lock().line_reads >= 1);
        assert_eq!(recorder.camera().mode(), &AcquisitionMode::FreeRun);
    }

    #[test]
    fn test_unreadable_line_stops_on_safety_cap() {
        let dir = tempdir().unwrap();
        let camera = SimulatedCamera::generated(4, 4, 100.0)
            .with_line_level(Some(true))
            .without_trigger_line();
        let sink = MemorySink::default();
        let log = sink.log.clone();
        let mut recorder = coordinator(camera, sink, dir.path());

        let session = recorder
            .record(triggered(Some(Duration::from_millis(200))))
            .unwrap()
            .unwrap();

        assert_eq!(session.stop_reason, Some(StopReason::SafetyCap));
        assert!(session.frames_written > 0);
        assert_eq!(log.lock().closes, 1);
    }

    #[test]
    fn test_pull_timeout_respects_cap() {
        let timeout = pull_timeout(
            Duration::from_secs(2),
            Some(Duration::from_millis(300)),
            Duration::from_millis(250),
        );
        assert_eq!(timeout, Duration::from_millis(50));
        assert_eq!(
            pull_timeout(Duration::from_secs(2), None, Duration::from_secs(10)),
            Duration::from_secs(2)
        );
        assert_eq!(
            pull_timeout(Duration::from_secs(2), Some(Duration::from_millis(10)), Duration::from_secs(1)),
            Duration::from_millis(1)
        );
    }
}
