//! Recording state management
//!
//! Defines the recorder state machine states and session tracking.

use crate::capture::TriggerSettings;
use crate::recorder::edge::DEFAULT_POLL_INTERVAL;
use crate::recorder::naming::SequenceName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    Idle,
    /// Waiting for the start condition
    Armed,
    /// Writing frames
    Recording,
    /// Closing the output file and restoring the camera
    Finalizing,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Idle
    }
}

/// How a recording is started and stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RecordingMode {
    /// Start immediately, stop after `duration × frame_rate` frames
    FreeRun { duration: Duration, frame_rate: f64 },
    /// Start on a rising edge, stop on the falling edge or the safety cap
    Triggered {
        trigger: TriggerSettings,
        stop_on_falling: bool,
        safety_cap: Option<Duration>,
        /// Frame count that ends the recording when it does not stop on the
        /// falling edge
        target_frames: Option<u64>,
    },
}

/// `duration × frame_rate` frames, at least one
pub fn frame_target(duration: Duration, frame_rate: f64) -> u64 {
    let frames = (duration.as_secs_f64() * frame_rate).round();
    (frames as u64).max(1)
}

impl RecordingMode {
    /// Fixed frame count that ends the recording, if any
    pub fn target_frames(&self) -> Option<u64> {
        match self {
            RecordingMode::FreeRun { duration, frame_rate } => Some(frame_target(*duration, *frame_rate)),
            RecordingMode::Triggered { target_frames, .. } => *target_frames,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordingMode::FreeRun { .. } => "free-run",
            RecordingMode::Triggered { .. } => "triggered",
        }
    }
}

/// Coarse outcome of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    Natural,
    Aborted,
    Timeout,
    Error,
}

/// Why a recording stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Trigger line went low
    FallingEdge,
    /// Free-run frame count reached
    TargetReached,
    /// Triggered recording hit its maximum duration
    SafetyCap,
    /// Repeated pull failures after the stream started
    StreamStalled,
    /// Operator quit
    Aborted,
    /// Writing failed
    Error,
}

impl StopReason {
    pub fn kind(&self) -> StopKind {
        match self {
            StopReason::FallingEdge | StopReason::TargetReached => StopKind::Natural,
            StopReason::SafetyCap | StopReason::StreamStalled => StopKind::Timeout,
            StopReason::Aborted => StopKind::Aborted,
            StopReason::Error => StopKind::Error,
        }
    }
}

/// Settings the recorder applies to every recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Destination directory
    pub output_dir: PathBuf,

    /// Base name; `A<NN>` is appended
    pub prefix: String,

    /// Output extension, e.g. `.avi`
    pub extension: String,

    /// Encoder quality, 1..=100
    pub quality: u8,

    /// Frame rate written into the file header
    pub frame_rate: f64,

    /// Bound on a single frame pull
    pub frame_timeout: Duration,

    /// Trigger line sampling interval
    pub poll_interval: Duration,

    /// Consecutive pull failures that end a started recording
    pub max_consecutive_failures: u32,

    /// Write a JSON session record next to each video
    pub write_sidecar: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            prefix: "rec_".to_string(),
            extension: ".avi".to_string(),
            quality: 75,
            frame_rate: 60.0,
            frame_timeout: Duration::from_millis(2000),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: 3,
            write_sidecar: true,
        }
    }
}

/// A single recording, from start condition to finalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: Uuid,

    /// Output file stem, e.g. `exp1_A03`
    pub stem: String,

    pub output_path: String,

    /// Sequence number of the output file
    pub counter: u32,

    pub mode: RecordingMode,

    /// Frame count that ends a free-run recording
    pub target_frames: Option<u64>,

    pub frames_written: u64,

    /// Incomplete frames that were discarded
    pub frames_incomplete: u64,

    /// Pull timeouts and camera errors, consecutive or not
    pub pull_failures: u64,

    /// Hardware acquisition-stop was armed on the falling edge
    pub acquisition_stop_armed: bool,

    /// Optional camera features that could not be applied
    pub degraded_features: Vec<String>,

    pub started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,

    pub duration_ms: f64,

    pub stop_reason: Option<StopReason>,

    /// Message for `StopReason::Error`
    pub error: Option<String>,
}

impl RecordingSession {
    /// Create a new session starting now
    pub fn new(name: &SequenceName, mode: RecordingMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            stem: name.stem.clone(),
            output_path: name.path.to_string_lossy().to_string(),
            counter: name.counter,
            target_frames: mode.target_frames(),
            mode,
            frames_written: 0,
            frames_incomplete: 0,
            pull_failures: 0,
            acquisition_stop_armed: false,
            degraded_features: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0.0,
            stop_reason: None,
            error: None,
        }
    }

    /// End the session
    pub fn end(&mut self, reason: StopReason, elapsed: Duration) {
        self.stop_reason = Some(reason);
        self.duration_ms = elapsed.as_secs_f64() * 1000.0;
        self.ended_at = Some(Utc::now());
    }

    /// Effective frame rate over the recording
    pub fn measured_fps(&self) -> f64 {
        if self.duration_ms > 0.0 {
            self.frames_written as f64 / (self.duration_ms / 1000.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_target_frames() {
        let mode = RecordingMode::FreeRun {
            duration: Duration::from_secs(10),
            frame_rate: 60.0,
        };
        assert_eq!(mode.target_frames(), Some(600));

        let tiny = RecordingMode::FreeRun {
            duration: Duration::from_millis(1),
            frame_rate: 10.0,
        };
        assert_eq!(tiny.target_frames(), Some(1));
        assert_eq!(tiny.label(), "free-run");
    }

    #[test]
    fn test_triggered_target_frames() {
        let mode = RecordingMode::Triggered {
            trigger: TriggerSettings {
                line: "Line0".to_string(),
                selector: crate::capture::TriggerSelector::AcquisitionStart,
                use_acquisition_stop: false,
            },
            stop_on_falling: false,
            safety_cap: None,
            target_frames: Some(frame_target(Duration::from_millis(500), 30.0)),
        };
        assert_eq!(mode.target_frames(), Some(15));
        assert_eq!(mode.label(), "triggered");
    }

    #[test]
    fn test_stop_kinds() {
        assert_eq!(StopReason::FallingEdge.kind(), StopKind::Natural);
        assert_eq!(StopReason::StreamStalled.kind(), StopKind::Timeout);
        assert_eq!(StopReason::Aborted.kind(), StopKind::Aborted);
    }

    #[test]
    fn test_session_end() {
        let name = SequenceName {
            stem: "exp1_A01".to_string(),
            path: PathBuf::from("/data/exp1_A01.avi"),
            counter: 1,
        };
        let mode = RecordingMode::FreeRun {
            duration: Duration::from_secs(1),
            frame_rate: 30.0,
        };
        let mut session = RecordingSession::new(&name, mode);
        session.frames_written = 30;
        session.end(StopReason::TargetReached, Duration::from_secs(1));

        assert_eq!(session.stop_reason, Some(StopReason::TargetReached));
        assert!(session.ended_at.is_some());
        assert!((session.measured_fps() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&RecorderState::Finalizing).unwrap();
        assert_eq!(json, "\"finalizing\"");
    }
}
