//! Rig configuration
//!
//! Settings come from a TOML file with every field defaulted. Discovery order:
//! an explicit `--config` path, then `./rig-recorder.toml`, then defaults.
//! Command-line flags are applied on top by the binary.

use crate::capture::{CameraSettings, PixelFormat, Roi, TriggerSelector, TriggerSettings};
use crate::recorder::state::frame_target;
use crate::recorder::{RecorderConfig, RecordingMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "rig-recorder.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Which camera backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    Simulated,
    Webcam,
}

/// Mode the program starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    /// Stay in free-run until the operator asks for a recording
    Free,
    /// Arm the trigger immediately and record once
    Trigger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination directory for videos
    pub dest: PathBuf,

    /// Base name; `A01`, `A02`, ... is appended
    pub prefix: String,

    pub extension: String,

    /// MJPEG quality, 1..=100
    pub quality: u8,

    /// Write `<stem>.json` next to each video
    pub write_sidecar: bool,

    /// FFmpeg executable
    pub ffmpeg: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("."),
            prefix: "rec_".to_string(),
            extension: "avi".to_string(),
            quality: 75,
            write_sidecar: true,
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub camera: CameraBackend,

    /// Device index for the webcam backend
    pub device: u32,

    pub pixel_format: String,

    /// Nominal frame rate, also written into the video header
    pub fps: f64,

    /// Free-run recording length in seconds
    pub duration_s: f64,

    pub exposure_us: Option<f64>,

    pub gain_db: Option<f64>,

    /// Bound on a single frame pull
    pub timeout_ms: u64,

    pub roi: Option<Roi>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera: CameraBackend::Simulated,
            device: 0,
            pixel_format: "Mono8".to_string(),
            fps: 60.0,
            duration_s: 10.0,
            exposure_us: None,
            gain_db: None,
            timeout_ms: 2000,
            roi: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub mode: StartMode,

    /// Input line carrying the TTL signal
    pub line: String,

    pub selector: TriggerSelector,

    /// End a triggered recording when the line goes low
    pub stop_on_falling: bool,

    /// Safety cap for triggered recordings, in seconds
    pub max_triggered_s: Option<f64>,

    /// Arm a hardware AcquisitionStop on the falling edge when supported
    pub use_acquisition_stop: bool,

    /// Consecutive pull failures that end a started recording
    pub max_consecutive_timeouts: u32,

    pub poll_interval_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: StartMode::Free,
            line: "Line0".to_string(),
            selector: TriggerSelector::AcquisitionStart,
            stop_on_falling: true,
            max_triggered_s: None,
            use_acquisition_stop: true,
            max_consecutive_timeouts: 3,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

/// Simulated camera parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    pub width: u32,
    pub height: u32,

    /// Line goes high this long after arming
    pub trigger_delay_ms: u64,

    /// and stays high this long
    pub trigger_width_ms: u64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            trigger_delay_ms: 1000,
            trigger_width_ms: 3000,
        }
    }
}

/// Complete rig configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub output: OutputConfig,
    pub capture: CaptureConfig,
    pub trigger: TriggerConfig,
    pub logging: LoggingConfig,
    pub simulated: SimulatedConfig,
}

impl RigConfig {
    /// Load a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `explicit`, else `./rig-recorder.toml`, else defaults.
    ///
    /// Returns the file that was used, if any.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            // An explicit path must exist.
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            return Ok((config, Some(local)));
        }

        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                message: message.into(),
            }
        }

        if self.output.prefix.trim().is_empty() {
            return Err(invalid("output.prefix", "must not be empty"));
        }
        if !(1..=100).contains(&self.output.quality) {
            return Err(invalid("output.quality", format!("{} is outside 1..=100", self.output.quality)));
        }
        if !(self.capture.fps.is_finite() && self.capture.fps > 0.0) {
            return Err(invalid("capture.fps", format!("{} must be positive", self.capture.fps)));
        }
        if !(self.capture.duration_s.is_finite() && self.capture.duration_s > 0.0) {
            return Err(invalid(
                "capture.duration_s",
                format!("{} must be positive", self.capture.duration_s),
            ));
        }
        if Duration::try_from_secs_f64(self.capture.duration_s).is_err() {
            return Err(invalid(
                "capture.duration_s",
                format!("{} is too large", self.capture.duration_s),
            ));
        }
        if self.capture.timeout_ms == 0 {
            return Err(invalid("capture.timeout_ms", "must be positive"));
        }
        if let Some(cap) = self.trigger.max_triggered_s {
            if !(cap.is_finite() && cap > 0.0) {
                return Err(invalid("trigger.max_triggered_s", format!("{cap} must be positive")));
            }
            if Duration::try_from_secs_f64(cap).is_err() {
                return Err(invalid("trigger.max_triggered_s", format!("{cap} is too large")));
            }
        }
        if self.trigger.max_consecutive_timeouts == 0 {
            return Err(invalid("trigger.max_consecutive_timeouts", "must be at least 1"));
        }
        if self.trigger.poll_interval_ms == 0 {
            return Err(invalid("trigger.poll_interval_ms", "must be positive"));
        }
        if self.trigger.line.trim().is_empty() {
            return Err(invalid("trigger.line", "must not be empty"));
        }
        self.pixel_format()?;
        Ok(())
    }

    pub fn pixel_format(&self) -> Result<PixelFormat, ConfigError> {
        self.capture
            .pixel_format
            .parse()
            .map_err(|message| ConfigError::Invalid {
                field: "capture.pixel_format",
                message,
            })
    }

    pub fn camera_settings(&self) -> Result<CameraSettings, ConfigError> {
        Ok(CameraSettings {
            pixel_format: self.pixel_format()?,
            exposure_us: self.capture.exposure_us,
            gain_db: self.capture.gain_db,
            frame_rate: Some(self.capture.fps),
            roi: self.capture.roi,
        })
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            output_dir: self.output.dest.clone(),
            prefix: self.output.prefix.clone(),
            extension: self.output.extension.clone(),
            quality: self.output.quality,
            frame_rate: self.capture.fps,
            frame_timeout: Duration::from_millis(self.capture.timeout_ms),
            poll_interval: Duration::from_millis(self.trigger.poll_interval_ms),
            max_consecutive_failures: self.trigger.max_consecutive_timeouts,
            write_sidecar: self.output.write_sidecar,
        }
    }

    pub fn free_run_mode(&self) -> RecordingMode {
        RecordingMode::FreeRun {
            duration: Duration::from_secs_f64(self.capture.duration_s),
            frame_rate: self.capture.fps,
        }
    }

    pub fn triggered_mode(&self) -> RecordingMode {
        RecordingMode::Triggered {
            trigger: TriggerSettings {
                line: self.trigger.line.clone(),
                selector: self.trigger.selector,
                use_acquisition_stop: self.trigger.use_acquisition_stop,
            },
            stop_on_falling: self.trigger.stop_on_falling,
            safety_cap: self.trigger.max_triggered_s.map(Duration::from_secs_f64),
            // Without a falling-edge stop a triggered recording runs for the
            // free-run length.
            target_frames: (!self.trigger.stop_on_falling)
                .then(|| frame_target(Duration::from_secs_f64(self.capture.duration_s), self.capture.fps)),
        }
    }
}
