//! Camera capability definitions
//!
//! Vendor SDKs (Spinnaker, pylon, UVC) are reached only through the [`Camera`]
//! trait, so the recorder never holds native handles directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Information about a connected camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Backend-specific device id (index or serial)
    pub id: String,

    /// Human readable device name
    pub name: String,

    /// Backend that exposes the device
    pub backend: String,

    /// Whether the device has a readable trigger/GPIO line
    pub has_trigger_line: bool,
}

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Mono8,
    Mono16,
    Rgb8,
    Bgr8,
    Yuyv422,
    Nv12,
}

impl PixelFormat {
    /// Name of the matching FFmpeg rawvideo pixel format
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Mono8 => "gray",
            PixelFormat::Mono16 => "gray16le",
            PixelFormat::Rgb8 => "rgb24",
            PixelFormat::Bgr8 => "bgr24",
            PixelFormat::Yuyv422 => "yuyv422",
            PixelFormat::Nv12 => "nv12",
        }
    }

    /// Expected buffer size for a frame of the given dimensions
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Mono8 => pixels,
            PixelFormat::Mono16 | PixelFormat::Yuyv422 => pixels * 2,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => pixels * 3,
            PixelFormat::Nv12 => pixels * 3 / 2,
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mono8" => Ok(PixelFormat::Mono8),
            "mono16" => Ok(PixelFormat::Mono16),
            "rgb8" => Ok(PixelFormat::Rgb8),
            "bgr8" => Ok(PixelFormat::Bgr8),
            "yuyv" | "yuyv422" | "yuv422_8" => Ok(PixelFormat::Yuyv422),
            "nv12" => Ok(PixelFormat::Nv12),
            other => Err(format!("unknown pixel format '{other}'")),
        }
    }
}

/// A complete frame delivered by the camera
#[derive(Debug, Clone)]
pub struct Frame {
    /// Device frame counter, if the backend provides one
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
}

/// Outcome of a single frame pull
#[derive(Debug, Clone)]
pub enum FramePull {
    /// A valid, complete frame
    Frame(Frame),
    /// The camera delivered a partial/corrupt buffer
    Incomplete,
    /// Nothing arrived within the timeout
    Timeout,
}

/// What starts the camera's acquisition in triggered mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerSelector {
    /// One rising edge starts continuous streaming
    AcquisitionStart,
    /// Every frame needs its own edge
    FrameStart,
}

impl Default for TriggerSelector {
    fn default() -> Self {
        Self::AcquisitionStart
    }
}

/// Trigger wiring for a triggered acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSettings {
    /// Input line carrying the TTL signal (e.g. `Line0`)
    pub line: String,
    pub selector: TriggerSelector,
    /// Also arm a hardware acquisition-stop on the falling edge when supported
    pub use_acquisition_stop: bool,
}

/// Acquisition mode requested from the camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AcquisitionMode {
    /// Continuous acquisition, trigger disabled
    FreeRun,
    /// Acquisition gated by an external line
    Triggered(TriggerSettings),
}

impl AcquisitionMode {
    pub fn is_triggered(&self) -> bool {
        matches!(self, AcquisitionMode::Triggered(_))
    }
}

/// Region of interest in sensor pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Optional image settings. Missing capabilities degrade, they never fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSettings {
    pub pixel_format: PixelFormat,
    pub exposure_us: Option<f64>,
    pub gain_db: Option<f64>,
    pub frame_rate: Option<f64>,
    pub roi: Option<Roi>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Mono8,
            exposure_us: None,
            gain_db: None,
            frame_rate: None,
            roi: None,
        }
    }
}

/// What `configure` actually managed to apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigureReport {
    /// Optional features that were skipped, with the reason
    pub degraded: Vec<(String, String)>,
    /// A hardware acquisition-stop trigger is armed on the falling edge
    pub acquisition_stop_armed: bool,
}

impl ConfigureReport {
    /// Record a skipped optional feature and log it
    pub fn degrade(&mut self, feature: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("{} not applied: {}", feature, reason);
        self.degraded.push((feature.to_string(), reason));
    }

    pub fn is_degraded(&self, feature: &str) -> bool {
        self.degraded.iter().any(|(f, _)| f == feature)
    }
}

/// Camera-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("No camera found: {0}")]
    NotFound(String),

    #[error("Camera is not open")]
    NotOpen,

    #[error("Node {node} unavailable: {reason}")]
    NodeUnavailable { node: String, reason: String },

    #[error("Camera SDK error: {0}")]
    Sdk(String),
}

pub type CameraResult<T> = Result<T, CameraError>;

/// Capability interface over a vendor camera.
///
/// Implementations must tolerate `end_stream` and `close` being called when the
/// stream or device is already stopped.
pub trait Camera {
    fn info(&self) -> CameraInfo;

    fn open(&mut self) -> CameraResult<()>;

    /// Apply an acquisition mode and image settings. Must be called while not
    /// streaming. Trigger nodes that cannot be set are an error; optional image
    /// features are reported in [`ConfigureReport::degraded`].
    fn configure(
        &mut self,
        mode: &AcquisitionMode,
        settings: &CameraSettings,
    ) -> CameraResult<ConfigureReport>;

    fn begin_stream(&mut self) -> CameraResult<()>;

    fn pull_next_frame(&mut self, timeout: Duration) -> CameraResult<FramePull>;

    fn end_stream(&mut self) -> CameraResult<()>;

    fn close(&mut self) -> CameraResult<()>;

    fn is_streaming(&self) -> bool;

    /// Current electrical level of an I/O line, `None` when not readable
    fn read_trigger_line_level(&mut self, line: &str) -> Option<bool>;
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn info(&self) -> CameraInfo {
        (**self).info()
    }

    fn open(&mut self) -> CameraResult<()> {
        (**self).open()
    }

    fn configure(
        &mut self,
        mode: &AcquisitionMode,
        settings: &CameraSettings,
    ) -> CameraResult<ConfigureReport> {
        (**self).configure(mode, settings)
    }

    fn begin_stream(&mut self) -> CameraResult<()> {
        (**self).begin_stream()
    }

    fn pull_next_frame(&mut self, timeout: Duration) -> CameraResult<FramePull> {
        (**self).pull_next_frame(timeout)
    }

    fn end_stream(&mut self) -> CameraResult<()> {
        (**self).end_stream()
    }

    fn close(&mut self) -> CameraResult<()> {
        (**self).close()
    }

    fn is_streaming(&self) -> bool {
        (**self).is_streaming()
    }

    fn read_trigger_line_level(&mut self, line: &str) -> Option<bool> {
        (**self).read_trigger_line_level(line)
    }
}
