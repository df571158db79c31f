//! Camera capture
//!
//! This module provides the camera capability trait and its backends.

pub mod nodes;
pub mod session;
pub mod simulated;
pub mod traits;

#[cfg(feature = "webcam")]
pub mod webcam;

// Re-export traits
pub use session::CameraSession;
pub use traits::{
    AcquisitionMode, Camera, CameraError, CameraInfo, CameraResult, CameraSettings,
    ConfigureReport, Frame, FramePull, PixelFormat, Roi, TriggerSelector, TriggerSettings,
};
