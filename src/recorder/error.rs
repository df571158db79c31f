use crate::capture::CameraError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a recording attempt.
///
/// None of these are fatal for the process: the camera stays open and the
/// operator can retry.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Trigger configuration failed: {0}")]
    Configuration(#[source] CameraError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Cannot name output file: {0}")]
    Naming(#[source] std::io::Error),

    #[error("Cannot open output {path}: {message}")]
    OutputOpen { path: PathBuf, message: String },
}

pub type RecordingResult<T> = Result<T, RecordingError>;
