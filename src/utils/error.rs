//! Error types and handling
//!
//! Common error types used across the application.

use crate::capture::CameraError;
use crate::config::ConfigError;
use crate::output::WriterError;
use crate::recorder::RecordingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Output error: {0}")]
    Output(#[from] WriterError),
}

/// Error report shown to the operator
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Camera(CameraError::NotFound(_)) => "NO_CAMERA",
            AppError::Camera(_) => "CAMERA_ERROR",
            AppError::Recording(RecordingError::Configuration(_)) => "TRIGGER_CONFIG_ERROR",
            AppError::Recording(RecordingError::OutputOpen { .. }) => "OUTPUT_OPEN_ERROR",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Output(_) => "OUTPUT_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<RecordingError> for ErrorResponse {
    fn from(error: RecordingError) -> Self {
        AppError::from(error).into()
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_codes() {
        let resp: ErrorResponse = AppError::Camera(CameraError::NotFound("no devices".into())).into();
        assert_eq!(resp.code, "NO_CAMERA");

        let resp: ErrorResponse = RecordingError::OutputOpen {
            path: PathBuf::from("/nope/x.avi"),
            message: "denied".into(),
        }
        .into();
        assert_eq!(resp.code, "OUTPUT_OPEN_ERROR");
        assert!(resp.to_string().starts_with("[OUTPUT_OPEN_ERROR]"));
    }
}
