//! Session sidecar files
//!
//! Each recording gets a `<stem>.json` next to its video with the session
//! record: frame counts, timing, stop reason and degraded camera features.

use crate::recorder::RecordingSession;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sidecar-related errors
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sidecar file extension
pub const SIDECAR_EXTENSION: &str = "json";

/// Path of the sidecar for a video file
pub fn sidecar_path(video_path: &Path) -> PathBuf {
    video_path.with_extension(SIDECAR_EXTENSION)
}

/// Write the session record next to its video
pub fn write_session(session: &RecordingSession) -> Result<PathBuf, SidecarError> {
    let path = sidecar_path(Path::new(&session.output_path));
    let content = serde_json::to_string_pretty(session)?;
    fs::write(&path, content)?;

    tracing::debug!("Saved session record {:?}", path);

    Ok(path)
}

/// Read a session record
pub fn read_session(path: &Path) -> Result<RecordingSession, SidecarError> {
    let content = fs::read_to_string(path)?;
    let session: RecordingSession = serde_json::from_str(&content)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::naming::next_sequence_name;
    use crate::recorder::{RecordingMode, StopReason};
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_session() {
        let dir = tempdir().unwrap();
        let name = next_sequence_name(dir.path(), "hr_", ".avi").unwrap();
        let mode = RecordingMode::FreeRun {
            duration: Duration::from_secs(2),
            frame_rate: 30.0,
        };
        let mut session = RecordingSession::new(&name, mode);
        session.frames_written = 60;
        session.end(StopReason::TargetReached, Duration::from_secs(2));

        let path = write_session(&session).unwrap();
        assert_eq!(path, dir.path().join("hr_A01.json"));

        let loaded = read_session(&path).unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.frames_written, 60);
        assert_eq!(loaded.stop_reason, Some(StopReason::TargetReached));
        assert_eq!(loaded.mode, session.mode);
    }

    #[test]
    fn test_sidecar_does_not_advance_series() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("hr_A01.json"), "{}").unwrap();
        let name = next_sequence_name(dir.path(), "hr_", ".avi").unwrap();
        assert_eq!(name.stem, "hr_A01");
    }
}
