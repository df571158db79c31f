//! Scoped camera ownership
//!
//! A [`CameraSession`] opens the device when created and always ends the
//! stream and closes the device when dropped, whichever path the caller
//! leaves by.

use super::traits::{
    AcquisitionMode, Camera, CameraInfo, CameraResult, CameraSettings, ConfigureReport, FramePull,
};
use std::time::Duration;

pub struct CameraSession<C: Camera> {
    camera: C,
    mode: AcquisitionMode,
    settings: CameraSettings,
    last_report: ConfigureReport,
}

impl<C: Camera> CameraSession<C> {
    /// Open the camera, configure it for free-run and start streaming
    pub fn open(mut camera: C, settings: CameraSettings) -> CameraResult<Self> {
        camera.open()?;
        let info = camera.info();
        tracing::info!("Opened camera {} ({}) via {}", info.name, info.id, info.backend);

        let mut session = Self {
            camera,
            mode: AcquisitionMode::FreeRun,
            settings,
            last_report: ConfigureReport::default(),
        };
        // On failure the session is dropped here, which closes the device.
        session.reconfigure(AcquisitionMode::FreeRun)?;
        Ok(session)
    }

    pub fn info(&self) -> CameraInfo {
        self.camera.info()
    }

    pub fn mode(&self) -> &AcquisitionMode {
        &self.mode
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn is_streaming(&self) -> bool {
        self.camera.is_streaming()
    }

    /// Report from the most recent `configure` call
    pub fn last_report(&self) -> &ConfigureReport {
        &self.last_report
    }

    /// Stop the stream, apply `mode` and restart the stream
    pub fn reconfigure(&mut self, mode: AcquisitionMode) -> CameraResult<&ConfigureReport> {
        if self.camera.is_streaming() {
            self.camera.end_stream()?;
        }

        tracing::debug!("Configuring camera for {:?}", mode);
        let report = self.camera.configure(&mode, &self.settings)?;
        self.mode = mode;
        self.last_report = report;

        self.camera.begin_stream()?;
        Ok(&self.last_report)
    }

    pub fn pull_next_frame(&mut self, timeout: Duration) -> CameraResult<FramePull> {
        self.camera.pull_next_frame(timeout)
    }

    pub fn read_trigger_line_level(&mut self, line: &str) -> Option<bool> {
        self.camera.read_trigger_line_level(line)
    }

    /// Borrow the underlying camera
    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }
}

impl<C: Camera> Drop for CameraSession<C> {
    fn drop(&mut self) {
        if self.camera.is_streaming() {
            if let Err(e) = self.camera.end_stream() {
                tracing::warn!("Error ending camera stream: {}", e);
            }
        }
        if let Err(e) = self.camera.close() {
            tracing::warn!("Error closing camera: {}", e);
        }
        tracing::info!("Camera released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::simulated::SimulatedCamera;

    #[test]
    fn test_session_releases_camera_on_drop() {
        let camera = SimulatedCamera::scripted(Vec::new());
        let calls = camera.calls();

        {
            let session = CameraSession::open(camera, CameraSettings::default()).unwrap();
            assert_eq!(session.mode(), &AcquisitionMode::FreeRun);
            assert_eq!(calls.lock().begin_stream, 1);
        }

        let calls = calls.lock();
        assert_eq!(calls.open, 1);
        assert_eq!(calls.end_stream, 1);
        assert_eq!(calls.close, 1);
    }

    #[test]
    fn test_settings_are_reapplied_on_reconfigure() {
        let camera = SimulatedCamera::scripted(Vec::new());
        let calls = camera.calls();
        let settings = CameraSettings {
            gain_db: Some(6.0),
            ..CameraSettings::default()
        };

        let mut session = CameraSession::open(camera, settings).unwrap();
        assert_eq!(session.settings().gain_db, Some(6.0));
        session.reconfigure(AcquisitionMode::FreeRun).unwrap();

        let calls = calls.lock();
        assert_eq!(calls.configure, 2);
        assert_eq!(calls.end_stream, 1);
        assert_eq!(calls.applied_gain_db, Some(6.0));
    }

    #[test]
    fn test_failed_configure_still_closes() {
        let camera = SimulatedCamera::scripted(Vec::new()).fail_configure_free_run();
        let calls = camera.calls();

        assert!(CameraSession::open(camera, CameraSettings::default()).is_err());
        assert_eq!(calls.lock().close, 1);
    }
}
