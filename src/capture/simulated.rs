//! Simulated camera
//!
//! Two flavours share one type:
//! - scripted: every pull consumes the next [`ScriptedPull`], which makes
//!   recorder behaviour reproducible in tests;
//! - generated: synthetic frames paced at a fixed rate, gated by a simulated
//!   TTL line while the camera is in triggered mode.

use super::nodes::{FloatNode, IntegerNode};
use super::traits::{
    AcquisitionMode, Camera, CameraError, CameraInfo, CameraResult, CameraSettings,
    ConfigureReport, Frame, FramePull, PixelFormat,
};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One step of a scripted frame source
#[derive(Debug, Clone)]
pub enum ScriptedPull {
    /// Deliver a valid frame
    Frame,
    /// Deliver an incomplete buffer
    Incomplete,
    /// Report a timeout
    Timeout,
    /// Fail the pull with an SDK error
    Error(String),
    /// Change the trigger line level, then continue with the next step
    SetLine(Option<bool>),
}

/// Calls made against the simulated camera
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub open: u32,
    pub close: u32,
    pub configure: u32,
    pub begin_stream: u32,
    pub end_stream: u32,
    pub pulls: u32,
    pub line_reads: u32,
    pub modes: Vec<AcquisitionMode>,
    pub applied_exposure_us: Option<f64>,
    pub applied_gain_db: Option<f64>,
}

/// Shared handle on the simulated TTL line
#[derive(Debug, Clone, Default)]
pub struct TriggerLine(Arc<Mutex<Option<bool>>>);

impl TriggerLine {
    pub fn set(&self, level: Option<bool>) {
        *self.0.lock() = level;
    }

    pub fn get(&self) -> Option<bool> {
        *self.0.lock()
    }
}

enum Source {
    Scripted(VecDeque<ScriptedPull>),
    Generated { interval: Duration, next_due: Option<Instant> },
}

pub struct SimulatedCamera {
    source: Source,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frame_id: u64,
    open: bool,
    streaming: bool,
    mode: AcquisitionMode,
    line: TriggerLine,
    line_readable: bool,
    /// Line level changes relative to entering triggered mode
    line_schedule: Vec<(Duration, Option<bool>)>,
    triggered_since: Option<Instant>,
    acquisition_stop_supported: bool,
    fail_trigger_config: bool,
    fail_free_run_config: bool,
    missing_features: HashSet<String>,
    timeout_sleep: Duration,
    calls: Arc<Mutex<CallLog>>,
}

impl SimulatedCamera {
    fn with_source(source: Source) -> Self {
        Self {
            source,
            width: 8,
            height: 8,
            pixel_format: PixelFormat::Mono8,
            frame_id: 0,
            open: false,
            streaming: false,
            mode: AcquisitionMode::FreeRun,
            line: TriggerLine::default(),
            line_readable: true,
            line_schedule: Vec::new(),
            triggered_since: None,
            acquisition_stop_supported: true,
            fail_trigger_config: false,
            fail_free_run_config: false,
            missing_features: HashSet::new(),
            timeout_sleep: Duration::ZERO,
            calls: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// Camera that replays `steps`, then times out forever
    pub fn scripted(steps: Vec<ScriptedPull>) -> Self {
        Self::with_source(Source::Scripted(steps.into()))
    }

    /// Camera that produces frames at `fps`
    pub fn generated(width: u32, height: u32, fps: f64) -> Self {
        let interval = Duration::from_secs_f64(1.0 / fps.max(1.0));
        let mut camera = Self::with_source(Source::Generated { interval, next_due: None });
        camera.width = width;
        camera.height = height;
        camera
    }

    /// Line goes high `delay` after arming and low again `width` later
    pub fn with_trigger_pulse(mut self, delay: Duration, width: Duration) -> Self {
        self.line.set(Some(false));
        self.line_schedule = vec![(Duration::ZERO, Some(false)), (delay, Some(true)), (delay + width, Some(false))];
        self
    }

    /// Arbitrary line schedule relative to arming
    pub fn with_line_schedule(mut self, schedule: Vec<(Duration, Option<bool>)>) -> Self {
        self.line_schedule = schedule;
        self
    }

    pub fn with_line_level(self, level: Option<bool>) -> Self {
        self.line.set(level);
        self
    }

    /// The camera exposes no readable line status
    pub fn without_trigger_line(mut self) -> Self {
        self.line_readable = false;
        self
    }

    pub fn without_acquisition_stop(mut self) -> Self {
        self.acquisition_stop_supported = false;
        self
    }

    /// Trigger nodes cannot be configured
    pub fn fail_configure_trigger(mut self) -> Self {
        self.fail_trigger_config = true;
        self
    }

    pub fn fail_configure_free_run(mut self) -> Self {
        self.fail_free_run_config = true;
        self
    }

    /// Feature nodes (e.g. `ExposureTime`) the camera does not have
    pub fn with_missing_features(mut self, features: &[&str]) -> Self {
        self.missing_features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    /// How long a scripted timeout blocks (capped by the pull timeout)
    pub fn with_timeout_sleep(mut self, sleep: Duration) -> Self {
        self.timeout_sleep = sleep;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<CallLog>> {
        self.calls.clone()
    }

    pub fn trigger_line(&self) -> TriggerLine {
        self.line.clone()
    }

    fn make_frame(&mut self) -> Frame {
        self.frame_id += 1;
        let size = self.pixel_format.frame_size(self.width, self.height);
        let shade = (self.frame_id % 256) as u8;
        Frame {
            frame_id: self.frame_id,
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
            data: vec![shade; size],
        }
    }

    fn apply_line_schedule(&mut self) {
        let Some(since) = self.triggered_since else {
            return;
        };
        let elapsed = since.elapsed();
        if let Some((_, level)) = self.line_schedule.iter().rev().find(|(at, _)| *at <= elapsed) {
            self.line.set(*level);
        }
    }

    fn gate_open(&self) -> bool {
        match self.mode {
            AcquisitionMode::FreeRun => true,
            AcquisitionMode::Triggered(_) => self.line.get() == Some(true),
        }
    }

    fn pull_generated(&mut self, timeout: Duration) -> FramePull {
        let deadline = Instant::now() + timeout;
        loop {
            self.apply_line_schedule();
            let now = Instant::now();

            if self.gate_open() {
                let Source::Generated { interval, next_due } = &mut self.source else {
                    return FramePull::Timeout;
                };
                let due = next_due.unwrap_or(now);
                if due <= deadline {
                    if due > now {
                        std::thread::sleep(due - now);
                    }
                    *next_due = Some(due.max(Instant::now()) + *interval);
                    return FramePull::Frame(self.make_frame());
                }
            } else if let Source::Generated { next_due, .. } = &mut self.source {
                *next_due = None;
            }

            if now >= deadline {
                return FramePull::Timeout;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(2)));
        }
    }

    fn pull_scripted(&mut self, timeout: Duration) -> CameraResult<FramePull> {
        loop {
            let step = match &mut self.source {
                Source::Scripted(steps) => steps.pop_front(),
                Source::Generated { .. } => return Ok(FramePull::Timeout),
            };
            match step {
                Some(ScriptedPull::SetLine(level)) => {
                    self.line.set(level);
                    continue;
                }
                Some(ScriptedPull::Frame) => return Ok(FramePull::Frame(self.make_frame())),
                Some(ScriptedPull::Incomplete) => return Ok(FramePull::Incomplete),
                Some(ScriptedPull::Error(message)) => return Err(CameraError::Sdk(message)),
                Some(ScriptedPull::Timeout) | None => {
                    std::thread::sleep(self.timeout_sleep.min(timeout));
                    return Ok(FramePull::Timeout);
                }
            }
        }
    }
}

impl Camera for SimulatedCamera {
    fn info(&self) -> CameraInfo {
        CameraInfo {
            id: "sim0".to_string(),
            name: "Simulated camera".to_string(),
            backend: "simulated".to_string(),
            has_trigger_line: self.line_readable,
        }
    }

    fn open(&mut self) -> CameraResult<()> {
        self.calls.lock().open += 1;
        self.open = true;
        Ok(())
    }

    fn configure(
        &mut self,
        mode: &AcquisitionMode,
        settings: &CameraSettings,
    ) -> CameraResult<ConfigureReport> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        if self.streaming {
            return Err(CameraError::Sdk("cannot configure while streaming".to_string()));
        }
        {
            let mut calls = self.calls.lock();
            calls.configure += 1;
            calls.modes.push(mode.clone());
        }

        let mut report = ConfigureReport::default();
        match mode {
            AcquisitionMode::FreeRun => {
                if self.fail_free_run_config {
                    return Err(CameraError::NodeUnavailable {
                        node: "AcquisitionMode".to_string(),
                        reason: "not writable".to_string(),
                    });
                }
                self.triggered_since = None;
            }
            AcquisitionMode::Triggered(trigger) => {
                if self.fail_trigger_config {
                    return Err(CameraError::NodeUnavailable {
                        node: "TriggerSource".to_string(),
                        reason: format!("entry {} not available", trigger.line),
                    });
                }
                if trigger.use_acquisition_stop {
                    if self.acquisition_stop_supported {
                        report.acquisition_stop_armed = true;
                    } else {
                        report.degrade("AcquisitionStop", "trigger selector entry not available");
                    }
                }
                self.triggered_since = Some(Instant::now());
                self.apply_line_schedule();
            }
        }
        self.mode = mode.clone();

        if self.missing_features.contains("PixelFormat") {
            report.degrade("PixelFormat", "node not available");
        } else {
            self.pixel_format = settings.pixel_format;
        }

        if let Some(exposure) = settings.exposure_us {
            if self.missing_features.contains("ExposureTime") {
                report.degrade("ExposureTime", "node not available");
            } else {
                let applied = FloatNode::new(20.0, 1_000_000.0).fit(exposure);
                self.calls.lock().applied_exposure_us = Some(applied);
            }
        }

        if let Some(gain) = settings.gain_db {
            if self.missing_features.contains("Gain") {
                report.degrade("Gain", "node not available");
            } else {
                let applied = FloatNode::new(0.0, 24.0).fit(gain);
                self.calls.lock().applied_gain_db = Some(applied);
            }
        }

        if settings.frame_rate.is_some() && self.missing_features.contains("AcquisitionFrameRate") {
            report.degrade("AcquisitionFrameRate", "node not available");
        }

        if let Some(roi) = settings.roi {
            if self.missing_features.contains("Roi") {
                report.degrade("Roi", "node not available");
            } else {
                self.width = IntegerNode::new(16, 2048, 16).fit(roi.width as i64) as u32;
                self.height = IntegerNode::new(16, 2048, 2).fit(roi.height as i64) as u32;
            }
        }

        Ok(report)
    }

    fn begin_stream(&mut self) -> CameraResult<()> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        self.calls.lock().begin_stream += 1;
        self.streaming = true;
        if let Source::Generated { next_due, .. } = &mut self.source {
            *next_due = None;
        }
        Ok(())
    }

    fn pull_next_frame(&mut self, timeout: Duration) -> CameraResult<FramePull> {
        if !self.streaming {
            return Err(CameraError::Sdk("stream not started".to_string()));
        }
        self.calls.lock().pulls += 1;
        match self.source {
            Source::Scripted(_) => self.pull_scripted(timeout),
            Source::Generated { .. } => Ok(self.pull_generated(timeout)),
        }
    }

    fn end_stream(&mut self) -> CameraResult<()> {
        if self.streaming {
            self.calls.lock().end_stream += 1;
            self.streaming = false;
        }
        Ok(())
    }

    fn close(&mut self) -> CameraResult<()> {
        if self.open {
            self.calls.lock().close += 1;
            self.open = false;
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn read_trigger_line_level(&mut self, _line: &str) -> Option<bool> {
        self.calls.lock().line_reads += 1;
        if !self.line_readable {
            return None;
        }
        self.apply_line_schedule();
        self.line.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::{TriggerSelector, TriggerSettings};

    fn triggered() -> AcquisitionMode {
        AcquisitionMode::Triggered(TriggerSettings {
            line: "Line0".to_string(),
            selector: TriggerSelector::AcquisitionStart,
            use_acquisition_stop: true,
        })
    }

    #[test]
    fn test_scripted_sequence() {
        let mut camera = SimulatedCamera::scripted(vec![
            ScriptedPull::Frame,
            ScriptedPull::SetLine(Some(true)),
            ScriptedPull::Incomplete,
            ScriptedPull::Error("grab failed".into()),
        ]);
        camera.open().unwrap();
        camera.begin_stream().unwrap();
        let timeout = Duration::from_millis(10);

        assert!(matches!(camera.pull_next_frame(timeout), Ok(FramePull::Frame(_))));
        assert!(matches!(camera.pull_next_frame(timeout), Ok(FramePull::Incomplete)));
        assert_eq!(camera.read_trigger_line_level("Line0"), Some(true));
        assert!(camera.pull_next_frame(timeout).is_err());
        assert!(matches!(camera.pull_next_frame(timeout), Ok(FramePull::Timeout)));
    }

    #[test]
    fn test_pull_requires_stream() {
        let mut camera = SimulatedCamera::scripted(vec![ScriptedPull::Frame]);
        camera.open().unwrap();
        assert!(camera.pull_next_frame(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_generated_is_gated_in_triggered_mode() {
        let mut camera = SimulatedCamera::generated(4, 4, 200.0).with_line_level(Some(false));
        let line = camera.trigger_line();
        camera.open().unwrap();
        camera.configure(&triggered(), &CameraSettings::default()).unwrap();
        camera.begin_stream().unwrap();

        let timeout = Duration::from_millis(20);
        assert!(matches!(camera.pull_next_frame(timeout), Ok(FramePull::Timeout)));

        line.set(Some(true));
        match camera.pull_next_frame(timeout).unwrap() {
            FramePull::Frame(frame) => assert_eq!(frame.data.len(), 16),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_line_schedule_follows_arming() {
        let mut camera = SimulatedCamera::scripted(Vec::new()).with_line_schedule(vec![
            (Duration::ZERO, Some(false)),
            (Duration::from_millis(30), Some(true)),
            (Duration::from_millis(200), None),
        ]);
        camera.open().unwrap();
        assert_eq!(camera.read_trigger_line_level("Line0"), None);

        camera.configure(&triggered(), &CameraSettings::default()).unwrap();
        assert_eq!(camera.read_trigger_line_level("Line0"), Some(false));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(camera.read_trigger_line_level("Line0"), Some(true));
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(camera.read_trigger_line_level("Line0"), None);
    }

    #[test]
    fn test_missing_features_degrade() {
        let mut camera = SimulatedCamera::scripted(Vec::new())
            .with_missing_features(&["ExposureTime"])
            .without_acquisition_stop();
        camera.open().unwrap();
        let settings = CameraSettings {
            exposure_us: Some(5_000.0),
            gain_db: Some(40.0),
            ..CameraSettings::default()
        };
        let report = camera.configure(&triggered(), &settings).unwrap();

        assert!(report.is_degraded("ExposureTime"));
        assert!(report.is_degraded("AcquisitionStop"));
        assert!(!report.acquisition_stop_armed);
        assert_eq!(camera.calls().lock().applied_gain_db, Some(24.0));
    }

    #[test]
    fn test_trigger_configuration_failure() {
        let mut camera = SimulatedCamera::scripted(Vec::new()).fail_configure_trigger();
        camera.open().unwrap();
        let err = camera.configure(&triggered(), &CameraSettings::default()).unwrap_err();
        assert!(matches!(err, CameraError::NodeUnavailable { .. }));
    }
}
