//! UVC webcam backend using nokhwa
//!
//! Useful for bench testing without rig hardware. UVC devices expose no GPIO,
//! so triggered acquisition is refused and the trigger line is never readable.
//!
//! nokhwa's frame grab blocks until the device delivers, so the device lives
//! on a worker thread that queues decoded frames; pulls wait on that queue
//! for at most their timeout.

use super::traits::{
    AcquisitionMode, Camera, CameraError, CameraInfo, CameraResult, CameraSettings,
    ConfigureReport, Frame, FramePull, PixelFormat,
};
use nokhwa::pixel_format::LumaFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Frames buffered between the worker and the recorder. When full, new frames are dropped.
const FRAME_QUEUE: usize = 4;

/// List available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                    backend: "uvc".to_string(),
                    has_trigger_line: false,
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Requests handled by the worker thread
enum Control {
    Begin(Sender<CameraResult<()>>),
    End(Sender<CameraResult<()>>),
    Shutdown,
}

struct Worker {
    control: Sender<Control>,
    frames: Receiver<CameraResult<FramePull>>,
    handle: JoinHandle<()>,
}

fn worker_stopped() -> CameraError {
    CameraError::Sdk("webcam worker stopped".to_string())
}

/// Wait up to `timeout` for the next queued frame
fn receive(frames: &Receiver<CameraResult<FramePull>>, timeout: Duration) -> CameraResult<FramePull> {
    match frames.recv_timeout(timeout) {
        Ok(pull) => pull,
        Err(RecvTimeoutError::Timeout) => Ok(FramePull::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(worker_stopped()),
    }
}

fn grab(camera: &mut nokhwa::Camera, frame_id: &mut u64) -> CameraResult<FramePull> {
    let buffer = camera
        .frame()
        .map_err(|e| CameraError::Sdk(format!("frame grab failed: {}", e)))?;

    let image = match buffer.decode_image::<LumaFormat>() {
        Ok(image) => image,
        Err(e) => {
            tracing::debug!("Dropping undecodable frame: {}", e);
            return Ok(FramePull::Incomplete);
        }
    };

    *frame_id += 1;
    Ok(FramePull::Frame(Frame {
        frame_id: *frame_id,
        width: image.width(),
        height: image.height(),
        pixel_format: PixelFormat::Mono8,
        data: image.into_raw(),
    }))
}

fn start_stream(camera: &mut nokhwa::Camera) -> CameraResult<()> {
    camera
        .open_stream()
        .map_err(|e| CameraError::Sdk(format!("failed to open stream: {}", e)))?;
    let format = camera.camera_format();
    tracing::info!(
        "Webcam streaming: {}x{} @ {}fps ({:?})",
        format.resolution().width(),
        format.resolution().height(),
        format.frame_rate(),
        format.format()
    );
    Ok(())
}

/// Owns the device for its whole life. Grabs frames while streaming and
/// serves control requests between grabs.
fn run_worker(
    index: CameraIndex,
    opened: Sender<CameraResult<String>>,
    control: Receiver<Control>,
    frames: SyncSender<CameraResult<FramePull>>,
) {
    let format = RequestedFormat::new::<LumaFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera = match nokhwa::Camera::new(index.clone(), format) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = opened.send(Err(CameraError::NotFound(format!("camera {:?}: {}", index, e))));
            return;
        }
    };
    let _ = opened.send(Ok(camera.info().human_name().to_string()));

    let mut streaming = false;
    let mut frame_id = 0;
    loop {
        let request = if streaming {
            match control.try_recv() {
                Ok(request) => Some(request),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Control::Shutdown),
            }
        } else {
            Some(control.recv().unwrap_or(Control::Shutdown))
        };

        match request {
            Some(Control::Begin(reply)) => {
                let result = if streaming { Ok(()) } else { start_stream(&mut camera) };
                streaming = result.is_ok();
                let _ = reply.send(result);
                continue;
            }
            Some(Control::End(reply)) => {
                let result = if streaming {
                    camera
                        .stop_stream()
                        .map_err(|e| CameraError::Sdk(format!("failed to stop stream: {}", e)))
                } else {
                    Ok(())
                };
                streaming = false;
                let _ = reply.send(result);
                continue;
            }
            Some(Control::Shutdown) => {
                if streaming {
                    if let Err(e) = camera.stop_stream() {
                        tracing::warn!("Failed to stop webcam stream: {}", e);
                    }
                }
                return;
            }
            None => {}
        }

        let pull = grab(&mut camera, &mut frame_id);
        let failed = pull.is_err();
        match frames.try_send(pull) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::trace!("Frame queue full, dropping frame"),
            Err(TrySendError::Disconnected(_)) => return,
        }
        if failed {
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

pub struct WebcamCamera {
    device_id: Option<String>,
    name: Option<String>,
    worker: Option<Worker>,
    streaming: bool,
}

impl WebcamCamera {
    /// `device_id` is an index or a backend device string; `None` picks the first camera
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id,
            name: None,
            worker: None,
            streaming: false,
        }
    }

    fn camera_index(&self) -> CameraIndex {
        match &self.device_id {
            Some(id) => match id.parse::<u32>() {
                Ok(idx) => CameraIndex::Index(idx),
                Err(_) => CameraIndex::String(id.clone()),
            },
            None => CameraIndex::Index(0),
        }
    }

    fn worker(&self) -> CameraResult<&Worker> {
        self.worker.as_ref().ok_or(CameraError::NotOpen)
    }

    /// Send a request to the worker and wait for its answer
    fn request(&self, make: impl FnOnce(Sender<CameraResult<()>>) -> Control) -> CameraResult<()> {
        let worker = self.worker()?;
        let (tx, rx) = mpsc::channel();
        worker.control.send(make(tx)).map_err(|_| worker_stopped())?;
        rx.recv().map_err(|_| worker_stopped())?
    }
}

impl Camera for WebcamCamera {
    fn info(&self) -> CameraInfo {
        CameraInfo {
            id: self.device_id.clone().unwrap_or_else(|| "0".to_string()),
            name: self.name.clone().unwrap_or_else(|| "UVC camera".to_string()),
            backend: "uvc".to_string(),
            has_trigger_line: false,
        }
    }

    fn open(&mut self) -> CameraResult<()> {
        if list_cameras().is_empty() {
            return Err(CameraError::NotFound("no UVC cameras detected".to_string()));
        }
        let index = self.camera_index();
        let (opened_tx, opened_rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel();
        let (frames_tx, frames_rx) = mpsc::sync_channel(FRAME_QUEUE);

        let handle = std::thread::Builder::new()
            .name("webcam".to_string())
            .spawn(move || run_worker(index, opened_tx, control_rx, frames_tx))
            .map_err(|e| CameraError::Sdk(format!("failed to start webcam worker: {}", e)))?;

        match opened_rx.recv() {
            Ok(Ok(name)) => {
                self.name = Some(name);
                self.worker = Some(Worker {
                    control: control_tx,
                    frames: frames_rx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(worker_stopped())
            }
        }
    }

    fn configure(
        &mut self,
        mode: &AcquisitionMode,
        settings: &CameraSettings,
    ) -> CameraResult<ConfigureReport> {
        self.worker()?;
        if let AcquisitionMode::Triggered(trigger) = mode {
            return Err(CameraError::NodeUnavailable {
                node: "TriggerMode".to_string(),
                reason: format!("UVC devices have no trigger input ({})", trigger.line),
            });
        }

        let mut report = ConfigureReport::default();
        if settings.pixel_format != PixelFormat::Mono8 {
            report.degrade("PixelFormat", "UVC frames are decoded to Mono8");
        }
        if settings.exposure_us.is_some() {
            report.degrade("ExposureTime", "not exposed by the UVC backend");
        }
        if settings.gain_db.is_some() {
            report.degrade("Gain", "not exposed by the UVC backend");
        }
        if settings.frame_rate.is_some() {
            report.degrade("AcquisitionFrameRate", "device picks its highest frame rate");
        }
        if settings.roi.is_some() {
            report.degrade("Roi", "not exposed by the UVC backend");
        }
        Ok(report)
    }

    fn begin_stream(&mut self) -> CameraResult<()> {
        self.request(Control::Begin)?;
        self.streaming = true;
        Ok(())
    }

    fn pull_next_frame(&mut self, timeout: Duration) -> CameraResult<FramePull> {
        if !self.streaming {
            return Err(CameraError::Sdk("stream not started".to_string()));
        }
        receive(&self.worker()?.frames, timeout)
    }

    fn end_stream(&mut self) -> CameraResult<()> {
        if self.streaming {
            self.streaming = false;
            self.request(Control::End)?;
            // Frames grabbed before the stop belong to the old mode.
            let dropped = self.worker()?.frames.try_iter().count();
            if dropped > 0 {
                tracing::debug!("Discarded {} queued frames", dropped);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> CameraResult<()> {
        self.end_stream()?;
        if let Some(worker) = self.worker.take() {
            let _ = worker.control.send(Control::Shutdown);
            if worker.handle.join().is_err() {
                tracing::warn!("Webcam worker panicked");
            }
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn read_trigger_line_level(&mut self, _line: &str) -> Option<bool> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_receive_honours_timeout() {
        let (_tx, rx) = mpsc::sync_channel::<CameraResult<FramePull>>(FRAME_QUEUE);
        let started = Instant::now();

        let pull = receive(&rx, Duration::from_millis(30)).unwrap();

        assert!(matches!(pull, FramePull::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_receive_returns_queued_frame() {
        let (tx, rx) = mpsc::sync_channel(FRAME_QUEUE);
        tx.try_send(Ok(FramePull::Incomplete)).unwrap();
        assert!(matches!(receive(&rx, Duration::from_secs(5)), Ok(FramePull::Incomplete)));

        drop(tx);
        assert!(receive(&rx, Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_unopened_camera_refuses_requests() {
        let mut camera = WebcamCamera::new(Some("3".to_string()));
        assert!(matches!(camera.begin_stream(), Err(CameraError::NotOpen)));
        assert!(matches!(camera.camera_index(), CameraIndex::Index(3)));
        camera.close().unwrap();
    }
}
