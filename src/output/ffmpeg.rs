//! MJPEG AVI writer backed by an FFmpeg child process
//!
//! Raw frames are piped to FFmpeg's stdin. The process is started on the first
//! frame, once the frame geometry is known.

use super::writer::{FrameSink, FrameWriter, WriterError, WriterSummary};
use crate::capture::{Frame, PixelFormat};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

/// Map a 1..=100 quality onto MJPEG's qscale (2 best .. 31 worst)
pub fn mjpeg_qscale(quality: u8) -> u8 {
    let quality = quality.clamp(1, 100) as u32;
    let q = 31 - ((quality - 1) * 29 + 49) / 99;
    q as u8
}

/// FFmpeg arguments for encoding raw frames from stdin to an MJPEG AVI
pub fn build_encoder_args(
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frame_rate: f64,
    quality: u8,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        pixel_format.ffmpeg_name().to_string(),
        "-video_size".to_string(),
        format!("{width}x{height}"),
        "-framerate".to_string(),
        format!("{frame_rate}"),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        "mjpeg".to_string(),
        "-q:v".to_string(),
        mjpeg_qscale(quality).to_string(),
        "-pix_fmt".to_string(),
        "yuvj420p".to_string(),
        "-f".to_string(),
        "avi".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Read `stream` to the end on a background thread
fn drain<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = stream.read_to_end(&mut buf) {
            tracing::debug!("FFmpeg stderr read failed: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Opens [`FfmpegAviWriter`]s
pub struct FfmpegAviSink {
    program: String,
    verified: bool,
}

impl FfmpegAviSink {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific FFmpeg executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            verified: false,
        }
    }

    fn verify(&mut self) -> Result<(), WriterError> {
        if self.verified {
            return Ok(());
        }
        let output = Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| WriterError::Encoder(format!("FFmpeg not found ({}): {}", self.program, e)))?;
        if !output.success() {
            return Err(WriterError::Encoder(format!("{} -version failed", self.program)));
        }
        self.verified = true;
        Ok(())
    }
}

impl Default for FfmpegAviSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FfmpegAviSink {
    fn open(&mut self, path: &Path, frame_rate: f64, quality: u8) -> Result<Box<dyn FrameWriter>, WriterError> {
        self.verify()?;

        // Claim the name and surface permission problems before the first frame.
        File::create(path).map_err(|e| WriterError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        tracing::info!(
            "Opened {:?} (MJPEG AVI, {} fps, quality {})",
            path,
            frame_rate,
            quality
        );

        Ok(Box::new(FfmpegAviWriter {
            program: self.program.clone(),
            path: path.to_path_buf(),
            frame_rate,
            quality,
            process: None,
            stderr: None,
            geometry: None,
            frames: 0,
        }))
    }
}

/// One AVI file being encoded
pub struct FfmpegAviWriter {
    program: String,
    path: PathBuf,
    frame_rate: f64,
    quality: u8,
    process: Option<Child>,
    /// FFmpeg's stderr, read to the end on a background thread
    stderr: Option<JoinHandle<String>>,
    geometry: Option<(u32, u32, PixelFormat)>,
    frames: u64,
}

impl FfmpegAviWriter {
    fn spawn(&mut self, frame: &Frame) -> Result<(), WriterError> {
        let args = build_encoder_args(
            frame.width,
            frame.height,
            frame.pixel_format,
            self.frame_rate,
            self.quality,
            &self.path,
        );
        let mut process = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WriterError::Encoder(format!("Failed to start FFmpeg: {}", e)))?;

        tracing::debug!(
            "Started FFmpeg encoder: {}x{} {:?} -> {:?}",
            frame.width,
            frame.height,
            frame.pixel_format,
            self.path
        );

        self.stderr = process.stderr.take().map(drain);
        self.process = Some(process);
        self.geometry = Some((frame.width, frame.height, frame.pixel_format));
        Ok(())
    }
}

impl FrameWriter for FfmpegAviWriter {
    fn append(&mut self, frame: &Frame) -> Result<(), WriterError> {
        match self.geometry {
            None => self.spawn(frame)?,
            Some(geometry) if geometry != (frame.width, frame.height, frame.pixel_format) => {
                return Err(WriterError::Encoder(format!(
                    "frame geometry changed mid-recording: {:?} -> {}x{} {:?}",
                    geometry, frame.width, frame.height, frame.pixel_format
                )));
            }
            Some(_) => {}
        }

        let expected = frame.pixel_format.frame_size(frame.width, frame.height);
        if frame.data.len() != expected {
            return Err(WriterError::Encoder(format!(
                "frame {} has {} bytes, expected {}",
                frame.frame_id,
                frame.data.len(),
                expected
            )));
        }

        let stdin = self
            .process
            .as_mut()
            .and_then(|p| p.stdin.as_mut())
            .ok_or_else(|| WriterError::Encoder("FFmpeg stdin unavailable".to_string()))?;
        stdin.write_all(&frame.data)?;
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<WriterSummary, WriterError> {
        if let Some(mut process) = self.process.take() {
            // Closing stdin signals EOF
            drop(process.stdin.take());
            let status = process.wait()?;
            let stderr = match self.stderr.take() {
                Some(handle) => handle.join().unwrap_or_default(),
                None => String::new(),
            };
            if !status.success() {
                return Err(WriterError::Encoder(format!(
                    "FFmpeg exited with status {}: {}",
                    status,
                    stderr.trim()
                )));
            }
        } else {
            // FFmpeg never started, so the file is still the empty placeholder.
            tracing::warn!("No frames written, removing {:?}", self.path);
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
        }

        Ok(WriterSummary {
            path: self.path.clone(),
            frames: self.frames,
        })
    }
}
