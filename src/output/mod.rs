//! Recording output
//!
//! - `writer`: the frame writer collaborator and its close-once guard
//! - `ffmpeg`: MJPEG AVI encoding through FFmpeg
//! - `sidecar`: JSON session records next to each video

pub mod ffmpeg;
pub mod sidecar;
pub mod writer;

pub use ffmpeg::FfmpegAviSink;
pub use writer::{FrameSink, FrameWriter, RecordingFile, WriterError, WriterSummary};
