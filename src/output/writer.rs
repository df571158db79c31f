//! Frame writer collaborator
//!
//! The recorder opens one writer per recording through a [`FrameSink`] and
//! wraps it in a [`RecordingFile`], which closes it exactly once.

use crate::capture::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output writer errors
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Writer already closed")]
    Closed,
}

/// What a writer produced
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSummary {
    pub path: PathBuf,
    pub frames: u64,
}

/// An open output file
pub trait FrameWriter: Send {
    fn append(&mut self, frame: &Frame) -> Result<(), WriterError>;

    /// Flush and close. Called once per writer.
    fn close(&mut self) -> Result<WriterSummary, WriterError>;
}

/// Opens output files
pub trait FrameSink: Send {
    /// `quality` is 1..=100, higher is better
    fn open(&mut self, path: &Path, frame_rate: f64, quality: u8) -> Result<Box<dyn FrameWriter>, WriterError>;
}

/// Guard around an open writer that closes it exactly once, on `finalize` or
/// on drop, whichever comes first.
pub struct RecordingFile {
    path: PathBuf,
    writer: Option<Box<dyn FrameWriter>>,
}

impl RecordingFile {
    pub fn new(path: PathBuf, writer: Box<dyn FrameWriter>) -> Self {
        Self {
            path,
            writer: Some(writer),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn append(&mut self, frame: &Frame) -> Result<(), WriterError> {
        match self.writer.as_mut() {
            Some(writer) => writer.append(frame),
            None => Err(WriterError::Closed),
        }
    }

    /// Close the writer. Later calls return `WriterError::Closed`.
    pub fn finalize(&mut self) -> Result<WriterSummary, WriterError> {
        let mut writer = self.writer.take().ok_or(WriterError::Closed)?;
        let summary = writer.close()?;
        tracing::info!("Closed {:?} ({} frames)", summary.path, summary.frames);
        Ok(summary)
    }
}

impl Drop for RecordingFile {
    fn drop(&mut self) {
        if self.is_open() {
            tracing::warn!("Recording file {:?} dropped while open, closing", self.path);
            if let Err(e) = self.finalize() {
                tracing::error!("Failed to close {:?}: {}", self.path, e);
            }
        }
    }
}
