//! Camera Capture Layer
//!
//! The camera is a scoped resource. A [`StreamHandle`] is created when a
//! session goes live and stops the underlying stream exactly once, either on
//! an explicit [`StreamHandle::release`] or when the handle is dropped.

pub mod frame;

#[cfg(test)]
pub mod fake;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::frame::CapturedFrame;

/// Default guide-box inset in pixels
pub const DEFAULT_CROP_MARGIN: u32 = 4;

/// Camera failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("camera access denied")]
    PermissionDenied,
    #[error("failed to read frame: {0}")]
    FrameRead(String),
}

/// Which camera to prefer on devices with several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Rear camera, pointed at the document
    #[default]
    Environment,
    /// Front camera
    User,
}

/// Camera capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Inset of the on-screen guide box; the still is cropped to it
    pub crop_margin: u32,
    /// Preferred camera
    pub facing: Facing,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            crop_margin: DEFAULT_CROP_MARGIN,
            facing: Facing::Environment,
        }
    }
}

/// A running camera stream
pub trait FrameStream: Send {
    /// Read the current frame
    fn read_frame(&mut self) -> Result<CapturedFrame, DeviceError>;

    /// Stop the stream and release the device
    fn stop(&mut self);
}

/// A camera that can be opened into a [`FrameStream`]
pub trait CameraDevice: Send {
    /// Acquire the device and start streaming
    fn open(&mut self, facing: Facing) -> Result<Box<dyn FrameStream>, DeviceError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Owns an open stream and stops it exactly once
pub struct StreamHandle {
    stream: Option<Box<dyn FrameStream>>,
}

impl StreamHandle {
    pub fn new(stream: Box<dyn FrameStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Read a frame from the open stream
    pub fn read_frame(&mut self) -> Result<CapturedFrame, DeviceError> {
        match self.stream.as_mut() {
            Some(stream) => stream.read_frame(),
            None => Err(DeviceError::FrameRead("stream already released".to_string())),
        }
    }

    /// Stop the stream; later calls are no-ops
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("Camera stream released");
        }
    }

    /// Whether the stream is still open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera that serves a photo from disk as its live frame
pub struct ImageFileCamera {
    path: PathBuf,
}

impl ImageFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraDevice for ImageFileCamera {
    fn open(&mut self, _facing: Facing) -> Result<Box<dyn FrameStream>, DeviceError> {
        let image = image::open(&self.path).map_err(|e| match e {
            image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                DeviceError::PermissionDenied
            }
            e => DeviceError::Unavailable(format!("{}: {}", self.path.display(), e)),
        })?;
        let frame = CapturedFrame::from_rgba_image(image.to_rgba8());

        info!(
            "Opened image camera {:?} ({}x{})",
            self.path, frame.width, frame.height
        );

        Ok(Box::new(StillImageStream { frame }))
    }

    fn describe(&self) -> String {
        format!("image file {}", self.path.display())
    }
}

/// Stream that repeats one decoded image
struct StillImageStream {
    frame: CapturedFrame,
}

impl FrameStream for StillImageStream {
    fn read_frame(&mut self) -> Result<CapturedFrame, DeviceError> {
        Ok(CapturedFrame::new(
            self.frame.data.clone(),
            self.frame.width,
            self.frame.height,
        ))
    }

    fn stop(&mut self) {
        debug!("Image camera stopped");
    }
}
