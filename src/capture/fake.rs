//! In-memory camera for tests
//!
//! Counts opens and releases so tests can check that no stream is left open.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::frame::CapturedFrame;
use super::{CameraDevice, DeviceError, Facing, FrameStream};

#[derive(Debug, Default)]
pub struct CameraProbe {
    opened: AtomicUsize,
    released: AtomicUsize,
    pending_failures: AtomicUsize,
}

impl CameraProbe {
    /// Make the next `count` opens fail, even after the camera was handed off
    pub fn fail_next_opens(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn open_streams(&self) -> usize {
        self.opened() - self.released()
    }
}

pub struct FakeCamera {
    probe: Arc<CameraProbe>,
    width: u32,
    height: u32,
    /// Number of upcoming `open` calls that fail
    pub fail_opens: usize,
    /// Frame reads fail
    pub fail_reads: bool,
}

impl FakeCamera {
    pub fn new() -> (Self, Arc<CameraProbe>) {
        Self::with_size(32, 16)
    }

    pub fn with_size(width: u32, height: u32) -> (Self, Arc<CameraProbe>) {
        let probe = Arc::new(CameraProbe::default());
        let camera = Self {
            probe: Arc::clone(&probe),
            width,
            height,
            fail_opens: 0,
            fail_reads: false,
        };
        (camera, probe)
    }
}

impl CameraDevice for FakeCamera {
    fn open(&mut self, _facing: Facing) -> Result<Box<dyn FrameStream>, DeviceError> {
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            return Err(DeviceError::PermissionDenied);
        }
        if self.probe.take_failure() {
            return Err(DeviceError::Unavailable("camera unplugged".to_string()));
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            probe: Arc::clone(&self.probe),
            width: self.width,
            height: self.height,
            fail_reads: self.fail_reads,
        }))
    }

    fn describe(&self) -> String {
        "fake camera".to_string()
    }
}

struct FakeStream {
    probe: Arc<CameraProbe>,
    width: u32,
    height: u32,
    fail_reads: bool,
}

impl FrameStream for FakeStream {
    fn read_frame(&mut self) -> Result<CapturedFrame, DeviceError> {
        if self.fail_reads {
            return Err(DeviceError::FrameRead("sensor timeout".to_string()));
        }
        let data = vec![128; (self.width * self.height * 4) as usize];
        Ok(CapturedFrame::new(data, self.width, self.height))
    }

    fn stop(&mut self) {
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }
}
