//! Capture Session
//!
//! State machine for one document scan:
//!
//! ```text
//! Idle --start--> Live --capture--> Captured --process--> Processing --> Idle (record emitted)
//!                  ^                    |                      |
//!                  +------retake--------+------retake----------+--> Errored
//! ```
//!
//! The session is the only owner of the camera stream and the held still.
//! The stream exists only while `Live` and is released on every way out of
//! it. `close` returns to `Idle` from anywhere.
//!
//! `close`, `retake` and dropping the last handle abort the in-flight
//! pipeline task, which drops its copy of the still and any pending request.
//! Each run also carries the generation it started in, so a result that
//! races the abort is dropped instead of applied.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::frame::CapturedFrame;
use crate::capture::{CameraDevice, CaptureConfig, DeviceError, StreamHandle};
use crate::mrz::{self, MrzDocument, ParseError, ParserConfig};
use crate::shared::SessionEvent;
use crate::vision::{OcrClient, OcrError};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Camera off
    Idle,
    /// Camera streaming, nothing captured
    Live,
    /// Still held, camera released
    Captured,
    /// OCR and parse in flight
    Processing,
    /// Last run failed; retake or close
    Errored,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Live => "live",
            SessionState::Captured => "captured",
            SessionState::Processing => "processing",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Error category shown to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Device,
    Ocr,
    Parse,
    InvalidTransition,
}

/// Session failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Device(_) => ErrorKind::Device,
            SessionError::Ocr(_) => ErrorKind::Ocr,
            SessionError::Parse(_) => ErrorKind::Parse,
            SessionError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }

    /// Message for the host to display
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Device(e) => format!("Could not access the camera: {}", e),
            SessionError::Ocr(e) => format!("Could not read the document: {}", e),
            SessionError::Parse(e) => format!("Could not locate the scannable zone: {}", e),
            SessionError::InvalidTransition { .. } => self.to_string(),
        }
    }
}

struct SessionInner {
    state: SessionState,
    camera: Box<dyn CameraDevice>,
    stream: Option<StreamHandle>,
    still: Option<CapturedFrame>,
    last_error: Option<SessionError>,
    generation: u64,
    pipeline: Option<AbortHandle>,
}

struct Shared {
    id: Uuid,
    inner: Mutex<SessionInner>,
    events: Sender<SessionEvent>,
}

impl Shared {
    fn emit(&self, event: SessionEvent) {
        // The host may have stopped listening; the session keeps working
        let _ = self.events.send(event);
    }

    fn transition(&self, inner: &mut SessionInner, to: SessionState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        debug!("Session {} {} -> {}", self.id, from, to);
        self.emit(SessionEvent::StateChanged { from, to });
    }

    /// Abort the in-flight pipeline and invalidate its result
    fn cancel_pipeline(&self, inner: &mut SessionInner) {
        inner.generation += 1;
        if let Some(task) = inner.pipeline.take() {
            task.abort();
            debug!("Session {} aborted in-flight pipeline", self.id);
        }
    }

    fn release_stream(&self, inner: &mut SessionInner) {
        if let Some(mut stream) = inner.stream.take() {
            stream.release();
        }
    }

    fn fail(&self, inner: &mut SessionInner, error: SessionError) {
        self.release_stream(inner);
        inner.still = None;
        warn!("Session {} failed ({:?}): {}", self.id, error.kind(), error);
        inner.last_error = Some(error.clone());
        self.transition(inner, SessionState::Errored);
        self.emit(SessionEvent::Failed {
            kind: error.kind(),
            message: error.user_message(),
        });
    }

    /// Acquire the camera and go live, or fail with a device error
    fn go_live(
        &self,
        inner: &mut SessionInner,
        capture: &CaptureConfig,
    ) -> Result<SessionState, SessionError> {
        match inner.camera.open(capture.facing) {
            Ok(stream) => {
                info!("Session {} live on {}", self.id, inner.camera.describe());
                inner.stream = Some(StreamHandle::new(stream));
                self.transition(inner, SessionState::Live);
                Ok(SessionState::Live)
            }
            Err(e) => {
                let error = SessionError::from(e);
                self.fail(inner, error.clone());
                Err(error)
            }
        }
    }

    /// Apply a finished pipeline run if it still belongs to the current state
    fn complete(&self, generation: u64, outcome: Result<(MrzDocument, String), SessionError>) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != SessionState::Processing {
            debug!(
                "Session {} discarding stale pipeline result (generation {}, now {} in {})",
                self.id, generation, inner.generation, inner.state
            );
            return;
        }

        inner.pipeline = None;
        match outcome {
            Ok((document, raw_text)) => {
                info!(
                    "Session {} read {} document {}",
                    self.id, document.document_type, document.document_number
                );
                inner.still = None;
                self.transition(&mut inner, SessionState::Idle);
                self.emit(SessionEvent::Scanned { document, raw_text });
            }
            Err(error) => self.fail(&mut inner, error),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().pipeline.take() {
            task.abort();
        }
    }
}

/// Handle to a capture session
///
/// Cloning the handle shares the session. The camera is released when the
/// last handle is dropped.
#[derive(Clone)]
pub struct CaptureSession {
    shared: Arc<Shared>,
    ocr: Arc<dyn OcrClient>,
    capture: CaptureConfig,
    parser: ParserConfig,
    runtime: Handle,
}

impl CaptureSession {
    /// Create an idle session
    pub fn new(
        camera: Box<dyn CameraDevice>,
        ocr: Arc<dyn OcrClient>,
        events: Sender<SessionEvent>,
        runtime: Handle,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!("Session {} created with {} OCR", id, ocr.name());

        Self {
            shared: Arc::new(Shared {
                id,
                inner: Mutex::new(SessionInner {
                    state: SessionState::Idle,
                    camera,
                    stream: None,
                    still: None,
                    last_error: None,
                    generation: 0,
                    pipeline: None,
                }),
                events,
            }),
            ocr,
            capture: CaptureConfig::default(),
            parser: ParserConfig::default(),
            runtime,
        }
    }

    pub fn with_capture_config(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_parser_config(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    pub fn last_error(&self) -> Option<SessionError> {
        self.shared.inner.lock().last_error.clone()
    }

    fn reject(&self, action: &'static str, state: SessionState) -> SessionError {
        debug!("Session {} rejected {} while {}", self.shared.id, action, state);
        SessionError::InvalidTransition { action, state }
    }

    /// Idle -> Live
    pub fn start(&self) -> Result<SessionState, SessionError> {
        let mut inner = self.shared.inner.lock();
        if inner.state != SessionState::Idle {
            return Err(self.reject("start", inner.state));
        }
        self.shared.go_live(&mut inner, &self.capture)
    }

    /// Live -> Captured: freeze one frame and release the camera
    pub fn capture(&self) -> Result<SessionState, SessionError> {
        let mut inner = self.shared.inner.lock();
        if inner.state != SessionState::Live {
            return Err(self.reject("capture", inner.state));
        }

        let frame = match inner.stream.take() {
            Some(mut stream) => {
                let frame = stream.read_frame();
                stream.release();
                frame
            }
            None => Err(DeviceError::Unavailable("no active stream".to_string())),
        };

        match frame {
            Ok(frame) => {
                let still = frame.crop_inner(self.capture.crop_margin);
                let (width, height) = still.dimensions();
                debug!(
                    "Session {} captured {}x{} still (frame {}x{})",
                    self.shared.id, width, height, frame.width, frame.height
                );
                inner.still = Some(still);
                self.shared.transition(&mut inner, SessionState::Captured);
                Ok(SessionState::Captured)
            }
            Err(e) => {
                let error = SessionError::from(e);
                self.shared.fail(&mut inner, error.clone());
                Err(error)
            }
        }
    }

    /// Captured, Processing or Errored -> Live: drop the still and reopen the camera
    pub fn retake(&self) -> Result<SessionState, SessionError> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            SessionState::Captured | SessionState::Processing | SessionState::Errored => {}
            state => return Err(self.reject("retake", state)),
        }

        self.shared.cancel_pipeline(&mut inner);
        inner.still = None;
        inner.last_error = None;
        self.shared.release_stream(&mut inner);
        self.shared.go_live(&mut inner, &self.capture)
    }

    /// Captured -> Processing: run OCR then parse on a runtime task.
    ///
    /// Returns the task handle, or `None` when a run is already in flight.
    pub fn process(&self) -> Result<Option<JoinHandle<()>>, SessionError> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            SessionState::Processing => {
                debug!("Session {} already processing, ignoring", self.shared.id);
                return Ok(None);
            }
            SessionState::Captured => {}
            state => return Err(self.reject("process", state)),
        }

        let Some(still) = inner.still.clone() else {
            return Err(self.reject("process", inner.state));
        };

        inner.generation += 1;
        let generation = inner.generation;
        self.shared.transition(&mut inner, SessionState::Processing);

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let ocr = Arc::clone(&self.ocr);
        let parser = self.parser;

        // Spawned under the lock so the abort handle is stored before the task can finish
        let task = self.runtime.spawn(async move {
            let outcome = run_pipeline(ocr.as_ref(), &still, &parser).await;
            match shared.upgrade() {
                Some(shared) => shared.complete(generation, outcome),
                None => debug!("Session dropped before pipeline finished"),
            }
        });
        inner.pipeline = Some(task.abort_handle());

        Ok(Some(task))
    }

    /// Any -> Idle: release the camera, drop the still, clear the error
    pub fn close(&self) -> SessionState {
        let mut inner = self.shared.inner.lock();
        let streaming = inner.stream.as_ref().is_some_and(|s| s.is_open());
        debug!(
            "Session {} closing from {} (camera {})",
            self.shared.id,
            inner.state,
            if streaming { "open" } else { "closed" }
        );
        self.shared.cancel_pipeline(&mut inner);
        self.shared.release_stream(&mut inner);
        inner.still = None;
        inner.last_error = None;
        self.shared.transition(&mut inner, SessionState::Idle);
        SessionState::Idle
    }
}

#[cfg(test)]
impl CaptureSession {
    /// Whether a still image is held
    pub fn has_still(&self) -> bool {
        self.shared.inner.lock().still.is_some()
    }

    /// Dimensions of the held still
    pub fn still_dimensions(&self) -> Option<(u32, u32)> {
        self.shared.inner.lock().still.as_ref().map(|s| s.dimensions())
    }

    /// Whether the camera stream is open
    pub fn is_streaming(&self) -> bool {
        self.shared
            .inner
            .lock()
            .stream
            .as_ref()
            .is_some_and(|s| s.is_open())
    }

    /// Whether a pipeline task is registered as in flight
    pub fn has_pipeline(&self) -> bool {
        self.shared.inner.lock().pipeline.is_some()
    }
}

/// OCR then parse; the parse step only runs on recognized text
async fn run_pipeline(
    ocr: &dyn OcrClient,
    still: &CapturedFrame,
    parser: &ParserConfig,
) -> Result<(MrzDocument, String), SessionError> {
    let raw_text = ocr.recognize(still).await?;
    let document = mrz::parse(&raw_text, parser)?;
    Ok((document, raw_text))
}
