//! Application Coordinator
//!
//! Wires configuration, the OCR backend and a camera into a capture session,
//! owns the async runtime the pipeline runs on, and collects the session's
//! events for the host.

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::capture::CameraDevice;
use crate::config::AppConfig;
use crate::mrz::MrzDocument;
use crate::session::CaptureSession;
use crate::shared::SessionEvent;
use crate::vision::{self, OcrClient};

/// Outcome of a successful scan, ready for form prefill
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub document: MrzDocument,
    pub raw_text: String,
}

/// Main application coordinator
pub struct ScanApp {
    session: CaptureSession,
    events: Receiver<SessionEvent>,
    runtime: Runtime,
}

impl ScanApp {
    /// Create a coordinator using the configured OCR backend
    pub fn new(config: &AppConfig, camera: Box<dyn CameraDevice>) -> Result<Self> {
        let ocr = vision::create_client(&config.ocr)?;
        Self::with_client(config, camera, ocr)
    }

    /// Create a coordinator with an explicit OCR client
    pub fn with_client(
        config: &AppConfig,
        camera: Box<dyn CameraDevice>,
        ocr: Arc<dyn OcrClient>,
    ) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        let (events_tx, events) = unbounded();

        let session = CaptureSession::new(camera, ocr, events_tx, runtime.handle().clone())
            .with_capture_config(config.capture.clone())
            .with_parser_config(config.parser);

        Ok(Self {
            session,
            events,
            runtime,
        })
    }

    /// Get the capture session
    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Run one scan end to end: go live, capture, process, wait for the outcome
    pub fn scan_once(&self) -> Result<ScanReport> {
        info!("Starting scan session {}", self.session.id());

        self.session.start()?;
        self.session.capture()?;

        if let Some(task) = self.session.process()? {
            self.runtime
                .block_on(task)
                .context("Scan pipeline task failed")?;
        }

        for event in self.events.try_iter() {
            match event {
                SessionEvent::Scanned { document, raw_text } => {
                    return Ok(ScanReport { document, raw_text });
                }
                SessionEvent::Failed { message, .. } => bail!(message),
                SessionEvent::StateChanged { from, to } => {
                    debug!("Scan state {} -> {}", from, to);
                }
            }
        }

        bail!("Scan finished in state {} without a result", self.session.state())
    }
}

impl Drop for ScanApp {
    fn drop(&mut self) {
        // Make sure the camera is released before the runtime goes away
        self.session.close();
    }
}
