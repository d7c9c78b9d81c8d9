//! Deterministic OCR clients for tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::{OcrClient, OcrError};
use crate::capture::frame::CapturedFrame;

/// Returns a canned result, optionally waiting for a release signal first
pub struct ScriptedOcr {
    result: Result<String, OcrError>,
    gate: Option<Arc<Notify>>,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl ScriptedOcr {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: OcrError) -> Self {
        Self {
            result: Err(error),
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold every recognition until the returned [`Notify`] is signalled
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Shared counter of `recognize` calls
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared counter of recognitions that got past the gate
    pub fn completed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }
}

#[async_trait]
impl OcrClient for ScriptedOcr {
    async fn recognize(&self, _image: &CapturedFrame) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
