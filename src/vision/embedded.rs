//! Embedded OCR backend
//!
//! Runs an on-device engine on a blocking worker thread. Engine failures are
//! logged and reported as empty text: the call itself never fails, and an
//! unusable result surfaces later when the MRZ parser finds no zone.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{OcrClient, OcrError};
use crate::capture::frame::CapturedFrame;

/// A synchronous on-device recognizer
pub trait TextEngine: Send + Sync + 'static {
    /// Recognize text, one output line per recognized line
    fn recognize_text(&self, frame: &CapturedFrame) -> anyhow::Result<String>;
}

/// Best-effort client around a [`TextEngine`]
pub struct EmbeddedOcrClient<E> {
    engine: Arc<E>,
}

impl<E: TextEngine> EmbeddedOcrClient<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

#[async_trait]
impl<E: TextEngine> OcrClient for EmbeddedOcrClient<E> {
    async fn recognize(&self, image: &CapturedFrame) -> Result<String, OcrError> {
        let engine = Arc::clone(&self.engine);
        let frame = image.clone();

        let outcome = tokio::task::spawn_blocking(move || engine.recognize_text(&frame)).await;

        match outcome {
            Ok(Ok(text)) => {
                debug!("Embedded OCR returned {} characters", text.len());
                Ok(text)
            }
            Ok(Err(e)) => {
                warn!("Embedded OCR failed, returning empty text: {:#}", e);
                Ok(String::new())
            }
            Err(e) => {
                warn!("Embedded OCR worker did not complete, returning empty text: {}", e);
                Ok(String::new())
            }
        }
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}
