//! Vision/OCR Layer
//!
//! Sends a captured still to a text recognizer and returns the raw text.
//! Supports two backends:
//! - Remote document-intelligence endpoint (recommended)
//! - Embedded on-device engine (Windows OCR)
//!
//! The backend is chosen at runtime and handed to the capture session as an
//! [`OcrClient`] trait object.

pub mod embedded;
pub mod remote;
#[cfg(windows)]
pub mod windows_ocr;

#[cfg(test)]
pub mod fake;

pub use embedded::{EmbeddedOcrClient, TextEngine};
pub use remote::RemoteOcrClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::capture::frame::CapturedFrame;

/// OCR backend selection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// Remote recognition service over HTTP
    #[default]
    Remote,
    /// On-device engine; never fails, may return empty text
    Embedded,
}

/// Recognition failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("OCR request failed: {0}")]
    Request(String),
    #[error("OCR request timed out after {0:?}")]
    Timeout(Duration),
    #[error("OCR request failed: {message}")]
    Service { status: u16, message: String },
    #[error("OCR request failed: Invalid JSON response")]
    InvalidResponse,
    #[error("No text extracted")]
    EmptyText,
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// Turns a still image into raw text
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Recognize the text in `image`; resolves once with text or a failure
    async fn recognize(&self, image: &CapturedFrame) -> Result<String, OcrError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// OCR settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Backend to use
    pub backend: OcrBackend,
    /// Remote endpoint accepting `{"base64", "mimeType"}` JSON
    pub endpoint: String,
    /// Remote request timeout in seconds
    pub timeout_secs: u64,
    /// Bearer token sent to the remote endpoint
    pub api_key: Option<String>,
    /// Language for the embedded engine (e.g., "en-US")
    pub language: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Remote,
            endpoint: "http://localhost:3000/api/scan".to_string(),
            timeout_secs: 30,
            api_key: None,
            language: "en-US".to_string(),
        }
    }
}

/// Build the OCR client for the configured backend
pub fn create_client(settings: &OcrSettings) -> Result<Arc<dyn OcrClient>> {
    match settings.backend {
        OcrBackend::Remote => {
            info!("Using remote OCR backend at {}", settings.endpoint);
            Ok(Arc::new(RemoteOcrClient::new(settings)?))
        }
        OcrBackend::Embedded => create_embedded_client(settings),
    }
}

#[cfg(windows)]
fn create_embedded_client(settings: &OcrSettings) -> Result<Arc<dyn OcrClient>> {
    let engine = windows_ocr::WindowsOcr::new(&settings.language)?;
    info!("Using embedded Windows OCR backend ({})", engine.language());
    Ok(Arc::new(EmbeddedOcrClient::new(engine)))
}

#[cfg(not(windows))]
fn create_embedded_client(_settings: &OcrSettings) -> Result<Arc<dyn OcrClient>> {
    Err(OcrError::Engine(
        "no embedded OCR engine on this platform; use the remote backend".to_string(),
    )
    .into())
}
