//! Remote OCR backend
//!
//! Posts the still as a base64 PNG to a document-intelligence endpoint:
//!
//! ```text
//! request:  {"base64": "...", "mimeType": "image/png"}
//! success:  {"text": "..."}
//! failure:  {"error": "...", "details": "..."}
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{OcrClient, OcrError, OcrSettings};
use crate::capture::frame::{CapturedFrame, PNG_MIME};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanRequest<'a> {
    base64: String,
    mime_type: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScanResponse {
    text: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

/// HTTP client for the remote recognition service
pub struct RemoteOcrClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoteOcrClient {
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> OcrError {
        if err.is_timeout() {
            OcrError::Timeout(self.timeout)
        } else {
            OcrError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl OcrClient for RemoteOcrClient {
    async fn recognize(&self, image: &CapturedFrame) -> Result<String, OcrError> {
        let png = image
            .encode_png()
            .map_err(|e| OcrError::Encode(e.to_string()))?;

        debug!(
            "Sending {}x{} still ({} bytes PNG) to {}",
            image.width,
            image.height,
            png.len(),
            self.endpoint
        );

        let payload = ScanRequest {
            base64: STANDARD.encode(&png),
            mime_type: PNG_MIME,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        let parsed: ScanResponse =
            serde_json::from_str(&body).map_err(|_| OcrError::InvalidResponse)?;

        if !status.is_success() {
            if let Some(details) = &parsed.details {
                warn!("OCR service returned {}: {}", status, details);
            }
            return Err(OcrError::Service {
                status: status.as_u16(),
                message: parsed.error.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        let text = parsed.text.ok_or(OcrError::InvalidResponse)?;
        if text.trim().is_empty() {
            return Err(OcrError::EmptyText);
        }

        info!("Remote OCR returned {} characters", text.len());
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
