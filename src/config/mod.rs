//! Application Configuration
//!
//! User settings stored in TOML format. Every section and field is optional
//! in the file; missing values take their defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::capture::CaptureConfig;
use crate::mrz::ParserConfig;
use crate::vision::OcrSettings;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera and still settings
    pub capture: CaptureConfig,
    /// OCR backend settings
    pub ocr: OcrSettings,
    /// MRZ parser policies
    pub parser: ParserConfig,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
