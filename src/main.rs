//! MRZ Scanner - passport and ID card capture pipeline
//!
//! Takes a still of an identity document, sends it to an OCR backend and
//! parses the machine-readable zone into structured fields for form prefill.

mod app;
mod capture;
mod config;
mod mrz;
mod session;
mod shared;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::ScanApp;
use crate::capture::ImageFileCamera;
use crate::config::AppConfig;
use crate::mrz::{LineSelection, MrzDocument};
use crate::vision::OcrBackend;

/// MRZ Scanner - read passport and ID machine-readable zones
#[derive(Parser, Debug)]
#[command(name = "mrz-scanner")]
#[command(about = "Capture an identity document and extract its MRZ fields")]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full capture pipeline on a document photo
    Scan {
        /// Photo of the document
        image: PathBuf,

        /// OCR backend override
        #[arg(long, value_enum)]
        backend: Option<OcrBackend>,

        /// Remote OCR endpoint override
        #[arg(long)]
        endpoint: Option<String>,

        /// Guide-box margin override in pixels
        #[arg(long)]
        margin: Option<u32>,
    },
    /// Parse MRZ text that was already recognized
    Parse {
        /// Text file to read (stdin when omitted)
        file: Option<PathBuf>,

        /// Select the first line containing "<<" instead of the last two lines
        #[arg(long)]
        separator_scan: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout carries the JSON output
    let level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_or_create_config(args.config.as_deref())?;

    match args.command {
        Command::Scan {
            image,
            backend,
            endpoint,
            margin,
        } => {
            if let Some(backend) = backend {
                config.ocr.backend = backend;
            }
            if let Some(endpoint) = endpoint {
                config.ocr.endpoint = endpoint;
            }
            if let Some(margin) = margin {
                config.capture.crop_margin = margin;
            }
            run_scan(&config, image)
        }
        Command::Parse {
            file,
            separator_scan,
        } => {
            if separator_scan {
                config.parser.line_selection = LineSelection::SeparatorScan;
            }
            run_parse(&config, file.as_deref())
        }
    }
}

/// Load configuration from an explicit path or the user config file.
///
/// A missing user config file is created with the defaults.
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    let config = AppConfig::default();
    if let Ok(config_path) = storage::default_config_path() {
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
            warn!("Ignoring unreadable configuration at {:?}", config_path);
        } else if let Err(e) = config::save_config(&config, &config_path) {
            warn!("Failed to write default configuration: {}", e);
        } else {
            info!("Created default configuration at {:?}", config_path);
        }
    }

    info!("Using default configuration");
    Ok(config)
}

/// Scan a photo through the capture session and print the record
fn run_scan(config: &AppConfig, image: PathBuf) -> Result<()> {
    let camera = ImageFileCamera::new(image);
    info!("Scanning {}", camera.path().display());

    let app = ScanApp::new(config, Box::new(camera))?;
    let report = match app.scan_once() {
        Ok(report) => report,
        Err(e) => {
            if let Some(error) = app.session().last_error() {
                warn!(
                    "Scan failed with {:?} error in state {}",
                    error.kind(),
                    app.session().state()
                );
            }
            return Err(e);
        }
    };
    check_dates(&report.document);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Parse recognized text and print the record
fn run_parse(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };

    let document = mrz::parse(&text, &config.parser)?;
    check_dates(&document);
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Warn about date fields the host should not prefill
fn check_dates(document: &MrzDocument) {
    for (field, date) in [
        ("date of birth", &document.date_of_birth),
        ("date of expiry", &document.date_of_expiry),
    ] {
        if !date.is_valid() {
            warn!("Unparseable {}; leaving it blank", field);
        }
    }

    if let Some(expiry) = document.date_of_expiry.as_date() {
        if expiry < Local::now().date_naive() {
            warn!("Document {} expired on {}", document.document_number, expiry);
        }
    }
}
