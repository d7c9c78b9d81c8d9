//! Frame data structures for captured camera content

use image::codecs::png::PngEncoder;
use image::error::{ImageError, ImageResult, ParameterError, ParameterErrorKind};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::time::Instant;

/// MIME type of [`CapturedFrame::encode_png`] output
pub const PNG_MIME: &str = "image/png";

/// A still frame taken from the camera
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Take ownership of a decoded RGBA image
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Crop to the guide box drawn `margin` pixels inside the frame edge.
    ///
    /// A margin that would leave nothing keeps the full frame.
    pub fn crop_inner(&self, margin: u32) -> CapturedFrame {
        let inner_width = self.width.saturating_sub(margin.saturating_mul(2));
        let inner_height = self.height.saturating_sub(margin.saturating_mul(2));

        if margin == 0 || inner_width == 0 || inner_height == 0 {
            return self.clone();
        }

        CapturedFrame {
            data: extract_region(&self.data, self.width, margin, margin, inner_width, inner_height),
            width: inner_width,
            height: inner_height,
            timestamp: self.timestamp,
        }
    }

    /// Encode as PNG for transmission
    pub fn encode_png(&self) -> ImageResult<Vec<u8>> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            &self.data,
            self.width,
            self.height,
            ExtendedColorType::Rgba8,
        )?;
        Ok(png)
    }
}

/// Copy a region out of RGBA rows
fn extract_region(data: &[u8], img_width: u32, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
    let mut region = Vec::with_capacity((width * height * 4) as usize);

    for row in y..(y + height) {
        let start = ((row * img_width + x) * 4) as usize;
        let end = start + (width * 4) as usize;
        if end <= data.len() {
            region.extend_from_slice(&data[start..end]);
        }
    }

    region
}
