//! Key icon pixel buffers
//!
//! The deck expects 72x72 icons as 24-bit BGR pixels, row by row, with each
//! row mirrored horizontally.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use super::error::{IconError, WriteError};
use super::protocol::{BYTES_PER_PIXEL, ICON_BYTES, ICON_SIZE};

/// Raw icon pixels in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPixelBuffer {
    bytes: Vec<u8>,
}

impl IconPixelBuffer {
    /// Icon of a single color
    pub fn solid(r: u8, g: u8, b: u8) -> Self {
        let bytes = [b, g, r].repeat(ICON_BYTES / BYTES_PER_PIXEL);
        Self { bytes }
    }

    /// Wrap pixel bytes that are already in wire order.
    ///
    /// Buffers shorter than a full icon are accepted; the missing tail is sent as zeros.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, WriteError> {
        if bytes.len() > ICON_BYTES {
            return Err(WriteError::IconTooLarge {
                actual: bytes.len(),
                max: ICON_BYTES,
            });
        }
        Ok(Self { bytes })
    }

    /// Scale an image to icon size and convert it to device orientation and byte order
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image
            .resize_exact(ICON_SIZE, ICON_SIZE, FilterType::Triangle)
            .fliph()
            .to_rgb8();

        let mut bytes = Vec::with_capacity(ICON_BYTES);
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            bytes.extend_from_slice(&[b, g, r]);
        }
        Self { bytes }
    }

    /// Get the pixel bytes in wire order
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of pixel bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check whether the buffer holds no pixels
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Load an image file and turn it into an icon buffer
pub fn load_and_orient(path: &Path) -> Result<IconPixelBuffer, IconError> {
    let image = image::open(path)?;
    Ok(IconPixelBuffer::from_image(&image))
}
