//! Byte-level decoders and encoders used by the parsers and exporters.
//!
//! The loader treats these as black boxes: bytes in, structured data out.
//! PNG support comes from the `image` crate, manifests from `serde_json`.

use image::{ImageEncoder as _, ImageFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::engine::Rgb;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Manifest error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pixel buffer holds {actual} pixels, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// An RGBA image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 4]>) -> Result<Self, CodecError> {
        // usize::MAX never matches a real buffer
        let expected = (width as usize)
            .checked_mul(height as usize)
            .unwrap_or(usize::MAX);
        if pixels.len() != expected {
            return Err(CodecError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Number of `cell_width` x `cell_height` cells horizontally and vertically.
    pub fn cell_grid(&self, cell_width: u32, cell_height: u32) -> (u32, u32) {
        (self.width / cell_width, self.height / cell_height)
    }

    /// Pixels of one cell, row-major.
    pub fn cell(&self, column: u32, row: u32, cell_width: u32, cell_height: u32) -> Vec<[u8; 4]> {
        let mut out = Vec::with_capacity((cell_width * cell_height) as usize);
        for y in 0..cell_height {
            for x in 0..cell_width {
                out.push(self.pixel(column * cell_width + x, row * cell_height + y));
            }
        }
        out
    }
}

/// True for pixels that map to "no color": fully transparent or the mask color.
pub fn is_masked(pixel: [u8; 4], mask: Option<Rgb>) -> bool {
    pixel[3] == 0 || mask.is_some_and(|m| m == [pixel[0], pixel[1], pixel[2]])
}

pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;
}

pub trait ImageEncoder: Send + Sync {
    /// Encodes tightly packed RGB8 pixels.
    fn encode(&self, width: u32, height: u32, rgb: &[u8]) -> Result<Vec<u8>, CodecError>;

    fn extension(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PngDecoder;

impl ImageDecoder for PngDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
        let (width, height) = image.dimensions();
        let pixels = image.pixels().map(|p| p.0).collect();
        DecodedImage::new(width, height, pixels)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn encode(&self, width: u32, height: u32, rgb: &[u8]) -> Result<Vec<u8>, CodecError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .unwrap_or(usize::MAX);
        if rgb.len() != expected {
            return Err(CodecError::BufferSize {
                expected,
                actual: rgb.len(),
            });
        }

        let mut bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut bytes).write_image(
            rgb,
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }

    fn extension(&self) -> &'static str {
        "png"
    }
}

/// Decodes a JSON manifest.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encodes an RGBA image as PNG. Used to build fixtures and by tools.
pub fn encode_rgba_png(image: &DecodedImage) -> Result<Vec<u8>, CodecError> {
    let raw: Vec<u8> = image.pixels.iter().flatten().copied().collect();
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes).write_image(
        &raw,
        image.width,
        image.height,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_encode_decode() {
        let image = DecodedImage::new(
            2,
            1,
            vec![[255, 0, 0, 255], [0, 0, 0, 0]],
        )
        .unwrap();
        let bytes = encode_rgba_png(&image).unwrap();

        let decoded = PngDecoder.decode(&bytes).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            PngDecoder.decode(b"not a png"),
            Err(CodecError::Image(_))
        ));
    }

    #[test]
    fn test_cells_are_row_major() {
        let pixels = (0..16u8).map(|i| [i, 0, 0, 255]).collect();
        let image = DecodedImage::new(4, 4, pixels).unwrap();

        assert_eq!(image.cell_grid(2, 2), (2, 2));
        let cell = image.cell(1, 1, 2, 2);
        let reds: Vec<u8> = cell.iter().map(|p| p[0]).collect();
        assert_eq!(reds, vec![10, 11, 14, 15]);
    }

    #[test]
    fn test_masking() {
        let mask = Some([255, 0, 255]);
        assert!(is_masked([255, 0, 255, 255], mask));
        assert!(is_masked([1, 2, 3, 0], mask));
        assert!(!is_masked([1, 2, 3, 255], mask));
    }

    #[test]
    fn test_png_encoder_checks_buffer() {
        assert!(matches!(
            PngEncoder.encode(2, 2, &[0; 5]),
            Err(CodecError::BufferSize { expected: 12, actual: 5 })
        ));
    }
}
