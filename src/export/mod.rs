//! Export flows: the stepped image exporter and the screenshot service built on it.

pub mod image;
pub mod screenshot;

pub use image::{ImageExporter, resize_pixels};
pub use screenshot::ScreenshotService;

use std::io;
use thiserror::Error;

use crate::codec::CodecError;
use crate::engine::Rgb;

/// Read access to a rendered frame.
pub trait DisplaySource {
    /// Color indices, row-major, `frame_width` wide. Negative means empty.
    fn frame(&self) -> &[i32];

    fn frame_width(&self) -> u32;

    /// Visible area in the top left corner of the frame.
    fn visible_size(&self) -> (u32, u32);

    fn palette(&self) -> &[Rgb];

    fn background_color(&self) -> i32;
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Encoding failed: {0}")]
    Encode(#[from] CodecError),

    #[error("Pixel buffer holds {actual} pixels, {width}x{height} needs {expected}")]
    Dimensions {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Nothing to export: the visible area is empty")]
    EmptyFrame,

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Export task rejected a step: {0}")]
    Task(String),
}
