use std::sync::Arc;

use crate::codec::{ImageEncoder, PngEncoder};
use crate::io::{Workspace, join};
use crate::models::LoaderSettings;

use super::{DisplaySource, ExportError, ImageExporter, resize_pixels};

/// Saves the visible part of a frame as an image in the screenshot directory.
pub struct ScreenshotService {
    workspace: Arc<dyn Workspace>,
    encoder: Arc<dyn ImageEncoder>,
    directory: String,
    scale: u32,
}

impl ScreenshotService {
    pub fn new(workspace: Arc<dyn Workspace>, settings: &LoaderSettings) -> Self {
        Self {
            workspace,
            encoder: Arc::new(PngEncoder),
            directory: settings.screenshot_dir.clone(),
            scale: settings.screenshot_scale.max(1),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Crops, maps empty pixels to the background color, scales, encodes and
    /// saves the frame. Returns the path it was written to.
    pub fn take_screenshot(&self, display: &dyn DisplaySource) -> Result<String, ExportError> {
        let (width, height, pixels) = visible_pixels(display);
        if width == 0 || height == 0 {
            return Err(ExportError::EmptyFrame);
        }

        let (width, height, pixels) = if self.scale > 1 {
            let (w, h) = (width * self.scale, height * self.scale);
            (w, h, resize_pixels(&pixels, width, height, w, h))
        } else {
            (width, height, pixels)
        };

        let bytes = ImageExporter::new(width, height, pixels, display.palette().to_vec())
            .with_encoder(Arc::clone(&self.encoder))
            .export()?;

        if !self.workspace.exists(&self.directory) {
            self.workspace
                .create_directory_recursive(&self.directory)
                .map_err(|source| ExportError::Io {
                    path: self.directory.clone(),
                    source,
                })?;
        }

        let name = format!("screenshot.{}", self.encoder.extension());
        let path = self.workspace.unique_file_path(&join(&self.directory, &name));
        self.workspace
            .write(&path, &bytes)
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Saved {}x{} screenshot to {}", width, height, path);
        Ok(path)
    }
}

/// Visible area of the frame with empty pixels replaced by the background color.
fn visible_pixels(display: &dyn DisplaySource) -> (u32, u32, Vec<i32>) {
    let frame = display.frame();
    let frame_width = display.frame_width();
    if frame_width == 0 {
        return (0, 0, Vec::new());
    }
    let frame_height = (frame.len() / frame_width as usize) as u32;

    let (visible_width, visible_height) = display.visible_size();
    let width = visible_width.min(frame_width);
    let height = visible_height.min(frame_height);
    let background = display.background_color();

    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        let row = (y * frame_width) as usize;
        pixels.extend(
            frame[row..row + width as usize]
                .iter()
                .map(|&index| if index < 0 { background } else { index }),
        );
    }
    (width, height, pixels)
}
