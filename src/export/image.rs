use std::sync::Arc;

use crate::codec::{ImageEncoder, PngEncoder};
use crate::engine::Rgb;
use crate::task::{Plan, Step, SteppableTask, TaskError};

use super::ExportError;

const DEFAULT_ROWS_PER_STEP: u32 = 16;

/// Turns a buffer of color indices into encoded image bytes.
///
/// Planning validates the buffer and yields one step per chunk of rows plus a
/// final encode step. Indices outside the palette (including negative ones)
/// use the fallback color. The encoded bytes are written to the step target
/// by the last step.
pub struct ImageExporter {
    width: u32,
    height: u32,
    pixels: Vec<i32>,
    palette: Vec<Rgb>,
    fallback: Rgb,
    encoder: Arc<dyn ImageEncoder>,
    rows_per_step: u32,
    rgb: Vec<u8>,
    chunks: usize,
}

impl ImageExporter {
    pub fn new(width: u32, height: u32, pixels: Vec<i32>, palette: Vec<Rgb>) -> Self {
        Self {
            width,
            height,
            pixels,
            palette,
            fallback: [0, 0, 0],
            encoder: Arc::new(PngEncoder),
            rows_per_step: DEFAULT_ROWS_PER_STEP,
            rgb: Vec::new(),
            chunks: 0,
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ImageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_fallback(mut self, color: Rgb) -> Self {
        self.fallback = color;
        self
    }

    pub fn with_rows_per_step(mut self, rows: u32) -> Self {
        self.rows_per_step = rows.max(1);
        self
    }

    pub fn extension(&self) -> &'static str {
        self.encoder.extension()
    }

    /// Runs every step inline and returns the encoded bytes.
    pub fn export(self) -> Result<Vec<u8>, ExportError> {
        let mut bytes = Vec::new();
        SteppableTask::new(self)
            .run_to_completion(&mut bytes)
            .map_err(|e| match e {
                TaskError::PlanFailed(source) | TaskError::StepFailed { source, .. } => source,
                other => ExportError::Task(other.to_string()),
            })?;
        Ok(bytes)
    }

    fn convert_rows(&mut self, chunk: usize) {
        let first = chunk as u32 * self.rows_per_step;
        let last = (first + self.rows_per_step).min(self.height);
        let start = (first * self.width) as usize;
        let end = (last * self.width) as usize;

        for &index in &self.pixels[start..end] {
            let color = usize::try_from(index)
                .ok()
                .and_then(|i| self.palette.get(i))
                .copied()
                .unwrap_or(self.fallback);
            self.rgb.extend_from_slice(&color);
        }
    }
}

impl Plan for ImageExporter {
    type Error = ExportError;

    fn plan(&mut self) -> Result<usize, ExportError> {
        let dimensions = |expected| ExportError::Dimensions {
            width: self.width,
            height: self.height,
            expected,
            actual: self.pixels.len(),
        };
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| dimensions(usize::MAX))?;
        if self.pixels.len() != expected {
            return Err(dimensions(expected));
        }
        if expected == 0 {
            return Err(ExportError::EmptyFrame);
        }

        self.chunks = self.height.div_ceil(self.rows_per_step) as usize;
        self.rgb = Vec::with_capacity(expected * 3);
        Ok(self.chunks + 1)
    }
}

impl Step<Vec<u8>> for ImageExporter {
    fn step(&mut self, index: usize, output: &mut Vec<u8>) -> Result<(), ExportError> {
        if index < self.chunks {
            self.convert_rows(index);
            return Ok(());
        }

        *output = self.encoder.encode(self.width, self.height, &self.rgb)?;
        tracing::debug!(
            "Encoded {}x{} image into {} bytes",
            self.width,
            self.height,
            output.len()
        );
        Ok(())
    }
}

/// Nearest-neighbour resize of a row-major buffer.
pub fn resize_pixels(
    pixels: &[i32],
    width: u32,
    height: u32,
    new_width: u32,
    new_height: u32,
) -> Vec<i32> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut resized = Vec::with_capacity((new_width * new_height) as usize);
    for y in 0..new_height {
        let source_y = (y as u64 * height as u64 / new_height as u64) as u32;
        for x in 0..new_width {
            let source_x = (x as u64 * width as u64 / new_width as u64) as u32;
            let value = pixels
                .get((source_y * width + source_x) as usize)
                .copied()
                .unwrap_or(-1);
            resized.push(value);
        }
    }
    resized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ImageDecoder, PngDecoder};
    use crate::task::TaskState;

    const PALETTE: [Rgb; 2] = [[255, 0, 0], [0, 0, 255]];

    #[test]
    fn test_steps_are_row_chunks_plus_encode() {
        let exporter = ImageExporter::new(2, 5, vec![0; 10], PALETTE.to_vec()).with_rows_per_step(2);
        let mut task = SteppableTask::new(exporter);
        assert_eq!(task.plan().unwrap(), 4);

        let mut bytes = Vec::new();
        for _ in 0..3 {
            task.step(&mut bytes).unwrap();
            assert!(bytes.is_empty());
        }
        assert_eq!(task.step(&mut bytes).unwrap(), TaskState::Complete);
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_export_maps_palette_and_fallback() {
        let exporter = ImageExporter::new(3, 1, vec![0, 1, -1], PALETTE.to_vec())
            .with_fallback([9, 9, 9]);
        let bytes = exporter.export().unwrap();

        let image = PngDecoder.decode(&bytes).unwrap();
        assert_eq!(image.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(image.pixel(1, 0), [0, 0, 255, 255]);
        assert_eq!(image.pixel(2, 0), [9, 9, 9, 255]);
    }

    #[test]
    fn test_wrong_buffer_size_fails_planning() {
        let err = ImageExporter::new(4, 4, vec![0; 3], Vec::new())
            .export()
            .unwrap_err();
        assert!(matches!(err, ExportError::Dimensions { expected: 16, actual: 3, .. }));
    }

    #[test]
    fn test_oversized_dimensions_fail_planning() {
        let err = ImageExporter::new(u32::MAX, u32::MAX, vec![0; 4], PALETTE.to_vec())
            .export()
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Dimensions { width: u32::MAX, height: u32::MAX, actual: 4, .. }
        ));
    }

    #[test]
    fn test_resize_nearest_neighbour() {
        let pixels = vec![1, 2, 3, 4];
        assert_eq!(
            resize_pixels(&pixels, 2, 2, 4, 4),
            vec![1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]
        );
        assert_eq!(resize_pixels(&pixels, 2, 2, 1, 1), vec![1]);
        assert!(resize_pixels(&[], 0, 0, 4, 4).is_empty());
    }
}
