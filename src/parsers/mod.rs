//! Parsers: turn one file into engine-state mutations, one step at a time.
//!
//! Every parser follows the same plan shape:
//!
//! 1. read the file bytes through the [`FileProvider`]
//! 2. decode them (PNG or JSON)
//! 3. apply the decoded content through [`EngineTarget`] mutators
//!
//! Audio files skip the decode step; the bytes go to the sound bank as-is.
//! Parsers are driven by [`SteppableTask`], which fixes the step count before
//! any I/O happens and stops at the first failing step.

pub mod audio;
pub mod font;
pub mod image;
pub mod manifest;
pub mod meta;
pub mod tilemap;

pub use audio::WaveParser;
pub use font::FontParser;
pub use image::{ColorParser, FlagPaletteParser, FolderSpriteParser, SpriteSheetParser};
pub use manifest::ManifestParser;
pub use meta::MetaDataParser;
pub use tilemap::{TilemapFlagsParser, TilemapImageParser, TilemapJsonParser};

use serde::de::DeserializeOwned;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::codec::{self, CodecError, DecodedImage, ImageDecoder, PngDecoder, is_masked};
use crate::engine::{DynEngine, EngineTarget, Rgb};
use crate::engine::sprites::EMPTY_PIXEL;
use crate::io::FileProvider;
use crate::task::{Step, SteppableTask};

/// Errors raised while a parser step runs.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: CodecError,
    },

    #[error("Invalid content in {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("Sprite memory is full while parsing {0}")]
    SpriteMemoryFull(String),

    #[error("Step {step} is outside the plan of {path}")]
    UnplannedStep { path: String, step: usize },
}

/// What a parser does with its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    Manifest,
    Colors,
    SpriteSheet,
    FolderSprite,
    FlagPalette,
    TilemapJson,
    TilemapImage,
    TilemapFlags,
    Font,
    MetaData,
    Wave,
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParserKind::Manifest => "manifest",
            ParserKind::Colors => "colors",
            ParserKind::SpriteSheet => "sprite-sheet",
            ParserKind::FolderSprite => "folder-sprite",
            ParserKind::FlagPalette => "flag-palette",
            ParserKind::TilemapJson => "tilemap-json",
            ParserKind::TilemapImage => "tilemap-image",
            ParserKind::TilemapFlags => "tilemap-flags",
            ParserKind::Font => "font",
            ParserKind::MetaData => "meta-data",
            ParserKind::Wave => "wave",
        };
        f.write_str(name)
    }
}

impl ParserKind {
    /// Constructs the parser of this kind for `path`.
    pub fn build(self, path: &str, context: ParseContext) -> Box<dyn Parser> {
        match self {
            ParserKind::Manifest => Box::new(ManifestParser::new(path, context)),
            ParserKind::Colors => Box::new(ColorParser::new(path, context)),
            ParserKind::SpriteSheet => Box::new(SpriteSheetParser::new(path, context)),
            ParserKind::FolderSprite => Box::new(FolderSpriteParser::new(path, context)),
            ParserKind::FlagPalette => Box::new(FlagPaletteParser::new(path, context)),
            ParserKind::TilemapJson => Box::new(TilemapJsonParser::new(path, context)),
            ParserKind::TilemapImage => Box::new(TilemapImageParser::new(path, context)),
            ParserKind::TilemapFlags => Box::new(TilemapFlagsParser::new(path, context)),
            ParserKind::Font => Box::new(FontParser::new(path, context)),
            ParserKind::MetaData => Box::new(MetaDataParser::new(path, context)),
            ParserKind::Wave => Box::new(WaveParser::new(path, context)),
        }
    }
}

/// A steppable unit converting one file into engine mutations.
pub trait Parser: Step<DynEngine, Error = ParseError> + Send {
    fn kind(&self) -> ParserKind;

    /// Virtual path of the parsed file.
    fn path(&self) -> &str;
}

impl fmt::Debug for dyn Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.path())
    }
}

/// A parser wrapped in the task state machine.
pub type ParserTask = SteppableTask<Box<dyn Parser>>;

/// Shared collaborators every parser needs.
#[derive(Clone)]
pub struct ParseContext {
    pub files: Arc<dyn FileProvider>,
    pub images: Arc<dyn ImageDecoder>,
    /// Color treated as an empty pixel in addition to full transparency.
    pub mask: Option<Rgb>,
}

impl ParseContext {
    pub fn new(files: Arc<dyn FileProvider>) -> Self {
        Self {
            files,
            images: Arc::new(PngDecoder),
            mask: Some([255, 0, 255]),
        }
    }

    pub fn with_images(mut self, images: Arc<dyn ImageDecoder>) -> Self {
        self.images = images;
        self
    }

    pub fn with_mask(mut self, mask: Option<Rgb>) -> Self {
        self.mask = mask;
        self
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, ParseError> {
        self.files.read(path).map_err(|source| ParseError::Read {
            path: path.to_string(),
            source,
        })
    }
}

/// Image file moving through read → decode.
pub(crate) struct ImageSource {
    path: String,
    context: ParseContext,
    bytes: Option<Vec<u8>>,
    image: Option<DecodedImage>,
}

impl ImageSource {
    pub(crate) const STEPS: usize = 2;

    pub(crate) fn new(path: &str, context: ParseContext) -> Self {
        Self {
            path: path.to_string(),
            context,
            bytes: None,
            image: None,
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn mask(&self) -> Option<Rgb> {
        self.context.mask
    }

    /// Runs source step 0 (read) or 1 (decode).
    pub(crate) fn step(&mut self, index: usize) -> Result<(), ParseError> {
        match index {
            0 => {
                self.bytes = Some(self.context.read(&self.path)?);
                Ok(())
            }
            1 => {
                let bytes = self.bytes.take().ok_or_else(|| self.invalid("file was not read"))?;
                let image =
                    self.context
                        .images
                        .decode(&bytes)
                        .map_err(|source| ParseError::Decode {
                            path: self.path.clone(),
                            source,
                        })?;
                tracing::trace!("Decoded {} ({}x{})", self.path, image.width, image.height);
                self.image = Some(image);
                Ok(())
            }
            step => Err(ParseError::UnplannedStep {
                path: self.path.clone(),
                step,
            }),
        }
    }

    /// Takes the decoded image for the apply step.
    pub(crate) fn take_image(&mut self) -> Result<DecodedImage, ParseError> {
        self.image
            .take()
            .ok_or_else(|| self.invalid("image was not decoded"))
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> ParseError {
        ParseError::Invalid {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

/// JSON file moving through read → decode.
pub(crate) struct JsonSource<T> {
    path: String,
    context: ParseContext,
    bytes: Option<Vec<u8>>,
    value: Option<T>,
}

impl<T: DeserializeOwned> JsonSource<T> {
    pub(crate) const STEPS: usize = 2;

    pub(crate) fn new(path: &str, context: ParseContext) -> Self {
        Self {
            path: path.to_string(),
            context,
            bytes: None,
            value: None,
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn step(&mut self, index: usize) -> Result<(), ParseError> {
        match index {
            0 => {
                self.bytes = Some(self.context.read(&self.path)?);
                Ok(())
            }
            1 => {
                let bytes = self.bytes.take().ok_or_else(|| self.invalid("file was not read"))?;
                let value = codec::decode_json(&bytes).map_err(|source| ParseError::Decode {
                    path: self.path.clone(),
                    source,
                })?;
                self.value = Some(value);
                Ok(())
            }
            step => Err(ParseError::UnplannedStep {
                path: self.path.clone(),
                step,
            }),
        }
    }

    pub(crate) fn take_value(&mut self) -> Result<T, ParseError> {
        self.value
            .take()
            .ok_or_else(|| self.invalid("manifest was not decoded"))
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> ParseError {
        ParseError::Invalid {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

/// Maps RGBA pixels to color table indices. Masked and unknown colors become empty.
pub(crate) fn to_color_indices(
    pixels: &[[u8; 4]],
    engine: &dyn EngineTarget,
    mask: Option<Rgb>,
) -> Vec<i32> {
    pixels
        .iter()
        .map(|pixel| {
            if is_masked(*pixel, mask) {
                return EMPTY_PIXEL;
            }
            engine
                .color_index([pixel[0], pixel[1], pixel[2]])
                .map_or(EMPTY_PIXEL, |i| i as i32)
        })
        .collect()
}

/// Distinct unmasked colors in scan order.
pub(crate) fn unique_colors(pixels: &[[u8; 4]], mask: Option<Rgb>) -> Vec<Rgb> {
    let mut colors: Vec<Rgb> = Vec::new();
    for pixel in pixels {
        if is_masked(*pixel, mask) {
            continue;
        }
        let rgb = [pixel[0], pixel[1], pixel[2]];
        if !colors.contains(&rgb) {
            colors.push(rgb);
        }
    }
    colors
}

/// Checks an image holds at least one cell and warns about a ragged edge.
pub(crate) fn check_cell_grid(
    source: &ImageSource,
    image: &DecodedImage,
    cell: (u32, u32),
) -> Result<(u32, u32), ParseError> {
    let (columns, rows) = image.cell_grid(cell.0, cell.1);
    if columns == 0 || rows == 0 {
        return Err(source.invalid(format!(
            "{}x{} image is smaller than one {}x{} cell",
            image.width, image.height, cell.0, cell.1
        )));
    }
    if image.width % cell.0 != 0 || image.height % cell.1 != 0 {
        tracing::warn!(
            "{} is {}x{}, not a multiple of {}x{}; ignoring the remainder",
            source.path(),
            image.width,
            image.height,
            cell.0,
            cell.1
        );
    }
    Ok((columns, rows))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Helpers to build in-memory cartridges for parser tests.

    use super::*;
    use crate::codec::encode_rgba_png;
    use crate::io::MemoryFileSystem;

    pub const BLACK: [u8; 4] = [0, 0, 0, 255];
    pub const WHITE: [u8; 4] = [255, 255, 255, 255];
    pub const RED: [u8; 4] = [255, 0, 0, 255];
    pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

    pub fn png(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| pixel(x, y))
            .collect();
        encode_rgba_png(&DecodedImage::new(width, height, pixels).unwrap()).unwrap()
    }

    pub fn context(files: Vec<(&str, Vec<u8>)>) -> ParseContext {
        ParseContext::new(Arc::new(MemoryFileSystem::with_files(files)))
    }

    pub fn run(parser: impl Parser + 'static, engine: &mut DynEngine) -> Result<(), ParseError> {
        let boxed: Box<dyn Parser> = Box::new(parser);
        let mut task = SteppableTask::planned(boxed).map_err(|e| match e {
            crate::task::TaskError::PlanFailed(source) => source,
            other => panic!("unexpected plan error: {other}"),
        })?;
        task.run_to_completion(engine).map_err(|e| match e {
            crate::task::TaskError::StepFailed { source, .. } => source,
            other => panic!("unexpected task error: {other}"),
        })
    }
}
