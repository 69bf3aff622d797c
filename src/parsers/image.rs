//! Image parsers that feed the color table and sprite memory.

use crate::engine::{DynEngine, MetaSprite};
use crate::io::file_stem;
use crate::task::{Plan, Step};

use super::{
    ImageSource, ParseContext, ParseError, Parser, ParserKind, check_cell_grid,
    to_color_indices, unique_colors,
};

const APPLY: usize = ImageSource::STEPS;

/// `colors.png`: every distinct unmasked color, in scan order, becomes the color table.
pub struct ColorParser {
    source: ImageSource,
}

impl ColorParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: ImageSource::new(path, context),
        }
    }
}

impl Plan for ColorParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(ImageSource::STEPS + 1)
    }
}

impl Step<DynEngine> for ColorParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index != APPLY {
            return self.source.step(index);
        }

        let image = self.source.take_image()?;
        let colors = unique_colors(&image.pixels, self.source.mask());
        if colors.is_empty() {
            return Err(self.source.invalid("no opaque colors"));
        }
        tracing::debug!("Loaded {} colors from {}", colors.len(), self.source.path());
        engine.set_colors(&colors);
        Ok(())
    }
}

impl Parser for ColorParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Colors
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

/// `sprites.png`: cell `i` (row-major) is written to sprite slot `i`. Empty cells are skipped.
pub struct SpriteSheetParser {
    source: ImageSource,
}

impl SpriteSheetParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: ImageSource::new(path, context),
        }
    }
}

impl Plan for SpriteSheetParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(ImageSource::STEPS + 1)
    }
}

impl Step<DynEngine> for SpriteSheetParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index != APPLY {
            return self.source.step(index);
        }

        let image = self.source.take_image()?;
        let size = engine.sprite_size();
        let (columns, rows) = check_cell_grid(&self.source, &image, size)?;

        let mut written = 0;
        for row in 0..rows {
            for column in 0..columns {
                let cell = image.cell(column, row, size.0, size.1);
                let pixels = to_color_indices(&cell, engine, self.source.mask());
                if pixels.iter().all(|p| *p < 0) {
                    continue;
                }
                engine.set_sprite_pixels((row * columns + column) as usize, &pixels);
                written += 1;
            }
        }
        tracing::debug!("Loaded {} sprites from {}", written, self.source.path());
        Ok(())
    }
}

impl Parser for SpriteSheetParser {
    fn kind(&self) -> ParserKind {
        ParserKind::SpriteSheet
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

/// `/Game/Sprites/*.png`: cuts the image into sprites, stores each unique one,
/// and registers a meta sprite named after the file.
pub struct FolderSpriteParser {
    source: ImageSource,
}

impl FolderSpriteParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: ImageSource::new(path, context),
        }
    }
}

impl Plan for FolderSpriteParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(ImageSource::STEPS + 1)
    }
}

impl Step<DynEngine> for FolderSpriteParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index != APPLY {
            return self.source.step(index);
        }

        let image = self.source.take_image()?;
        let size = engine.sprite_size();
        let (columns, rows) = check_cell_grid(&self.source, &image, size)?;

        let mut sprite_ids = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for column in 0..columns {
                let cell = image.cell(column, row, size.0, size.1);
                let pixels = to_color_indices(&cell, engine, self.source.mask());
                if pixels.iter().all(|p| *p < 0) {
                    sprite_ids.push(-1);
                    continue;
                }
                let id = engine
                    .store_unique_sprite(&pixels)
                    .ok_or_else(|| ParseError::SpriteMemoryFull(self.source.path().to_string()))?;
                sprite_ids.push(id as i32);
            }
        }

        let name = file_stem(self.source.path());
        tracing::debug!("Registered meta sprite {} ({}x{} sprites)", name, columns, rows);
        engine.set_meta_sprite(
            name,
            MetaSprite {
                width: columns,
                sprite_ids,
            },
        );
        Ok(())
    }
}

impl Parser for FolderSpriteParser {
    fn kind(&self) -> ParserKind {
        ParserKind::FolderSprite
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

/// `flags.png`: distinct colors in scan order; the color at index `n` marks flag `n`.
pub struct FlagPaletteParser {
    source: ImageSource,
}

impl FlagPaletteParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: ImageSource::new(path, context),
        }
    }
}

impl Plan for FlagPaletteParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(ImageSource::STEPS + 1)
    }
}

impl Step<DynEngine> for FlagPaletteParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index != APPLY {
            return self.source.step(index);
        }

        let image = self.source.take_image()?;
        let colors = unique_colors(&image.pixels, self.source.mask());
        tracing::debug!("Loaded {} flag colors from {}", colors.len(), self.source.path());
        engine.set_flag_colors(&colors);
        Ok(())
    }
}

impl Parser for FlagPaletteParser {
    fn kind(&self) -> ParserKind {
        ParserKind::FlagPalette
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineTarget, MemoryEngine};
    use crate::parsers::fixtures::{BLACK, CLEAR, RED, WHITE, context, png, run};

    fn engine_with_colors() -> MemoryEngine {
        let mut engine = MemoryEngine::new();
        engine.set_colors(&[[0, 0, 0], [255, 255, 255], [255, 0, 0]]);
        engine
    }

    #[test]
    fn test_colors_in_scan_order_skipping_mask() {
        let bytes = png(4, 1, |x, _| match x {
            0 => WHITE,
            1 => [255, 0, 255, 255],
            2 => BLACK,
            _ => WHITE,
        });
        let ctx = context(vec![("/Game/colors.png", bytes)]);
        let mut engine = MemoryEngine::new();

        run(ColorParser::new("/Game/colors.png", ctx), &mut engine).unwrap();
        assert_eq!(engine.colors, vec![[255, 255, 255], [0, 0, 0]]);
    }

    #[test]
    fn test_missing_file_fails_on_read() {
        let ctx = context(vec![]);
        let mut engine = MemoryEngine::new();
        let err = run(ColorParser::new("/Game/colors.png", ctx), &mut engine).unwrap_err();
        assert!(matches!(err, ParseError::Read { .. }));
    }

    #[test]
    fn test_sprite_sheet_writes_by_cell_index() {
        // 16x8: cell 0 is empty, cell 1 is solid red.
        let bytes = png(16, 8, |x, _| if x < 8 { CLEAR } else { RED });
        let ctx = context(vec![("/Game/sprites.png", bytes)]);
        let mut engine = engine_with_colors();

        run(SpriteSheetParser::new("/Game/sprites.png", ctx), &mut engine).unwrap();
        assert!(engine.sprites.is_empty_at(0));
        assert_eq!(engine.sprites.read_sprite_at(1), vec![2; 64]);
    }

    #[test]
    fn test_image_smaller_than_a_sprite_is_invalid() {
        let ctx = context(vec![("/Game/sprites.png", png(4, 4, |_, _| RED))]);
        let mut engine = engine_with_colors();
        let err = run(SpriteSheetParser::new("/Game/sprites.png", ctx), &mut engine).unwrap_err();
        assert!(matches!(err, ParseError::Invalid { .. }));
    }

    #[test]
    fn test_folder_sprite_reuses_duplicates() {
        // Three cells: white, white, empty.
        let bytes = png(24, 8, |x, _| if x < 16 { WHITE } else { CLEAR });
        let ctx = context(vec![("/Game/Sprites/hero.png", bytes)]);
        let mut engine = engine_with_colors();

        run(FolderSpriteParser::new("/Game/Sprites/hero.png", ctx), &mut engine).unwrap();

        let hero = &engine.meta_sprites["hero"];
        assert_eq!(hero.width, 3);
        assert_eq!(hero.sprite_ids, vec![0, 0, -1]);
        assert_eq!(engine.sprites.next_empty_id(), Some(1));
    }

    #[test]
    fn test_flag_palette() {
        let bytes = png(3, 1, |x, _| [BLACK, CLEAR, RED][x as usize]);
        let ctx = context(vec![("/App/Sprites/flags.png", bytes)]);
        let mut engine = MemoryEngine::new();

        run(FlagPaletteParser::new("/App/Sprites/flags.png", ctx), &mut engine).unwrap();
        assert_eq!(engine.flag_colors, vec![[0, 0, 0], [255, 0, 0]]);
    }
}
