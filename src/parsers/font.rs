use crate::engine::DynEngine;
use crate::io::file_stem;
use crate::task::{Plan, Step};

use super::{
    ImageSource, ParseContext, ParseError, Parser, ParserKind, check_cell_grid, to_color_indices,
};

/// `*.font.png`: one glyph per cell, starting at the space character.
///
/// Glyphs are deduplicated into sprite memory; blank glyphs map to `-1`.
/// The font is registered under the file stem (`large.font.png` → `large`).
pub struct FontParser {
    source: ImageSource,
}

impl FontParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: ImageSource::new(path, context),
        }
    }
}

impl Plan for FontParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(ImageSource::STEPS + 1)
    }
}

impl Step<DynEngine> for FontParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index < ImageSource::STEPS {
            return self.source.step(index);
        }

        let image = self.source.take_image()?;
        let size = engine.sprite_size();
        let (columns, rows) = check_cell_grid(&self.source, &image, size)?;

        let mut glyphs = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for column in 0..columns {
                let cell = image.cell(column, row, size.0, size.1);
                let pixels = to_color_indices(&cell, engine, self.source.mask());
                if pixels.iter().all(|p| *p < 0) {
                    glyphs.push(-1);
                    continue;
                }
                let id = engine
                    .store_unique_sprite(&pixels)
                    .ok_or_else(|| ParseError::SpriteMemoryFull(self.source.path().to_string()))?;
                glyphs.push(id as i32);
            }
        }

        let name = file_stem(self.source.path());
        tracing::debug!("Loaded font {} with {} glyphs", name, glyphs.len());
        engine.set_font(name, glyphs);
        Ok(())
    }
}

impl Parser for FontParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Font
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineTarget, MemoryEngine};
    use crate::parsers::fixtures::{CLEAR, WHITE, context, png, run};

    #[test]
    fn test_font_glyphs_are_deduplicated() {
        // space, "a", "a"
        let bytes = png(24, 8, |x, y| if x >= 8 && y == 0 { WHITE } else { CLEAR });
        let ctx = context(vec![("/App/Fonts/small.font.png", bytes)]);
        let mut engine = MemoryEngine::new();
        engine.set_colors(&[[255, 255, 255]]);

        run(FontParser::new("/App/Fonts/small.font.png", ctx), &mut engine).unwrap();

        assert_eq!(engine.fonts["small"], vec![-1, 0, 0]);
        assert_eq!(engine.sprites.sprites_in_memory(), 1);
    }
}
