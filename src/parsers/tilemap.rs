//! Tilemap parsers: `tilemap.json` documents and tile images.

use crate::codec::is_masked;
use crate::engine::{DynEngine, TileData};
use crate::models::{TilemapChipConfig, TilemapDocument};
use crate::task::{Plan, Step};

use super::{
    ImageSource, JsonSource, ParseContext, ParseError, Parser, ParserKind, check_cell_grid,
    to_color_indices,
};

/// `tilemap.json`: resizes the map, then writes every layer cell by cell.
pub struct TilemapJsonParser {
    source: JsonSource<TilemapDocument>,
}

impl TilemapJsonParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: JsonSource::new(path, context),
        }
    }
}

impl Plan for TilemapJsonParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(JsonSource::<TilemapDocument>::STEPS + 1)
    }
}

impl Step<DynEngine> for TilemapJsonParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index < JsonSource::<TilemapDocument>::STEPS {
            return self.source.step(index);
        }

        let document = self.source.take_value()?;
        if document.width == 0 {
            return Err(self.source.invalid("tilemap width is 0"));
        }

        engine.configure_tilemap(&TilemapChipConfig {
            columns: Some(document.width),
            rows: Some(document.height),
            total_flags: None,
        });

        for layer in &document.layers {
            let flags = layer.is_flag_layer();
            for (i, value) in layer.data.iter().enumerate() {
                let x = i as u32 % document.width;
                let y = i as u32 / document.width;
                let tile = if flags {
                    TileData::flag(*value)
                } else {
                    TileData::sprite(*value)
                };
                engine.set_tile_at(x, y, tile);
            }
        }

        tracing::debug!(
            "Loaded {}x{} tilemap with {} layers from {}",
            document.width,
            document.height,
            document.layers.len(),
            self.source.path()
        );
        Ok(())
    }
}

impl Parser for TilemapJsonParser {
    fn kind(&self) -> ParserKind {
        ParserKind::TilemapJson
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

/// Tile image: each cell is stored as a unique sprite and placed at its cell position.
pub struct TilemapImageParser {
    source: ImageSource,
}

impl TilemapImageParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: ImageSource::new(path, context),
        }
    }
}

impl Plan for TilemapImageParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(ImageSource::STEPS + 1)
    }
}

impl Step<DynEngine> for TilemapImageParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index < ImageSource::STEPS {
            return self.source.step(index);
        }

        let image = self.source.take_image()?;
        let size = engine.sprite_size();
        let (columns, rows) = check_cell_grid(&self.source, &image, size)?;

        let map = engine.tilemap_size();
        if columns > map.0 || rows > map.1 {
            tracing::debug!(
                "{} covers {}x{} tiles, map is {}x{}; extra tiles are dropped",
                self.source.path(),
                columns,
                rows,
                map.0,
                map.1
            );
        }

        for row in 0..rows {
            for column in 0..columns {
                let cell = image.cell(column, row, size.0, size.1);
                let pixels = to_color_indices(&cell, engine, self.source.mask());
                let id = if pixels.iter().all(|p| *p < 0) {
                    -1
                } else {
                    engine
                        .store_unique_sprite(&pixels)
                        .ok_or_else(|| ParseError::SpriteMemoryFull(self.source.path().to_string()))?
                        as i32
                };
                engine.set_tile_at(column, row, TileData::sprite(id));
            }
        }
        Ok(())
    }
}

impl Parser for TilemapImageParser {
    fn kind(&self) -> ParserKind {
        ParserKind::TilemapImage
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

/// `*.flags.png`: the first colored pixel of each cell picks a flag from the flag palette.
pub struct TilemapFlagsParser {
    source: ImageSource,
}

impl TilemapFlagsParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: ImageSource::new(path, context),
        }
    }
}

impl Plan for TilemapFlagsParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(ImageSource::STEPS + 1)
    }
}

impl Step<DynEngine> for TilemapFlagsParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index < ImageSource::STEPS {
            return self.source.step(index);
        }

        let image = self.source.take_image()?;
        let size = engine.sprite_size();
        let (columns, rows) = check_cell_grid(&self.source, &image, size)?;

        if engine.flag_colors().is_empty() {
            tracing::warn!(
                "No flag palette loaded; every tile in {} gets no flag",
                self.source.path()
            );
        }

        let mask = self.source.mask();
        for row in 0..rows {
            for column in 0..columns {
                let flag = image
                    .cell(column, row, size.0, size.1)
                    .into_iter()
                    .find(|pixel| !is_masked(*pixel, mask))
                    .and_then(|pixel| {
                        let rgb = [pixel[0], pixel[1], pixel[2]];
                        engine.flag_colors().iter().position(|c| *c == rgb)
                    })
                    .map_or(-1, |flag| flag as i32);
                engine.set_tile_at(column, row, TileData::flag(flag));
            }
        }
        Ok(())
    }
}

impl Parser for TilemapFlagsParser {
    fn kind(&self) -> ParserKind {
        ParserKind::TilemapFlags
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}
