//! Engine state as seen by the parsers.
//!
//! The loader never owns engine state. Parsers only talk to it through the
//! [`EngineTarget`] mutators, one category at a time. Mutators are expected to
//! clamp or reject out-of-range payloads themselves; parsers forward what they
//! decoded without bounds checks.
//!
//! [`MemoryEngine`] is a complete in-memory implementation used by the CLI and
//! the tests. [`SpriteMemory`] is the paged sprite store with duplicate detection.

pub mod memory;
pub mod sprites;

pub use memory::MemoryEngine;
pub use sprites::SpriteMemory;

use crate::models::{
    ColorChipConfig, DisplayChipConfig, SongDefinition, SoundChipConfig, SpriteChipConfig,
    TilemapChipConfig,
};

/// An RGB color.
pub type Rgb = [u8; 3];

/// Partial update of one tilemap cell. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileData {
    pub sprite_id: Option<i32>,
    pub flag: Option<i32>,
}

impl TileData {
    pub fn sprite(sprite_id: i32) -> Self {
        Self {
            sprite_id: Some(sprite_id),
            flag: None,
        }
    }

    pub fn flag(flag: i32) -> Self {
        Self {
            sprite_id: None,
            flag: Some(flag),
        }
    }
}

/// Payload of a sound bank slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSamples {
    /// Synthesizer parameter string from `sounds.json`.
    Synth(String),
    /// Raw audio file bytes; decoding belongs to the sound chip.
    Wave(Vec<u8>),
}

/// A sprite made of several sprite-memory entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaSprite {
    /// Width in sprites.
    pub width: u32,
    pub sprite_ids: Vec<i32>,
}

/// Engine state as the parser steps see it.
pub type DynEngine = dyn EngineTarget + 'static;

/// Mutators the parsers call on engine state.
pub trait EngineTarget: Send + Sync {
    fn configure_display(&mut self, config: &DisplayChipConfig);

    fn configure_colors(&mut self, config: &ColorChipConfig);

    fn color_table(&self) -> &[Rgb];

    fn set_colors(&mut self, colors: &[Rgb]);

    fn configure_sprites(&mut self, config: &SpriteChipConfig);

    /// Sprite width and height in pixels.
    fn sprite_size(&self) -> (u32, u32);

    fn set_sprite_pixels(&mut self, index: usize, pixels: &[i32]);

    /// Lowest sprite index holding exactly `pixels`.
    fn find_sprite(&self, pixels: &[i32]) -> Option<usize>;

    fn next_empty_sprite(&self) -> Option<usize>;

    fn configure_tilemap(&mut self, config: &TilemapChipConfig);

    fn tilemap_size(&self) -> (u32, u32);

    fn set_tile_at(&mut self, x: u32, y: u32, tile: TileData);

    /// Palette mapping flag-image colors to flag ids (index = flag).
    fn set_flag_colors(&mut self, colors: &[Rgb]);

    fn flag_colors(&self) -> &[Rgb];

    fn set_font(&mut self, name: &str, glyphs: Vec<i32>);

    fn configure_sounds(&mut self, config: &SoundChipConfig);

    fn set_sound_bank(&mut self, slot: usize, name: &str, samples: SoundSamples);

    fn sound_slot(&self, name: &str) -> Option<usize>;

    fn sound_count(&self) -> usize;

    fn set_songs(&mut self, songs: &[SongDefinition]);

    fn configure_game(&mut self, name: Option<&str>, save_slots: Option<u32>);

    fn set_save_slot(&mut self, key: &str, value: &str);

    fn set_meta(&mut self, key: &str, value: &str);

    fn set_meta_sprite(&mut self, name: &str, sprite: MetaSprite);

    /// Index of `color` in the color table.
    fn color_index(&self, color: Rgb) -> Option<usize> {
        self.color_table().iter().position(|c| *c == color)
    }

    /// Reuses an identical sprite or stores `pixels` in the next empty slot.
    ///
    /// Returns `None` when sprite memory is full.
    fn store_unique_sprite(&mut self, pixels: &[i32]) -> Option<usize> {
        if let Some(existing) = self.find_sprite(pixels) {
            return Some(existing);
        }

        let index = self.next_empty_sprite()?;
        self.set_sprite_pixels(index, pixels);
        Some(index)
    }
}
