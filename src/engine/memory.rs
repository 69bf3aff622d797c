use indexmap::IndexMap;

use super::sprites::{EMPTY_PIXEL, SpriteMemory};
use super::{EngineTarget, MetaSprite, Rgb, SoundSamples, TileData};
use crate::export::DisplaySource;
use crate::models::{
    ColorChipConfig, DisplayChipConfig, SongDefinition, SoundChipConfig, SpriteChipConfig,
    TilemapChipConfig,
};

const DEFAULT_DISPLAY: (u32, u32) = (256, 240);
const DEFAULT_TILEMAP: (u32, u32) = (32, 30);
const DEFAULT_MAX_COLORS: usize = 256;
const DEFAULT_TOTAL_FLAGS: u32 = 16;
const DEFAULT_SOUND_CHANNELS: u32 = 5;

/// One sound bank slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundBank {
    pub name: String,
    pub samples: SoundSamples,
}

/// In-memory engine state implementing every loader mutator.
///
/// Out-of-range writes are clamped or dropped here, never in the parsers.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    pub display_size: (u32, u32),
    pub frame: Vec<i32>,

    pub colors: Vec<Rgb>,
    pub max_colors: usize,
    pub background_color: i32,

    pub sprites: SpriteMemory,
    pub max_sprite_count: u32,

    pub tilemap_size: (u32, u32),
    pub tiles: Vec<TileData>,
    pub total_flags: u32,
    pub flag_colors: Vec<Rgb>,

    pub fonts: IndexMap<String, Vec<i32>>,

    pub sound_channels: u32,
    pub sounds: Vec<SoundBank>,
    pub songs: Vec<SongDefinition>,

    pub game_name: Option<String>,
    pub save_slots: u32,
    pub saves: IndexMap<String, String>,
    pub meta: IndexMap<String, String>,
    pub meta_sprites: IndexMap<String, MetaSprite>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        let (width, height) = DEFAULT_DISPLAY;
        let (columns, rows) = DEFAULT_TILEMAP;

        Self {
            display_size: DEFAULT_DISPLAY,
            frame: vec![EMPTY_PIXEL; (width * height) as usize],
            colors: Vec::new(),
            max_colors: DEFAULT_MAX_COLORS,
            background_color: 0,
            sprites: SpriteMemory::new(),
            max_sprite_count: 64,
            tilemap_size: DEFAULT_TILEMAP,
            tiles: vec![TileData::default(); (columns * rows) as usize],
            total_flags: DEFAULT_TOTAL_FLAGS,
            flag_colors: Vec::new(),
            fonts: IndexMap::new(),
            sound_channels: DEFAULT_SOUND_CHANNELS,
            sounds: Vec::new(),
            songs: Vec::new(),
            game_name: None,
            save_slots: 8,
            saves: IndexMap::new(),
            meta: IndexMap::new(),
            meta_sprites: IndexMap::new(),
        }
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<&TileData> {
        let (columns, rows) = self.tilemap_size;
        if x >= columns || y >= rows {
            return None;
        }
        self.tiles.get((y * columns + x) as usize)
    }

    /// Writes a pixel into the frame buffer (used to stage screenshots).
    pub fn set_frame_pixel(&mut self, x: u32, y: u32, color: i32) {
        let (width, height) = self.display_size;
        if x < width && y < height {
            self.frame[(y * width + x) as usize] = color;
        }
    }

    fn resize_tilemap(&mut self, columns: u32, rows: u32) {
        if (columns, rows) == self.tilemap_size {
            return;
        }
        self.tilemap_size = (columns, rows);
        self.tiles = vec![TileData::default(); (columns * rows) as usize];
    }
}

impl EngineTarget for MemoryEngine {
    fn configure_display(&mut self, config: &DisplayChipConfig) {
        if config.width == 0 || config.height == 0 {
            tracing::warn!(
                "Ignoring display size {}x{}",
                config.width,
                config.height
            );
            return;
        }
        self.display_size = (config.width, config.height);
        self.frame = vec![EMPTY_PIXEL; (config.width * config.height) as usize];
    }

    fn configure_colors(&mut self, config: &ColorChipConfig) {
        if let Some(max) = config.max_colors {
            self.max_colors = (max as usize).max(1);
            self.colors.truncate(self.max_colors);
        }
        if let Some(background) = config.background_color {
            self.background_color = background;
        }
    }

    fn color_table(&self) -> &[Rgb] {
        &self.colors
    }

    fn set_colors(&mut self, colors: &[Rgb]) {
        let kept = colors.len().min(self.max_colors);
        if kept < colors.len() {
            tracing::warn!(
                "Color table truncated from {} to {} entries",
                colors.len(),
                kept
            );
        }
        self.colors = colors[..kept].to_vec();
    }

    fn configure_sprites(&mut self, config: &SpriteChipConfig) {
        if let Some(max) = config.max_sprite_count {
            self.max_sprite_count = max;
        }
        if let Some(cps) = config.cps {
            self.sprites.set_colors_per_sprite(cps);
        }
        if let Some(pages) = config.pages {
            self.sprites.set_pages(pages);
        }
    }

    fn sprite_size(&self) -> (u32, u32) {
        self.sprites.sprite_size()
    }

    fn set_sprite_pixels(&mut self, index: usize, pixels: &[i32]) {
        let index = i32::try_from(index).unwrap_or(i32::MAX);
        self.sprites.update_sprite_at(index, pixels);
    }

    fn find_sprite(&self, pixels: &[i32]) -> Option<usize> {
        self.sprites.find_sprite(pixels, false)
    }

    fn next_empty_sprite(&self) -> Option<usize> {
        self.sprites.next_empty_id()
    }

    fn configure_tilemap(&mut self, config: &TilemapChipConfig) {
        let (columns, rows) = self.tilemap_size;
        self.resize_tilemap(
            config.columns.unwrap_or(columns),
            config.rows.unwrap_or(rows),
        );
        if let Some(total_flags) = config.total_flags {
            self.total_flags = total_flags;
        }
    }

    fn tilemap_size(&self) -> (u32, u32) {
        self.tilemap_size
    }

    fn set_tile_at(&mut self, x: u32, y: u32, tile: TileData) {
        let (columns, rows) = self.tilemap_size;
        if x >= columns || y >= rows {
            tracing::trace!("Dropping tile write outside tilemap at {},{}", x, y);
            return;
        }

        let total_flags = self.total_flags as i32;
        let cell = &mut self.tiles[(y * columns + x) as usize];
        if let Some(sprite_id) = tile.sprite_id {
            cell.sprite_id = Some(sprite_id);
        }
        if let Some(flag) = tile.flag {
            cell.flag = Some(flag.clamp(-1, total_flags - 1));
        }
    }

    fn set_flag_colors(&mut self, colors: &[Rgb]) {
        self.flag_colors = colors.to_vec();
    }

    fn flag_colors(&self) -> &[Rgb] {
        &self.flag_colors
    }

    fn set_font(&mut self, name: &str, glyphs: Vec<i32>) {
        self.fonts.insert(name.to_string(), glyphs);
    }

    fn configure_sounds(&mut self, config: &SoundChipConfig) {
        if let Some(channels) = config.total_channels {
            self.sound_channels = channels;
        }
    }

    fn set_sound_bank(&mut self, slot: usize, name: &str, samples: SoundSamples) {
        let bank = SoundBank {
            name: name.to_string(),
            samples,
        };

        if slot < self.sounds.len() {
            self.sounds[slot] = bank;
        } else {
            self.sounds.push(bank);
        }
    }

    fn sound_slot(&self, name: &str) -> Option<usize> {
        self.sounds.iter().position(|bank| bank.name == name)
    }

    fn sound_count(&self) -> usize {
        self.sounds.len()
    }

    fn set_songs(&mut self, songs: &[SongDefinition]) {
        self.songs = songs.to_vec();
    }

    fn configure_game(&mut self, name: Option<&str>, save_slots: Option<u32>) {
        if let Some(name) = name {
            self.game_name = Some(name.to_string());
        }
        if let Some(slots) = save_slots {
            self.save_slots = slots;
        }
    }

    fn set_save_slot(&mut self, key: &str, value: &str) {
        if !self.saves.contains_key(key) && self.saves.len() >= self.save_slots as usize {
            tracing::warn!("Save slots full, dropping key {}", key);
            return;
        }
        self.saves.insert(key.to_string(), value.to_string());
    }

    fn set_meta(&mut self, key: &str, value: &str) {
        self.meta.insert(key.to_string(), value.to_string());
    }

    fn set_meta_sprite(&mut self, name: &str, sprite: MetaSprite) {
        self.meta_sprites.insert(name.to_string(), sprite);
    }
}

impl DisplaySource for MemoryEngine {
    fn frame(&self) -> &[i32] {
        &self.frame
    }

    fn frame_width(&self) -> u32 {
        self.display_size.0
    }

    fn visible_size(&self) -> (u32, u32) {
        self.display_size
    }

    fn palette(&self) -> &[Rgb] {
        &self.colors
    }

    fn background_color(&self) -> i32 {
        self.background_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unique_sprite_reuses_duplicates() {
        let mut engine = MemoryEngine::new();
        let a = vec![1; 64];
        let b = vec![2; 64];

        assert_eq!(engine.store_unique_sprite(&a), Some(0));
        assert_eq!(engine.store_unique_sprite(&b), Some(1));
        assert_eq!(engine.store_unique_sprite(&a), Some(0));
        assert_eq!(engine.sprites.sprites_in_memory(), 2);
    }

    #[test]
    fn test_tile_writes_are_partial_and_bounded() {
        let mut engine = MemoryEngine::new();
        engine.set_tile_at(1, 1, TileData::sprite(12));
        engine.set_tile_at(1, 1, TileData::flag(40));
        engine.set_tile_at(999, 0, TileData::sprite(3));

        let tile = engine.tile_at(1, 1).unwrap();
        assert_eq!(tile.sprite_id, Some(12));
        assert_eq!(tile.flag, Some(15));
        assert!(engine.tile_at(999, 0).is_none());
    }

    #[test]
    fn test_color_table_respects_max_colors() {
        let mut engine = MemoryEngine::new();
        engine.configure_colors(&ColorChipConfig {
            max_colors: Some(2),
            ..Default::default()
        });
        engine.set_colors(&[[0, 0, 0], [255, 255, 255], [255, 0, 0]]);

        assert_eq!(engine.color_table().len(), 2);
        assert_eq!(engine.color_index([255, 255, 255]), Some(1));
        assert_eq!(engine.color_index([255, 0, 0]), None);
    }

    #[test]
    fn test_sound_bank_slots() {
        let mut engine = MemoryEngine::new();
        engine.set_sound_bank(0, "jump", SoundSamples::Synth("0,1".into()));
        engine.set_sound_bank(7, "boom", SoundSamples::Wave(vec![1, 2]));

        assert_eq!(engine.sound_count(), 2);
        assert_eq!(engine.sound_slot("boom"), Some(1));
    }
}
