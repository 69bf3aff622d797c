//! JSON manifest shapes shared by the system, sound, music, save and meta sprite files.
//!
//! Every manifest is an object keyed by chip name. Any file may carry any chip
//! section; the parser applies whatever it finds in a fixed section order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "DisplayChip", default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayChipConfig>,

    #[serde(rename = "ColorChip", default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorChipConfig>,

    #[serde(rename = "SpriteChip", default, skip_serializing_if = "Option::is_none")]
    pub sprites: Option<SpriteChipConfig>,

    #[serde(rename = "TilemapChip", default, skip_serializing_if = "Option::is_none")]
    pub tilemap: Option<TilemapChipConfig>,

    #[serde(rename = "SoundChip", default, skip_serializing_if = "Option::is_none")]
    pub sounds: Option<SoundChipConfig>,

    #[serde(rename = "MusicChip", default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicChipConfig>,

    #[serde(rename = "GameChip", default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameChipConfig>,

    /// Sections no parser understands (`FontChip`, editor chips, ...).
    #[serde(flatten)]
    pub other: IndexMap<String, serde_json::Value>,
}

/// One chip section present in a manifest, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSection {
    Display,
    Colors,
    Sprites,
    Tilemap,
    Sounds,
    Music,
    Game,
}

impl Manifest {
    /// Present sections in the order they are applied.
    pub fn sections(&self) -> Vec<ManifestSection> {
        let mut sections = Vec::new();
        if self.display.is_some() {
            sections.push(ManifestSection::Display);
        }
        if self.colors.is_some() {
            sections.push(ManifestSection::Colors);
        }
        if self.sprites.is_some() {
            sections.push(ManifestSection::Sprites);
        }
        if self.tilemap.is_some() {
            sections.push(ManifestSection::Tilemap);
        }
        if self.sounds.is_some() {
            sections.push(ManifestSection::Sounds);
        }
        if self.music.is_some() {
            sections.push(ManifestSection::Music);
        }
        if self.game.is_some() {
            sections.push(ManifestSection::Game);
        }
        sections
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayChipConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorChipConfig {
    #[serde(default)]
    pub max_colors: Option<u32>,

    #[serde(default)]
    pub background_color: Option<i32>,

    /// `#RRGGBB` entries replacing the color table.
    #[serde(default)]
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteChipConfig {
    #[serde(rename = "maxSpriteCount", default)]
    pub max_sprite_count: Option<u32>,

    /// Colors per sprite.
    #[serde(default)]
    pub cps: Option<u32>,

    #[serde(default)]
    pub pages: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilemapChipConfig {
    #[serde(default)]
    pub columns: Option<u32>,

    #[serde(default)]
    pub rows: Option<u32>,

    #[serde(default)]
    pub total_flags: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundChipConfig {
    #[serde(default)]
    pub total_channels: Option<u32>,

    #[serde(default)]
    pub sounds: Vec<SoundDefinition>,
}

/// A synthesized sound: a name plus the engine's parameter string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub settings: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicChipConfig {
    #[serde(default)]
    pub songs: Vec<SongDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongDefinition {
    #[serde(default)]
    pub name: String,

    /// Pattern ids in playback order.
    #[serde(default)]
    pub patterns: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameChipConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub save_slots: Option<u32>,

    #[serde(default)]
    pub saved_data: IndexMap<String, String>,

    #[serde(default)]
    pub meta_sprites: IndexMap<String, MetaSpriteDefinition>,
}

/// A sprite composed of several 8x8 sprites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaSpriteDefinition {
    /// Width in sprites; ids wrap into rows of this length.
    #[serde(default = "default_meta_width")]
    pub width: u32,

    #[serde(rename = "spriteIds", default)]
    pub sprite_ids: Vec<i32>,
}

fn default_meta_width() -> u32 {
    1
}

/// `tilemap.json`: row-major layers of sprite ids and flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TilemapDocument {
    #[serde(alias = "columns")]
    pub width: u32,

    #[serde(alias = "rows")]
    pub height: u32,

    #[serde(default)]
    pub layers: Vec<TilemapLayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TilemapLayer {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub data: Vec<i32>,
}

impl TilemapLayer {
    /// Layers named `Flags` carry tile flags, every other layer carries sprite ids.
    pub fn is_flag_layer(&self) -> bool {
        self.name.eq_ignore_ascii_case("flags")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_sections_in_order() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "GameChip": {"name": "Demo"},
                "SpriteChip": {"maxSpriteCount": 64, "cps": 4, "pages": 2},
                "FontChip": {}
            }"#,
        )
        .unwrap();

        assert_eq!(
            manifest.sections(),
            vec![ManifestSection::Sprites, ManifestSection::Game]
        );
        assert_eq!(manifest.sprites.unwrap().pages, Some(2));
        assert!(manifest.other.contains_key("FontChip"));
    }

    #[test]
    fn test_tilemap_document_aliases() {
        let doc: TilemapDocument = serde_json::from_str(
            r#"{"columns": 2, "rows": 1, "layers": [{"name": "Flags", "data": [0, 3]}]}"#,
        )
        .unwrap();

        assert_eq!(doc.width, 2);
        assert_eq!(doc.height, 1);
        assert!(doc.layers[0].is_flag_layer());
    }
}
