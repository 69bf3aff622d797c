//! Data models for the cartridge loader.
//!
//! - [`FileFlags`] / [`Category`]: the content categories a load pass can request
//! - [`LoaderSettings`]: pacing, routing roots and exporter settings from `cartridge-loader.yaml`
//! - [`Manifest`]: the chip-keyed JSON shape shared by `data.json`, `sounds.json`,
//!   `music.json`, `saves.json` and `meta-sprites.json`
//! - [`TilemapDocument`]: `tilemap.json`
//!
//! All settings and manifest types derive `Serialize`/`Deserialize`.

pub mod config;
pub mod flags;
pub mod manifest;

pub use config::{LoaderSettings, parse_hex_color};
pub use flags::{Category, FileFlags, UnknownCategory, parse_flags};
pub use manifest::{
    ColorChipConfig, DisplayChipConfig, GameChipConfig, Manifest, ManifestSection,
    MetaSpriteDefinition, MusicChipConfig, SongDefinition, SoundChipConfig, SoundDefinition,
    SpriteChipConfig, TilemapChipConfig, TilemapDocument, TilemapLayer,
};
