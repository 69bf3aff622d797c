//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use cartridge_loader::MemoryFileSystem;
use cartridge_loader::codec::{DecodedImage, encode_rgba_png};

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const MASK: [u8; 4] = [255, 0, 255, 255];

/// Encodes a `width` x `height` PNG whose pixels come from `pixel(x, y)`.
pub fn png(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let pixels = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| pixel(x, y))
        .collect();
    let image = DecodedImage::new(width, height, pixels).unwrap();
    encode_rgba_png(&image).unwrap()
}

pub fn listing(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

pub const DATA_JSON: &str = r##"{
    "DisplayChip": { "width": 64, "height": 48 },
    "ColorChip": { "maxColors": 16, "backgroundColor": 0, "colors": ["#000000", "#FFFFFF"] },
    "GameChip": { "name": "Demo", "saveSlots": 4, "savedData": { "hiscore": "100" } }
}"##;

/// The three-file cartridge: manifest, color table, one folder sprite.
pub fn small_cartridge() -> MemoryFileSystem {
    MemoryFileSystem::with_files([
        ("/Game/data.json", DATA_JSON.as_bytes().to_vec()),
        (
            "/Game/colors.png",
            png(3, 1, |x, _| [RED, BLUE, WHITE][x as usize]),
        ),
        ("/Game/Sprites/hero.png", png(8, 8, |x, _| if x < 4 { RED } else { BLUE })),
    ])
}
