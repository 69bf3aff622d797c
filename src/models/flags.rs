use std::fmt;
use std::str::FromStr;

bitflags::bitflags! {
    /// Content categories a load pass may process.
    ///
    /// Categories are independent: any subset may be requested, and a category
    /// that is not requested never produces a parser.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FileFlags: u32 {
        const SYSTEM = 1 << 0;
        const COLORS = 1 << 1;
        const SPRITES = 1 << 2;
        const TILEMAP = 1 << 3;
        const FONTS = 1 << 4;
        const META = 1 << 5;
        const SOUNDS = 1 << 6;
        const MUSIC = 1 << 7;
        const SAVE_DATA = 1 << 8;
        const META_SPRITES = 1 << 9;
    }
}

/// A single content category, in routing priority order.
///
/// The declaration order is the order in which the router emits parsers; later
/// categories may rely on state written by earlier ones (the color table must
/// exist before sprite pixels are mapped to color indices).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    System,
    Colors,
    Sprites,
    Tilemap,
    Fonts,
    Meta,
    Sounds,
    Music,
    SaveData,
    MetaSprites,
}

impl Category {
    /// Every category in routing priority order.
    pub const ALL: [Category; 10] = [
        Category::System,
        Category::Colors,
        Category::Sprites,
        Category::Tilemap,
        Category::Fonts,
        Category::Meta,
        Category::Sounds,
        Category::Music,
        Category::SaveData,
        Category::MetaSprites,
    ];

    pub fn flag(self) -> FileFlags {
        match self {
            Category::System => FileFlags::SYSTEM,
            Category::Colors => FileFlags::COLORS,
            Category::Sprites => FileFlags::SPRITES,
            Category::Tilemap => FileFlags::TILEMAP,
            Category::Fonts => FileFlags::FONTS,
            Category::Meta => FileFlags::META,
            Category::Sounds => FileFlags::SOUNDS,
            Category::Music => FileFlags::MUSIC,
            Category::SaveData => FileFlags::SAVE_DATA,
            Category::MetaSprites => FileFlags::META_SPRITES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Colors => "colors",
            Category::Sprites => "sprites",
            Category::Tilemap => "tilemap",
            Category::Fonts => "fonts",
            Category::Meta => "meta",
            Category::Sounds => "sounds",
            Category::Music => "music",
            Category::SaveData => "savedata",
            Category::MetaSprites => "metasprites",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FileFlags {
    /// Categories contained in this mask, in routing priority order.
    pub fn categories(self) -> impl Iterator<Item = Category> {
        Category::ALL
            .into_iter()
            .filter(move |category| self.contains(category.flag()))
    }
}

/// Error returned when a category list cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown content category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        Category::ALL
            .into_iter()
            .find(|category| category.name() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Parses `all` or a comma separated list such as `system,colors,sprites`.
pub fn parse_flags(list: &str) -> Result<FileFlags, UnknownCategory> {
    if list.trim().eq_ignore_ascii_case("all") {
        return Ok(FileFlags::all());
    }

    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .try_fold(FileFlags::empty(), |flags, part| {
            Ok(flags | part.parse::<Category>()?.flag())
        })
}
