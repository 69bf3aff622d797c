//! The match-rule table consulted by the router.
//!
//! A [`RuleSet`] is an ordered list of `(category, selector, guards, parser kind)`
//! entries. It is built once and handed to [`FileRouter`](super::FileRouter); the
//! router evaluates every entry the same way, so adding a content type means adding
//! rows, not branches.

use crate::models::{Category, LoaderSettings};
use crate::parsers::ParserKind;

/// Which listing entries a rule picks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Select {
    /// One exact path, if listed.
    Named(String),
    /// Every listed path starting with `prefix` and ending with `suffix`, in listing order.
    Bulk { prefix: String, suffix: String },
    /// `builtin` when `project` is not listed. The built-in path is routed even
    /// if the listing does not contain it.
    Default { project: String, builtin: String },
}

impl Select {
    pub fn bulk(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Select::Bulk {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// True if `path` is the kind of path this selector could ever pick.
    pub fn could_match(&self, path: &str) -> bool {
        match self {
            Select::Named(named) => path == named,
            Select::Bulk { prefix, suffix } => path.starts_with(prefix) && path.ends_with(suffix),
            Select::Default { project, builtin } => path == project || path == builtin,
        }
    }
}

/// Preconditions on the listing or on the category's other routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The exact path is listed.
    Listed(String),
    /// The exact path is not listed.
    Absent(String),
    /// Another rule of the same category routes a parser of one of these kinds.
    /// Rules carrying this guard still run at their table position.
    Routes(Vec<ParserKind>),
}

/// One row of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub category: Category,
    pub select: Select,
    pub guards: Vec<Guard>,
    pub kind: ParserKind,
}

impl MatchRule {
    pub fn new(category: Category, select: Select, kind: ParserKind) -> Self {
        Self {
            category,
            select,
            guards: Vec::new(),
            kind,
        }
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// True if the rule waits for the rest of its category to be routed.
    pub fn is_dependent(&self) -> bool {
        self.guards.iter().any(|g| matches!(g, Guard::Routes(_)))
    }
}

/// Immutable, ordered rule table.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    project_root: String,
    rules: Vec<MatchRule>,
}

impl RuleSet {
    pub fn new(project_root: impl Into<String>, rules: Vec<MatchRule>) -> Self {
        Self {
            project_root: normalize_root(&project_root.into()),
            rules,
        }
    }

    /// The built-in table for a project folder plus a built-in asset folder.
    pub fn standard(settings: &LoaderSettings) -> Self {
        let game = normalize_root(&settings.project_root);
        let app = normalize_root(&settings.builtin_root);
        let tilemap_json = format!("{game}tilemap.json");
        let tilemap_png = format!("{game}tilemap.png");
        let tile_images = Guard::Routes(vec![ParserKind::TilemapImage, ParserKind::TilemapFlags]);

        let named = |category, name: &str, kind| {
            MatchRule::new(category, Select::Named(format!("{game}{name}")), kind)
        };

        let mut rules = vec![
            named(Category::System, "data.json", ParserKind::Manifest),
            named(Category::Colors, "colors.png", ParserKind::Colors),
            named(Category::Sprites, "sprites.png", ParserKind::SpriteSheet),
            MatchRule::new(
                Category::Sprites,
                Select::bulk(format!("{game}Sprites/"), ".png"),
                ParserKind::FolderSprite,
            ),
            named(Category::Tilemap, "tilemap.json", ParserKind::TilemapJson),
            named(Category::Tilemap, "flags.png", ParserKind::FlagPalette).guard(tile_images.clone()),
            MatchRule::new(
                Category::Tilemap,
                Select::Named(format!("{app}Sprites/flags.png")),
                ParserKind::FlagPalette,
            )
            .guard(Guard::Absent(format!("{game}flags.png")))
            .guard(tile_images),
            named(Category::Tilemap, "tilemap.png", ParserKind::TilemapImage)
                .guard(Guard::Absent(tilemap_json.clone())),
            MatchRule::new(
                Category::Tilemap,
                Select::bulk(format!("{game}tilemap."), ".flags.png"),
                ParserKind::TilemapFlags,
            )
            .guard(Guard::Absent(tilemap_json.clone()))
            .guard(Guard::Listed(tilemap_png.clone())),
            MatchRule::new(
                Category::Tilemap,
                Select::bulk(format!("{game}tilemap."), ".png"),
                ParserKind::TilemapImage,
            )
            .guard(Guard::Absent(tilemap_json.clone()))
            .guard(Guard::Listed(tilemap_png)),
            MatchRule::new(
                Category::Tilemap,
                Select::bulk(format!("{game}Tilemaps/"), ".flags.png"),
                ParserKind::TilemapFlags,
            )
            .guard(Guard::Absent(tilemap_json.clone())),
            MatchRule::new(
                Category::Tilemap,
                Select::bulk(format!("{game}Tilemaps/"), ".png"),
                ParserKind::TilemapImage,
            )
            .guard(Guard::Absent(tilemap_json)),
            MatchRule::new(
                Category::Fonts,
                Select::bulk(game.clone(), ".font.png"),
                ParserKind::Font,
            ),
        ];

        for font in &settings.default_fonts {
            rules.push(MatchRule::new(
                Category::Fonts,
                Select::Default {
                    project: format!("{game}{font}.font.png"),
                    builtin: format!("{app}Fonts/{font}.font.png"),
                },
                ParserKind::Font,
            ));
        }

        rules.extend([
            named(Category::Meta, "info.json", ParserKind::MetaData),
            named(Category::Sounds, "sounds.json", ParserKind::Manifest),
            MatchRule::new(
                Category::Sounds,
                Select::bulk(game.clone(), ".wav"),
                ParserKind::Wave,
            ),
            named(Category::Music, "music.json", ParserKind::Manifest),
            named(Category::SaveData, "saves.json", ParserKind::Manifest),
            named(Category::MetaSprites, "meta-sprites.json", ParserKind::Manifest),
        ]);

        Self::new(game, rules)
    }

    pub fn project_root(&self) -> &str {
        &self.project_root
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// Rules of one category, in table order.
    pub fn for_category(&self, category: Category) -> impl Iterator<Item = &MatchRule> {
        self.rules.iter().filter(move |r| r.category == category)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// `Game`, `/Game` and `/Game/` all become `/Game/`.
fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_covers_every_category() {
        let rules = RuleSet::standard(&LoaderSettings::default());
        for category in Category::ALL {
            assert!(
                rules.for_category(category).next().is_some(),
                "no rule for {category}"
            );
        }
        assert_eq!(rules.project_root(), "/Game/");
    }

    #[test]
    fn test_default_font_rules_follow_settings() {
        let settings = LoaderSettings {
            default_fonts: vec!["tiny".to_string()],
            ..LoaderSettings::default()
        };
        let rules = RuleSet::standard(&settings);
        let defaults: Vec<_> = rules
            .for_category(Category::Fonts)
            .filter_map(|r| match &r.select {
                Select::Default { builtin, .. } => Some(builtin.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(defaults, vec!["/App/Fonts/tiny.font.png"]);
    }

    #[test]
    fn test_selectors() {
        assert!(Select::Named("/Game/colors.png".into()).could_match("/Game/colors.png"));
        assert!(!Select::Named("/Game/colors.png".into()).could_match("/Game/Sprites/colors.png"));
        assert!(Select::bulk("/Game/Sprites/", ".png").could_match("/Game/Sprites/hero.png"));
        assert!(!Select::bulk("/Game/Sprites/", ".png").could_match("/Game/sprites.png"));
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_root("Game"), "/Game/");
        assert_eq!(normalize_root("/App"), "/App/");
        assert_eq!(normalize_root("/"), "/");
    }
}
