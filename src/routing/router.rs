use std::collections::HashSet;

use crate::models::{Category, FileFlags};
use crate::parsers::{ParseContext, Parser, ParserKind};

use super::registry::{Guard, MatchRule, RuleSet, Select};

/// One file assigned to one parser kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub category: Category,
    pub kind: ParserKind,
    pub path: String,
}

impl Route {
    pub fn build(&self, context: &ParseContext) -> Box<dyn Parser> {
        self.kind.build(&self.path, context.clone())
    }
}

/// Result of one routing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    /// Routes in execution order.
    pub routes: Vec<Route>,
    /// Listed files no rule in the table could ever pick.
    pub unmatched: Vec<String>,
}

impl RoutePlan {
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.path.as_str()).collect()
    }

    pub fn kinds(&self) -> Vec<ParserKind> {
        self.routes.iter().map(|r| r.kind).collect()
    }

    /// Routed paths missing from `files`: fallbacks the router synthesized.
    pub fn unlisted<'a>(&'a self, files: &[String]) -> Vec<&'a Route> {
        let listed: HashSet<&str> = files.iter().map(String::as_str).collect();
        self.routes
            .iter()
            .filter(|r| !listed.contains(r.path.as_str()))
            .collect()
    }

    /// Instantiates one parser per route, in order.
    pub fn parsers(&self, context: &ParseContext) -> Vec<Box<dyn Parser>> {
        self.routes.iter().map(|r| r.build(context)).collect()
    }
}

/// Turns a file listing plus a category mask into an ordered route plan.
///
/// Categories are visited in priority order (system first, meta sprites last).
/// Within a category, rules run in table order and each path is routed at most
/// once per pass. Rules guarded by [`Guard::Routes`] are decided after the rest of
/// their category but keep their table position, which is how the flag palette
/// lands ahead of the tile images that need it.
#[derive(Debug, Clone)]
pub struct FileRouter {
    rules: RuleSet,
    report_unmatched: bool,
}

impl FileRouter {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            report_unmatched: false,
        }
    }

    /// Log unmatched files at `warn` instead of `debug`.
    pub fn with_report_unmatched(mut self, report: bool) -> Self {
        self.report_unmatched = report;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn route(&self, files: &[String], flags: FileFlags) -> RoutePlan {
        let listed: HashSet<&str> = files.iter().map(String::as_str).collect();
        let mut consumed: HashSet<String> = HashSet::new();
        let mut routes = Vec::new();

        for category in flags.categories() {
            let rules: Vec<&MatchRule> = self.rules.for_category(category).collect();
            let mut picked: Vec<Vec<String>> = vec![Vec::new(); rules.len()];

            for (i, rule) in rules.iter().enumerate() {
                if !rule.is_dependent() && guards_hold(rule, &listed, &[]) {
                    picked[i] = select(&rule.select, files, &listed, &mut consumed);
                }
            }

            let routed: Vec<ParserKind> = rules
                .iter()
                .zip(&picked)
                .filter(|(_, paths)| !paths.is_empty())
                .map(|(rule, _)| rule.kind)
                .collect();

            for (i, rule) in rules.iter().enumerate() {
                if rule.is_dependent() && guards_hold(rule, &listed, &routed) {
                    picked[i] = select(&rule.select, files, &listed, &mut consumed);
                }
            }

            for (rule, paths) in rules.iter().zip(picked) {
                for path in paths {
                    tracing::trace!("Route {} -> {} ({})", path, rule.kind, category);
                    routes.push(Route {
                        category,
                        kind: rule.kind,
                        path,
                    });
                }
            }
        }

        let unmatched: Vec<String> = files
            .iter()
            .filter(|path| !self.rules.rules().iter().any(|r| r.select.could_match(path)))
            .cloned()
            .collect();

        for path in &unmatched {
            if self.report_unmatched {
                tracing::warn!("No route for {}", path);
            } else {
                tracing::debug!("No route for {}", path);
            }
        }

        tracing::debug!(
            "Routed {} of {} files under {} for {:?}",
            routes.len(),
            files.len(),
            self.rules.project_root(),
            flags
        );

        RoutePlan { routes, unmatched }
    }
}

fn guards_hold(rule: &MatchRule, listed: &HashSet<&str>, routed: &[ParserKind]) -> bool {
    rule.guards.iter().all(|guard| match guard {
        Guard::Listed(path) => listed.contains(path.as_str()),
        Guard::Absent(path) => !listed.contains(path.as_str()),
        Guard::Routes(kinds) => kinds.iter().any(|k| routed.contains(k)),
    })
}

fn select(
    select: &Select,
    files: &[String],
    listed: &HashSet<&str>,
    consumed: &mut HashSet<String>,
) -> Vec<String> {
    let candidates: Vec<String> = match select {
        Select::Named(path) => {
            if listed.contains(path.as_str()) {
                vec![path.clone()]
            } else {
                Vec::new()
            }
        }
        Select::Bulk { .. } => files
            .iter()
            .filter(|path| select.could_match(path))
            .cloned()
            .collect(),
        Select::Default { project, builtin } => {
            if listed.contains(project.as_str()) {
                Vec::new()
            } else {
                vec![builtin.clone()]
            }
        }
    };

    // insert() is false for paths an earlier rule already took
    candidates
        .into_iter()
        .filter(|path| consumed.insert(path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoaderSettings;

    fn router() -> FileRouter {
        FileRouter::new(RuleSet::standard(&LoaderSettings::default()))
    }

    fn listing(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_named_file_precedes_bulk_and_is_not_repeated() {
        let files = listing(&[
            "/Game/Sprites/a.png",
            "/Game/sprites.png",
            "/Game/Sprites/b.png",
        ]);
        let plan = router().route(&files, Category::Sprites.flag());

        assert_eq!(
            plan.paths(),
            vec!["/Game/sprites.png", "/Game/Sprites/a.png", "/Game/Sprites/b.png"]
        );
        assert_eq!(
            plan.kinds(),
            vec![
                ParserKind::SpriteSheet,
                ParserKind::FolderSprite,
                ParserKind::FolderSprite
            ]
        );
    }

    #[test]
    fn test_tilemap_json_wins_over_images() {
        let files = listing(&[
            "/Game/tilemap.json",
            "/Game/tilemap.png",
            "/Game/Tilemaps/level1.png",
        ]);
        let plan = router().route(&files, Category::Tilemap.flag());
        assert_eq!(plan.paths(), vec!["/Game/tilemap.json"]);
    }

    #[test]
    fn test_tilemap_images_bring_the_flag_palette_first() {
        let files = listing(&[
            "/Game/tilemap.png",
            "/Game/tilemap.flags.png",
            "/Game/Tilemaps/level1.png",
            "/App/Sprites/flags.png",
        ]);
        let plan = router().route(&files, Category::Tilemap.flag());

        assert_eq!(
            plan.paths(),
            vec![
                "/App/Sprites/flags.png",
                "/Game/tilemap.png",
                "/Game/tilemap.flags.png",
                "/Game/Tilemaps/level1.png",
            ]
        );
        assert_eq!(plan.routes[0].kind, ParserKind::FlagPalette);
        assert_eq!(plan.routes[2].kind, ParserKind::TilemapFlags);
    }

    #[test]
    fn test_unlisted_builtin_flag_palette_is_skipped() {
        let files = listing(&["/Game/Tilemaps/level1.png"]);
        let plan = router().route(&files, Category::Tilemap.flag());
        assert_eq!(plan.paths(), vec!["/Game/Tilemaps/level1.png"]);
        assert_eq!(plan.kinds(), vec![ParserKind::TilemapImage]);
    }

    #[test]
    fn test_project_flag_palette_overrides_builtin() {
        let files = listing(&[
            "/Game/Tilemaps/level1.png",
            "/Game/flags.png",
            "/App/Sprites/flags.png",
        ]);
        let plan = router().route(&files, Category::Tilemap.flag());
        assert_eq!(plan.paths(), vec!["/Game/flags.png", "/Game/Tilemaps/level1.png"]);
    }

    #[test]
    fn test_tilemap_layers_need_the_base_image() {
        let files = listing(&["/Game/tilemap.layer2.png"]);
        let plan = router().route(&files, Category::Tilemap.flag());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_font_fallbacks() {
        let files = listing(&["/Game/large.font.png", "/Game/custom.font.png"]);
        let plan = router().route(&files, Category::Fonts.flag());
        assert_eq!(
            plan.paths(),
            vec![
                "/Game/large.font.png",
                "/Game/custom.font.png",
                "/App/Fonts/medium.font.png",
                "/App/Fonts/small.font.png",
            ]
        );
    }

    #[test]
    fn test_unlisted_routes_are_the_synthesized_fallbacks() {
        let files = listing(&["/Game/medium.font.png", "/Game/colors.png"]);
        let plan = router().route(&files, Category::Colors.flag() | Category::Fonts.flag());

        let unlisted: Vec<&str> = plan
            .unlisted(&files)
            .into_iter()
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(
            unlisted,
            vec!["/App/Fonts/large.font.png", "/App/Fonts/small.font.png"]
        );
        let routed: Vec<String> = plan.paths().into_iter().map(str::to_string).collect();
        assert!(plan.unlisted(&routed).is_empty());
    }

    #[test]
    fn test_sounds_manifest_then_waves() {
        let files = listing(&["/Game/Sounds/jump.wav", "/Game/sounds.json"]);
        let plan = router().route(&files, Category::Sounds.flag());
        assert_eq!(plan.paths(), vec!["/Game/sounds.json", "/Game/Sounds/jump.wav"]);
    }

    #[test]
    fn test_unmatched_files_are_reported() {
        let files = listing(&["/Game/data.json", "/Game/readme.txt"]);
        let plan = router()
            .with_report_unmatched(true)
            .route(&files, FileFlags::all());
        assert_eq!(plan.unmatched, vec!["/Game/readme.txt"]);
    }

    #[test]
    fn test_custom_rule_set() {
        let rules = RuleSet::new(
            "/Cart/",
            vec![MatchRule::new(
                Category::Colors,
                Select::Named("/Cart/palette.png".into()),
                ParserKind::Colors,
            )],
        );
        let files = listing(&["/Cart/palette.png", "/Cart/colors.png"]);
        let plan = FileRouter::new(rules).route(&files, FileFlags::all());

        assert_eq!(plan.paths(), vec!["/Cart/palette.png"]);
        assert_eq!(plan.unmatched, vec!["/Cart/colors.png"]);
    }
}
