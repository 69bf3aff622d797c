use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loader settings from `cartridge-loader.yaml`
///
/// Controls background pacing, routing roots and the screenshot exporter.
/// Every field has a default so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Sleep between two background steps, in milliseconds.
    #[serde(default = "default_step_yield_ms")]
    pub step_yield_ms: u64,

    /// Stall detector for background steps. 0 disables it.
    #[serde(default)]
    pub step_timeout_ms: u64,

    /// Log files no route claims at `warn` instead of `debug`.
    #[serde(default)]
    pub report_unmatched: bool,

    #[serde(default = "default_project_root")]
    pub project_root: String,

    #[serde(default = "default_builtin_root")]
    pub builtin_root: String,

    /// Fonts every cartridge gets, falling back to the built-in copies.
    #[serde(default = "default_fonts")]
    pub default_fonts: Vec<String>,

    /// Image color treated as an empty pixel.
    #[serde(default = "default_mask_color")]
    pub mask_color: String,

    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,

    #[serde(default = "default_screenshot_scale")]
    pub screenshot_scale: u32,

    #[serde(default = "default_progress_channel_capacity")]
    pub progress_channel_capacity: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            step_yield_ms: default_step_yield_ms(),
            step_timeout_ms: 0,
            report_unmatched: false,
            project_root: default_project_root(),
            builtin_root: default_builtin_root(),
            default_fonts: default_fonts(),
            mask_color: default_mask_color(),
            screenshot_dir: default_screenshot_dir(),
            screenshot_scale: default_screenshot_scale(),
            progress_channel_capacity: default_progress_channel_capacity(),
        }
    }
}

impl LoaderSettings {
    pub fn step_yield(&self) -> Duration {
        Duration::from_millis(self.step_yield_ms)
    }

    /// `None` when the stall detector is disabled.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_ms > 0).then(|| Duration::from_millis(self.step_timeout_ms))
    }

    /// Parses [`mask_color`](Self::mask_color) as `#RRGGBB`.
    pub fn mask_rgb(&self) -> Option<[u8; 3]> {
        parse_hex_color(&self.mask_color)
    }
}

/// Parses `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

fn default_step_yield_ms() -> u64 {
    1
}

fn default_project_root() -> String {
    "/Game/".to_string()
}

fn default_builtin_root() -> String {
    "/App/".to_string()
}

fn default_fonts() -> Vec<String> {
    vec!["large".to_string(), "medium".to_string(), "small".to_string()]
}

fn default_mask_color() -> String {
    "#FF00FF".to_string()
}

fn default_screenshot_dir() -> String {
    "/Tmp/Screenshots/".to_string()
}

fn default_screenshot_scale() -> u32 {
    1
}

fn default_progress_channel_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_settings_defaults() {
        let settings = LoaderSettings::default();
        assert_eq!(settings.step_yield_ms, 1);
        assert_eq!(settings.project_root, "/Game/");
        assert_eq!(settings.builtin_root, "/App/");
        assert_eq!(settings.default_fonts, vec!["large", "medium", "small"]);
        assert!(settings.step_timeout().is_none());
        assert!(!settings.report_unmatched);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings: LoaderSettings =
            serde_yaml_ng::from_str("step_timeout_ms: 250\nreport_unmatched: true\n").unwrap();

        assert_eq!(settings.step_timeout(), Some(Duration::from_millis(250)));
        assert!(settings.report_unmatched);
        assert_eq!(settings.screenshot_scale, 1);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF00FF"), Some([255, 0, 255]));
        assert_eq!(parse_hex_color("2d1b2e"), Some([0x2d, 0x1b, 0x2e]));
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }
}
