use crate::models::LoaderSettings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment};
use std::fs;

/// File name of the settings file inside the configuration directory.
pub const SETTINGS_FILE: &str = "cartridge-loader.yaml";

/// Prefix of environment variables overriding file values (`CARTLOAD_STEP_YIELD_MS`).
pub const ENV_PREFIX: &str = "CARTLOAD";

/// Configuration manager for loading and saving loader settings.
///
/// Settings live in `cartridge-loader.yaml`. Values are layered: built-in
/// defaults, then the file, then `CARTLOAD_*` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating the directory when needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    /// Load settings from the file and the process environment.
    pub fn load_settings(&self) -> Result<LoaderSettings> {
        self.load_settings_with(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Load settings from the file, overridden by the given environment source.
    pub fn load_settings_with(&self, environment: Environment) -> Result<LoaderSettings> {
        let file_settings = self.read_settings_file()?;

        let layered = Config::builder()
            .add_source(
                Config::try_from(&file_settings).context("Failed to convert settings file")?,
            )
            .add_source(environment)
            .build()
            .context("Failed to apply environment overrides")?;

        let settings: LoaderSettings = layered
            .try_deserialize()
            .context("Failed to build loader settings")?;

        if settings.mask_rgb().is_none() {
            tracing::warn!(
                "Mask color {:?} is not #RRGGBB, masking disabled",
                settings.mask_color
            );
        }
        Ok(settings)
    }

    /// Save settings as YAML.
    pub fn save_settings(&self, settings: &LoaderSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    fn read_settings_file(&self) -> Result<LoaderSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(LoaderSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: LoaderSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }
}
