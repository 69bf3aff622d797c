//! JSON chip manifests: `data.json`, `sounds.json`, `music.json`, `saves.json`
//! and `meta-sprites.json` all share the same shape and parser.

use crate::engine::{DynEngine, MetaSprite, SoundSamples};
use crate::models::{Manifest, ManifestSection, parse_hex_color};
use crate::task::{Plan, Step};

use super::{JsonSource, ParseContext, ParseError, Parser, ParserKind};

const STEPS: usize = JsonSource::<Manifest>::STEPS;

/// Applies every chip section of a manifest in chip order.
pub struct ManifestParser {
    source: JsonSource<Manifest>,
}

impl ManifestParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: JsonSource::new(path, context),
        }
    }

    fn apply(
        &self,
        manifest: &Manifest,
        section: ManifestSection,
        engine: &mut DynEngine,
    ) -> Result<(), ParseError> {
        match section {
            ManifestSection::Display => {
                if let Some(display) = &manifest.display {
                    engine.configure_display(display);
                }
            }
            ManifestSection::Colors => {
                if let Some(colors) = &manifest.colors {
                    engine.configure_colors(colors);
                    if !colors.colors.is_empty() {
                        let table = colors
                            .colors
                            .iter()
                            .map(|hex| {
                                parse_hex_color(hex).ok_or_else(|| {
                                    self.source.invalid(format!("bad color {hex:?}"))
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        engine.set_colors(&table);
                    }
                }
            }
            ManifestSection::Sprites => {
                if let Some(sprites) = &manifest.sprites {
                    engine.configure_sprites(sprites);
                }
            }
            ManifestSection::Tilemap => {
                if let Some(tilemap) = &manifest.tilemap {
                    engine.configure_tilemap(tilemap);
                }
            }
            ManifestSection::Sounds => {
                if let Some(sounds) = &manifest.sounds {
                    engine.configure_sounds(sounds);
                    for (slot, sound) in sounds.sounds.iter().enumerate() {
                        engine.set_sound_bank(
                            slot,
                            &sound.name,
                            SoundSamples::Synth(sound.settings.clone()),
                        );
                    }
                }
            }
            ManifestSection::Music => {
                if let Some(music) = &manifest.music {
                    engine.set_songs(&music.songs);
                }
            }
            ManifestSection::Game => {
                if let Some(game) = &manifest.game {
                    engine.configure_game(game.name.as_deref(), game.save_slots);
                    for (key, value) in &game.saved_data {
                        engine.set_save_slot(key, value);
                    }
                    for (name, sprite) in &game.meta_sprites {
                        engine.set_meta_sprite(
                            name,
                            MetaSprite {
                                width: sprite.width,
                                sprite_ids: sprite.sprite_ids.clone(),
                            },
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

impl Plan for ManifestParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(STEPS + 1)
    }
}

impl Step<DynEngine> for ManifestParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index < STEPS {
            return self.source.step(index);
        }

        let manifest = self.source.take_value()?;
        for key in manifest.other.keys() {
            tracing::debug!("Ignoring manifest section {} in {}", key, self.source.path());
        }

        let sections = manifest.sections();
        for section in &sections {
            self.apply(&manifest, *section, engine)?;
        }
        tracing::debug!("Applied {} sections from {}", sections.len(), self.source.path());
        Ok(())
    }
}

impl Parser for ManifestParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Manifest
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}
