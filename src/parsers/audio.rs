use crate::engine::{DynEngine, SoundSamples};
use crate::io::file_stem;
use crate::task::{Plan, Step};

use super::{ParseContext, ParseError, Parser, ParserKind};

/// `*.wav`: the raw file goes into the sound bank slot named after the file.
///
/// An existing slot with the same name is replaced, otherwise a new slot is appended.
pub struct WaveParser {
    path: String,
    context: ParseContext,
    bytes: Option<Vec<u8>>,
}

impl WaveParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            path: path.to_string(),
            context,
            bytes: None,
        }
    }
}

impl Plan for WaveParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(2)
    }
}

impl Step<DynEngine> for WaveParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        match index {
            0 => {
                self.bytes = Some(self.context.read(&self.path)?);
                Ok(())
            }
            1 => {
                let bytes = self.bytes.take().ok_or_else(|| ParseError::Invalid {
                    path: self.path.clone(),
                    reason: "file was not read".to_string(),
                })?;
                let name = file_stem(&self.path);
                let slot = engine
                    .sound_slot(name)
                    .unwrap_or_else(|| engine.sound_count());
                tracing::debug!("Sound {} ({} bytes) -> slot {}", name, bytes.len(), slot);
                engine.set_sound_bank(slot, name, SoundSamples::Wave(bytes));
                Ok(())
            }
            step => Err(ParseError::UnplannedStep {
                path: self.path.clone(),
                step,
            }),
        }
    }
}

impl Parser for WaveParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Wave
    }

    fn path(&self) -> &str {
        &self.path
    }
}
