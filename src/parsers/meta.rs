use indexmap::IndexMap;
use serde_json::Value;

use crate::engine::DynEngine;
use crate::task::{Plan, Step};

use super::{JsonSource, ParseContext, ParseError, Parser, ParserKind};

/// `info.json`: a flat object copied into the engine's metadata.
///
/// Non-string values are stored in their JSON form.
pub struct MetaDataParser {
    source: JsonSource<IndexMap<String, Value>>,
}

impl MetaDataParser {
    pub fn new(path: &str, context: ParseContext) -> Self {
        Self {
            source: JsonSource::new(path, context),
        }
    }
}

impl Plan for MetaDataParser {
    type Error = ParseError;

    fn plan(&mut self) -> Result<usize, ParseError> {
        Ok(JsonSource::<IndexMap<String, Value>>::STEPS + 1)
    }
}

impl Step<DynEngine> for MetaDataParser {
    fn step(&mut self, index: usize, engine: &mut DynEngine) -> Result<(), ParseError> {
        if index < JsonSource::<IndexMap<String, Value>>::STEPS {
            return self.source.step(index);
        }

        let entries = self.source.take_value()?;
        for (key, value) in &entries {
            match value {
                Value::String(text) => engine.set_meta(key, text),
                other => engine.set_meta(key, &other.to_string()),
            }
        }
        tracing::debug!("Loaded {} meta entries", entries.len());
        Ok(())
    }
}

impl Parser for MetaDataParser {
    fn kind(&self) -> ParserKind {
        ParserKind::MetaData
    }

    fn path(&self) -> &str {
        self.source.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::parsers::fixtures::{context, run};

    #[test]
    fn test_meta_values_are_stringified() {
        let json = br#"{"name": "Demo", "version": 2, "public": true}"#;
        let ctx = context(vec![("/Game/info.json", json.to_vec())]);
        let mut engine = MemoryEngine::new();

        run(MetaDataParser::new("/Game/info.json", ctx), &mut engine).unwrap();

        assert_eq!(engine.meta["name"], "Demo");
        assert_eq!(engine.meta["version"], "2");
        assert_eq!(engine.meta["public"], "true");
    }

    #[test]
    fn test_meta_must_be_an_object() {
        let ctx = context(vec![("/Game/info.json", b"[1, 2]".to_vec())]);
        let mut engine = MemoryEngine::new();
        let err = run(MetaDataParser::new("/Game/info.json", ctx), &mut engine).unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }));
    }
}
