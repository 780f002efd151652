//! Engine registry
//!
//! Maps an engine identifier to a constructor. An identifier may carry an
//! option after a colon (`stub:empty`); the part before the colon selects the
//! constructor.

use std::collections::BTreeMap;

use contracts::{ContractError, InferenceConfig, InferenceEngine};
use tracing::info;

use crate::stub::{StubEngine, StubMode};

/// Builds an engine from the inference config and the identifier option
pub type EngineConstructor =
    fn(&InferenceConfig, &str) -> Result<Box<dyn InferenceEngine>, ContractError>;

pub struct EngineRegistry {
    constructors: BTreeMap<String, EngineConstructor>,
}

impl EngineRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with the built-in engines
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("stub", build_stub);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, constructor: EngineConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered engine names, sorted
    pub fn list(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Construct the engine named by `config.engine`.
    ///
    /// # Errors
    /// `ConfigValidation` for an unknown engine or option, or whatever the
    /// constructor reports.
    pub fn create(&self, config: &InferenceConfig) -> Result<Box<dyn InferenceEngine>, ContractError> {
        let (name, option) = split_engine_id(&config.engine);
        let constructor = self.constructors.get(name).ok_or_else(|| {
            ContractError::config_validation(
                "inference.engine",
                format!("unknown engine '{name}', available: {:?}", self.list()),
            )
        })?;

        let engine = constructor(config, option)?;
        info!(
            engine = %engine.name(),
            confidence_threshold = config.confidence_threshold,
            "Inference engine created"
        );
        Ok(engine)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn split_engine_id(id: &str) -> (&str, &str) {
    let id = id.trim();
    id.split_once(':').unwrap_or((id, ""))
}

fn build_stub(
    config: &InferenceConfig,
    option: &str,
) -> Result<Box<dyn InferenceEngine>, ContractError> {
    let mode: StubMode = option.parse()?;
    Ok(Box::new(StubEngine::new(mode, config.confidence_threshold)))
}

/// Construct an engine from the built-in registry
pub fn create_engine(config: &InferenceConfig) -> Result<Box<dyn InferenceEngine>, ContractError> {
    EngineRegistry::with_builtin().create(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ImageData, ImageFormat};

    fn config(engine: &str) -> InferenceConfig {
        InferenceConfig {
            engine: engine.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_split_engine_id() {
        assert_eq!(split_engine_id("stub"), ("stub", ""));
        assert_eq!(split_engine_id("stub:empty"), ("stub", "empty"));
    }

    #[test]
    fn test_create_stub_variants() {
        let image = ImageData::new(1, 1, ImageFormat::Luma8, vec![0u8]);

        let mut normal = create_engine(&config("stub")).unwrap();
        assert_eq!(normal.name(), "stub");
        assert_eq!(normal.predict(&image).unwrap().detections.len(), 3);

        let mut empty = create_engine(&config("stub:empty")).unwrap();
        assert!(empty.predict(&image).unwrap().detections.is_empty());

        let mut failing = create_engine(&config("stub:error")).unwrap();
        assert!(failing.predict(&image).is_err());
    }

    #[test]
    fn test_unknown_engine_is_configuration_error() {
        let err = create_engine(&config("tensorrt")).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("tensorrt"));
    }

    #[test]
    fn test_custom_registration() {
        fn build_quiet(
            config: &InferenceConfig,
            _: &str,
        ) -> Result<Box<dyn InferenceEngine>, ContractError> {
            Ok(Box::new(StubEngine::new(StubMode::Empty, config.confidence_threshold)))
        }

        let mut registry = EngineRegistry::new();
        assert!(registry.list().is_empty());
        registry.register("quiet", build_quiet);
        assert!(registry.contains("quiet"));
        assert!(registry.create(&config("quiet")).is_ok());
        assert!(registry.create(&config("stub")).is_err());
    }
}
