use metaspace_stream::{LoadMode, StreamConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SceneError;
use crate::remap::ReferencePolicy;

/// Scene loading configuration. Every field has a default, so an empty YAML
/// document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// `editor` loads every entity immediately, ignoring dynamic-load markers.
    pub mode: LoadMode,
    /// Entities a staged full load materializes per engine tick.
    pub entities_per_tick: usize,
    pub reference_policy: ReferencePolicy,
    pub stream: StreamConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            mode: LoadMode::Runtime,
            entities_per_tick: 64,
            reference_policy: ReferencePolicy::AnyString,
            stream: StreamConfig::default(),
        }
    }
}

impl SceneConfig {
    pub fn editor() -> Self {
        Self {
            mode: LoadMode::Editor,
            ..Self::default()
        }
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, SceneError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "reading scene config");
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        if self.entities_per_tick == 0 {
            return Err(SceneError::InvalidConfig(
                "entities_per_tick must be at least 1".into(),
            ));
        }
        if !self.stream.cell_size.is_finite() || self.stream.cell_size <= 0.0 {
            return Err(SceneError::InvalidConfig(format!(
                "stream.cell_size must be positive, got {}",
                self.stream.cell_size
            )));
        }
        Ok(())
    }
}
