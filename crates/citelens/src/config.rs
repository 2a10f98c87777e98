use std::path::Path;
use std::time::Duration;

use citelens_core::{OverlayTransform, SegmentConfig, SnippetSource};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// How many citations to draw from an opened document, and from which level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub count: usize,
    pub source: SnippetSource,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            count: 5,
            source: SnippetSource::Blocks,
        }
    }
}

/// Everything the binary can be told through `--config`.
///
/// ```toml
/// debounce_ms = 250
///
/// [sampling]
/// count = 8
/// source = "lines"
///
/// [overlay]
/// scale = 2.0
/// offset = 8.0
///
/// [segment]
/// block_tolerance = 25.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub segment: SegmentConfig,
    pub overlay: OverlayTransform,
    pub sampling: SamplingConfig,
    pub debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            overlay: OverlayTransform::default(),
            sampling: SamplingConfig::default(),
            debounce_ms: 250,
        }
    }
}

impl AppConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| eyre!("Invalid configuration: {e}"))
    }

    /// Defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| f!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&raw)?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }
}
