use std::path::Path;

use chrono::Duration;
use lector_core::anchor::AnchorConfig;
use narrative::ExtractionConfig;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Tables read from the TOML settings file. Every table and key is
/// optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extraction: ExtractionConfig,
    pub anchor: AnchorConfig,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Seconds a consumed selection can still be reused for anchoring.
    pub selection_max_age_secs: i64,
    /// Seconds the last opened document stays the implicit target.
    pub target_ttl_secs: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            selection_max_age_secs: 8,
            target_ttl_secs: 30,
        }
    }
}

impl SessionSettings {
    pub fn selection_max_age(&self) -> Duration {
        Duration::seconds(self.selection_max_age_secs)
    }

    pub fn target_ttl(&self) -> Duration {
        Duration::seconds(self.target_ttl_secs)
    }
}

impl Settings {
    /// Load settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| f!("Failed to read config file {}", path.display()))?;
        let settings = Self::parse(&raw)?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| eyre!(Error::Config(e.to_string())))
    }
}
