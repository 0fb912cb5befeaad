use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use squelch_engine::export::ExportConfig;
use squelch_engine::EngineConfig;

/// Contents of the optional `--config` TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub engine: EngineConfig,
    pub export: ExportConfig,
}

impl HostConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, anyhow::Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
