use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the scheduler, the voices and the offline renderer.
///
/// Every field has a default so a partial TOML table is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate used by the offline renderer. The live engine uses the device rate.
    pub sample_rate: u32,
    pub tick_interval_ms: u64,
    pub lookahead_ms: u64,
    pub start_offset_ms: u64,
    /// Upper bound on the audible length of any single voice.
    pub max_voice_seconds: f32,
    pub master_gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            tick_interval_ms: 25,
            lookahead_ms: 100,
            start_offset_ms: 100,
            max_voice_seconds: 2.0,
            master_gain: 0.8,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }

    pub fn start_offset(&self) -> f64 {
        self.start_offset_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(25));
        assert!((config.lookahead() - 0.1).abs() < 1e-12);
        assert!((config.start_offset() - 0.1).abs() < 1e-12);
        assert_eq!(config.sample_rate, 44_100);
    }

    #[test]
    fn zero_tick_interval_is_raised() {
        let config = EngineConfig {
            tick_interval_ms: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }
}
