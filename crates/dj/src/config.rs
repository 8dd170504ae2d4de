//! Engine configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::validate_crossovers;
use crate::error::{EngineError, Result};

/// Engine configuration.
///
/// The sample rate and channel count are fixed for the lifetime of an engine;
/// decks only accept PCM already at `sample_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Audio device name (empty for default). Matched as a substring.
    pub device_name: String,
    /// Operating sample rate in Hz.
    pub sample_rate: u32,
    /// Requested callback block size in frames.
    pub block_size: u32,
    /// Low/mid crossover of every deck's isolator.
    pub low_cut_hz: f64,
    /// Mid/high crossover of every deck's isolator.
    pub high_cut_hz: f64,
    /// Slowest allowed playback rate.
    pub min_rate: f64,
    /// Fastest allowed playback rate.
    pub max_rate: f64,
    /// Number of hot cue slots per deck (addressed 1..=slots).
    pub hot_cue_slots: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            sample_rate: 48000,
            // ~5.3 ms per callback at 48 kHz
            block_size: 256,
            low_cut_hz: 250.0,
            high_cut_hz: 2500.0,
            min_rate: 0.5,
            max_rate: 2.0,
            hot_cue_slots: 8,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        log::info!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Check every value the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidConfig(
                "sample rate must be non-zero".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(EngineError::InvalidConfig(
                "block size must be non-zero".to_string(),
            ));
        }
        validate_crossovers(self.sample_rate, self.low_cut_hz, self.high_cut_hz)?;
        if !(self.min_rate > 0.0 && self.min_rate <= 1.0 && self.max_rate >= 1.0)
            || !self.max_rate.is_finite()
        {
            return Err(EngineError::InvalidConfig(format!(
                "rate bounds must satisfy 0 < min ({}) <= 1 <= max ({})",
                self.min_rate, self.max_rate
            )));
        }
        if self.hot_cue_slots == 0 {
            return Err(EngineError::InvalidConfig(
                "at least one hot cue slot is required".to_string(),
            ));
        }
        Ok(())
    }
}
