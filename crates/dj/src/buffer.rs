//! Decoded PCM held in memory by a deck.

use crate::error::{EngineError, Result};

/// Channel count of every buffer and of the engine output.
pub const CHANNELS: usize = 2;

/// Interleaved stereo f32 samples, immutable once constructed.
///
/// A buffer is moved into the deck it is loaded on and dropped when the next
/// load replaces it; it is never shared between decks.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<f32>,
}

impl PcmBuffer {
    /// Wrap interleaved samples with the given channel count.
    ///
    /// Fails unless the data is non-empty, two-channel, made of whole frames
    /// and entirely finite.
    pub fn from_interleaved(samples: Vec<f32>, channels: usize) -> Result<Self> {
        if channels != CHANNELS {
            return Err(EngineError::InvalidConfig(format!(
                "PCM must have {CHANNELS} channels, got {channels}"
            )));
        }
        if samples.is_empty() {
            return Err(EngineError::InvalidConfig(
                "PCM buffer contains no frames".to_string(),
            ));
        }
        if samples.len() % CHANNELS != 0 {
            return Err(EngineError::InvalidConfig(format!(
                "PCM length {} is not a whole number of stereo frames",
                samples.len()
            )));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "PCM sample {index} is not finite"
            )));
        }
        Ok(Self { samples })
    }

    /// Build a buffer from `[left, right]` frames.
    pub fn from_frames(frames: &[[f32; 2]]) -> Result<Self> {
        Self::from_interleaved(frames.iter().flatten().copied().collect(), CHANNELS)
    }

    /// Number of stereo frames.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    /// The interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Interleaved samples for frames `start..start + frames`, clipped to the end.
    pub fn frames(&self, start: usize, frames: usize) -> &[f32] {
        let begin = (start * CHANNELS).min(self.samples.len());
        let end = (start.saturating_add(frames) * CHANNELS).min(self.samples.len());
        &self.samples[begin..end]
    }

    /// Mono mixdown, one value per frame.
    pub fn mono(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples
            .chunks_exact(CHANNELS)
            .map(|frame| (frame[0] + frame[1]) * 0.5)
    }
}
