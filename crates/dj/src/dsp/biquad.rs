//! Second-order IIR section in transposed direct form II.

use crate::error::{EngineError, Result};

/// Number of interleaved channels a [`Biquad`] keeps state for.
const CHANNELS: usize = 2;

/// A single biquad stage with independent state per stereo channel.
///
/// Coefficients are normalized by `a0` at construction. State persists across
/// [`Biquad::process`] calls so blocks of any size can be streamed through.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    /// `[z1, z2]` for each channel.
    state: [[f64; 2]; CHANNELS],
}

impl Biquad {
    /// Create a biquad from raw transfer-function coefficients.
    ///
    /// Fails with [`EngineError::InvalidConfig`] if `a0` is zero.
    pub fn new(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Result<Self> {
        if a0 == 0.0 {
            return Err(EngineError::InvalidConfig(
                "biquad a0 coefficient must not be zero".to_string(),
            ));
        }
        Ok(Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            state: [[0.0; 2]; CHANNELS],
        })
    }

    /// Filter one sample on the given channel (0 = left, 1 = right).
    #[inline]
    pub fn process_sample(&mut self, x: f64, channel: usize) -> f64 {
        let [z1, z2] = &mut self.state[channel];
        let y = x * self.b0 + *z1;
        *z1 = x * self.b1 + *z2 - self.a1 * y;
        *z2 = x * self.b2 - self.a2 * y;
        y
    }

    /// Filter an interleaved stereo block in place.
    pub fn process(&mut self, block: &mut [f32]) {
        debug_assert!(block.len() % CHANNELS == 0, "block must be whole stereo frames");
        for frame in block.chunks_exact_mut(CHANNELS) {
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = self.process_sample(*sample as f64, channel) as f32;
            }
        }
    }

    /// Zero the filter state, keeping the coefficients.
    pub fn reset(&mut self) {
        self.state = [[0.0; 2]; CHANNELS];
    }
}
