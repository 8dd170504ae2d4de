//! Two-channel mixer: channel faders and an equal-power crossfader.

use std::f32::consts::FRAC_PI_2;

use serde::Serialize;

use crate::deck::DeckId;
use crate::dsp::clamp_unit;

/// Mixer parameters, read together by the render callback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MixerState {
    /// 0.0 = full A, 1.0 = full B.
    crossfader: f32,
    /// Channel fader per deck, indexed by [`DeckId::index`].
    channel_gain: [f32; 2],
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            crossfader: 0.5,
            channel_gain: [1.0, 1.0],
        }
    }
}

impl MixerState {
    pub fn crossfader(&self) -> f32 {
        self.crossfader
    }

    /// Set the crossfader, clamped to `[0, 1]`.
    pub fn set_crossfader(&mut self, position: f32) {
        self.crossfader = clamp_unit(position);
    }

    pub fn channel_gain(&self, deck: DeckId) -> f32 {
        self.channel_gain[deck.index()]
    }

    /// Set a channel fader, clamped to `[0, 1]`.
    pub fn set_channel_gain(&mut self, deck: DeckId, gain: f32) {
        self.channel_gain[deck.index()] = clamp_unit(gain);
    }

    /// Effective `(A, B)` weights: channel fader times crossfade weight.
    pub fn deck_weights(&self) -> (f32, f32) {
        let (xf_a, xf_b) = equal_power_weights(self.crossfader);
        (
            self.channel_gain[DeckId::A.index()] * xf_a,
            self.channel_gain[DeckId::B.index()] * xf_b,
        )
    }
}

/// Equal-power crossfade weights for a position in `[0, 1]`.
///
/// `cos²θ + sin²θ = 1` keeps perceived loudness constant through the fade.
pub fn equal_power_weights(position: f32) -> (f32, f32) {
    let theta = clamp_unit(position) * FRAC_PI_2;
    (theta.cos(), theta.sin())
}
