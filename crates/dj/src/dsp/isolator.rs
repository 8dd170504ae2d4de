//! DJ-style 3-band isolator EQ.
//!
//! Frequency bands:
//! - LOW: below `low_cut_hz` (LR4 low-pass)
//! - MID: `low_cut_hz` to `high_cut_hz` (LR4 high-pass then LR4 low-pass)
//! - HIGH: above `high_cut_hz` (LR4 high-pass)
//!
//! Each band owns its own filter chain. Sharing a biquad between bands would
//! mix their state and smear the band split.

use serde::{Deserialize, Serialize};

use super::{db_to_linear, Lr4Filter};
use crate::error::{EngineError, Result};

/// Highest usable crossover as a fraction of the sample rate.
const MAX_CUTOFF_RATIO: f64 = 0.45;

/// Per-band gains in decibels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandGains {
    pub low_db: f64,
    pub mid_db: f64,
    pub high_db: f64,
}

/// 3-band isolator with persistent per-band filter state.
#[derive(Debug, Clone)]
pub struct EqIsolator {
    sample_rate: u32,
    low_cut_hz: f64,
    high_cut_hz: f64,
    gains: BandGains,
    low_lp: Lr4Filter,
    mid_hp: Lr4Filter,
    mid_lp: Lr4Filter,
    high_hp: Lr4Filter,
}

/// The four filter chains designed for one (rate, crossovers) point.
struct Chains {
    low_lp: Lr4Filter,
    mid_hp: Lr4Filter,
    mid_lp: Lr4Filter,
    high_hp: Lr4Filter,
}

impl EqIsolator {
    /// Create an isolator. Requires `0 < low_cut_hz < high_cut_hz < 0.45 * sample_rate`.
    pub fn new(sample_rate: u32, low_cut_hz: f64, high_cut_hz: f64) -> Result<Self> {
        let chains = design(sample_rate, low_cut_hz, high_cut_hz)?;
        Ok(Self {
            sample_rate,
            low_cut_hz,
            high_cut_hz,
            gains: BandGains::default(),
            low_lp: chains.low_lp,
            mid_hp: chains.mid_hp,
            mid_lp: chains.mid_lp,
            high_hp: chains.high_hp,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Crossover frequencies as `(low_cut_hz, high_cut_hz)`.
    pub fn crossovers(&self) -> (f64, f64) {
        (self.low_cut_hz, self.high_cut_hz)
    }

    pub fn gains_db(&self) -> BandGains {
        self.gains
    }

    /// Store per-band gains. Applied on the next [`EqIsolator::process`].
    pub fn set_gains_db(&mut self, low_db: f64, mid_db: f64, high_db: f64) {
        self.gains = BandGains {
            low_db,
            mid_db,
            high_db,
        };
    }

    /// Redesign every chain for a new sample rate. Filter state is discarded.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        let chains = design(sample_rate, self.low_cut_hz, self.high_cut_hz)?;
        self.sample_rate = sample_rate;
        self.install(chains);
        Ok(())
    }

    /// Move the crossovers and redesign every chain. Filter state is discarded.
    pub fn set_crossovers(&mut self, low_cut_hz: f64, high_cut_hz: f64) -> Result<()> {
        let chains = design(self.sample_rate, low_cut_hz, high_cut_hz)?;
        self.low_cut_hz = low_cut_hz;
        self.high_cut_hz = high_cut_hz;
        self.install(chains);
        Ok(())
    }

    /// Split an interleaved stereo block into bands and recombine in place.
    ///
    /// No clipping happens here; the mixer clips after summing the decks.
    pub fn process(&mut self, block: &mut [f32]) {
        if block.is_empty() {
            return;
        }

        let low_gain = db_to_linear(self.gains.low_db);
        let mid_gain = db_to_linear(self.gains.mid_db);
        let high_gain = db_to_linear(self.gains.high_db);

        for frame in block.chunks_exact_mut(2) {
            for (channel, sample) in frame.iter_mut().enumerate() {
                let x = *sample as f64;
                let low = self.low_lp.process_sample(x, channel);
                let mid = self
                    .mid_lp
                    .process_sample(self.mid_hp.process_sample(x, channel), channel);
                let high = self.high_hp.process_sample(x, channel);
                *sample = (low_gain * low + mid_gain * mid + high_gain * high) as f32;
            }
        }
    }

    fn install(&mut self, chains: Chains) {
        self.low_lp = chains.low_lp;
        self.mid_hp = chains.mid_hp;
        self.mid_lp = chains.mid_lp;
        self.high_hp = chains.high_hp;
    }
}

/// Check `0 < low < high < 0.45 * sample_rate`.
pub(crate) fn validate_crossovers(sample_rate: u32, low_cut_hz: f64, high_cut_hz: f64) -> Result<()> {
    let limit = sample_rate as f64 * MAX_CUTOFF_RATIO;
    if low_cut_hz > 0.0 && low_cut_hz < high_cut_hz && high_cut_hz < limit {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "crossovers must satisfy 0 < low ({low_cut_hz} Hz) < high ({high_cut_hz} Hz) < {limit} Hz"
        )))
    }
}

fn design(sample_rate: u32, low_cut_hz: f64, high_cut_hz: f64) -> Result<Chains> {
    validate_crossovers(sample_rate, low_cut_hz, high_cut_hz)?;
    Ok(Chains {
        low_lp: Lr4Filter::lowpass(low_cut_hz, sample_rate)?,
        mid_hp: Lr4Filter::highpass(low_cut_hz, sample_rate)?,
        mid_lp: Lr4Filter::lowpass(high_cut_hz, sample_rate)?,
        high_hp: Lr4Filter::highpass(high_cut_hz, sample_rate)?,
    })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    const SAMPLE_RATE: u32 = 48000;

    /// One second of 100 Hz + 1 kHz + 8 kHz, one tone per band.
    fn multi_tone() -> Vec<f32> {
        (0..SAMPLE_RATE as usize)
            .flat_map(|i| {
                let t = i as f64 / SAMPLE_RATE as f64;
                let s = 0.3 * (2.0 * PI * 100.0 * t).sin()
                    + 0.3 * (2.0 * PI * 1000.0 * t).sin()
                    + 0.3 * (2.0 * PI * 8000.0 * t).sin();
                [s as f32, (s * 0.5) as f32]
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f64 {
        (samples.iter().map(|s| (*s as f64).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
    }

    /// Run `input` through the isolator in 256-frame callback-sized blocks.
    fn process_in_blocks(eq: &mut EqIsolator, input: &[f32]) -> Vec<f32> {
        let mut output = input.to_vec();
        for block in output.chunks_mut(256 * 2) {
            eq.process(block);
        }
        output
    }

    #[test]
    fn test_crossover_validation() {
        assert!(EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).is_ok());
        for (low, high) in [
            (2500.0, 250.0),
            (1000.0, 1000.0),
            (0.0, 2500.0),
            (-10.0, 2500.0),
            (250.0, 21600.0),
            (250.0, 30000.0),
        ] {
            let result = EqIsolator::new(SAMPLE_RATE, low, high);
            assert!(
                matches!(result, Err(EngineError::InvalidConfig(_))),
                "({low}, {high}) should be rejected"
            );
        }
    }

    #[test]
    fn test_unity_gains_reconstruct() {
        let input = multi_tone();
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        let output = process_in_blocks(&mut eq, &input);

        // LR4 bands sum to an all-pass: the phase moves but energy is kept.
        let half = input.len() / 2;
        let ratio = rms(&output[half..]) / rms(&input[half..]);
        assert!((ratio - 1.0).abs() < 0.02, "ratio {ratio}");
    }

    #[test]
    fn test_uniform_boost() {
        let input = multi_tone();
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        eq.set_gains_db(6.0, 6.0, 6.0);
        let output = process_in_blocks(&mut eq, &input);

        let half = input.len() / 2;
        let ratio = rms(&output[half..]) / rms(&input[half..]);
        assert!((ratio - db_to_linear(6.0)).abs() < 0.05, "ratio {ratio}");
    }

    #[test]
    fn test_full_kill_is_silent() {
        let input = multi_tone();
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        eq.set_gains_db(-80.0, -96.0, f64::NEG_INFINITY);
        let output = process_in_blocks(&mut eq, &input);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_killed_band_contributes_nothing() {
        let input = multi_tone();
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        eq.set_gains_db(-80.0, 0.0, 0.0);
        let output = process_in_blocks(&mut eq, &input);

        // Rebuild mid + high by hand; the low band must add exactly nothing.
        let mut mid_hp = Lr4Filter::highpass(250.0, SAMPLE_RATE).unwrap();
        let mut mid_lp = Lr4Filter::lowpass(2500.0, SAMPLE_RATE).unwrap();
        let mut high_hp = Lr4Filter::highpass(2500.0, SAMPLE_RATE).unwrap();
        for (i, (x, y)) in input.iter().zip(output.iter()).enumerate() {
            let channel = i % 2;
            let x = *x as f64;
            let mid = mid_lp.process_sample(mid_hp.process_sample(x, channel), channel);
            let high = high_hp.process_sample(x, channel);
            assert_eq!(*y, (mid + high) as f32, "sample {i}");
        }
    }

    #[test]
    fn test_low_kill_removes_bass() {
        let bass: Vec<f32> = (0..SAMPLE_RATE as usize)
            .flat_map(|i| {
                let s = 0.5 * (2.0 * PI * 40.0 * i as f64 / SAMPLE_RATE as f64).sin();
                [s as f32, s as f32]
            })
            .collect();
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        eq.set_gains_db(-80.0, 0.0, 0.0);
        let output = process_in_blocks(&mut eq, &bass);

        let half = bass.len() / 2;
        assert!(rms(&output[half..]) < rms(&bass[half..]) * 0.01);
    }

    #[test]
    fn test_empty_block_untouched() {
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        let mut block: Vec<f32> = Vec::new();
        eq.process(&mut block);
        assert!(block.is_empty());
    }

    #[test]
    fn test_set_crossovers() {
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        eq.set_crossovers(300.0, 4000.0).unwrap();
        assert_eq!(eq.crossovers(), (300.0, 4000.0));

        // Rejected changes leave the design point untouched.
        assert!(eq.set_crossovers(5000.0, 4000.0).is_err());
        assert_eq!(eq.crossovers(), (300.0, 4000.0));
    }

    #[test]
    fn test_set_sample_rate() {
        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        eq.set_sample_rate(44100).unwrap();
        assert_eq!(eq.sample_rate(), 44100);

        // 0.45 * 4000 Hz is below the 2.5 kHz crossover.
        assert!(eq.set_sample_rate(4000).is_err());
        assert_eq!(eq.sample_rate(), 44100);
    }

    #[test]
    fn test_rebuild_resets_state() {
        let input = multi_tone();
        let mut fresh = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        let expected = process_in_blocks(&mut fresh, &input[..2048]);

        let mut eq = EqIsolator::new(SAMPLE_RATE, 250.0, 2500.0).unwrap();
        process_in_blocks(&mut eq, &input);
        eq.set_sample_rate(SAMPLE_RATE).unwrap();
        assert_eq!(process_in_blocks(&mut eq, &input[..2048]), expected);
    }
}
