//! Linkwitz-Riley 24 dB/oct low-pass and high-pass filters.
//!
//! Each filter is a second-order Butterworth section (Q = 1/sqrt(2), RBJ audio
//! EQ cookbook) instantiated twice and run in series.

use std::f64::consts::{PI, SQRT_2};

use super::Biquad;
use crate::error::Result;

/// Which side of the crossover a filter passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossoverKind {
    LowPass,
    HighPass,
}

/// Fourth-order (LR4) crossover filter: two matched biquads in cascade.
#[derive(Debug, Clone)]
pub struct Lr4Filter {
    stages: [Biquad; 2],
}

impl Lr4Filter {
    /// Design an LR4 filter at `cutoff_hz`.
    ///
    /// The cutoff is expected to lie strictly between 0 and Nyquist; the
    /// owning [`super::EqIsolator`] validates this before construction.
    pub fn new(kind: CrossoverKind, cutoff_hz: f64, sample_rate: u32) -> Result<Self> {
        let stage = butterworth(kind, cutoff_hz, sample_rate)?;
        Ok(Self {
            stages: [stage.clone(), stage],
        })
    }

    /// LR4 low-pass at `cutoff_hz`.
    pub fn lowpass(cutoff_hz: f64, sample_rate: u32) -> Result<Self> {
        Self::new(CrossoverKind::LowPass, cutoff_hz, sample_rate)
    }

    /// LR4 high-pass at `cutoff_hz`.
    pub fn highpass(cutoff_hz: f64, sample_rate: u32) -> Result<Self> {
        Self::new(CrossoverKind::HighPass, cutoff_hz, sample_rate)
    }

    /// Filter one sample on the given channel through both stages.
    #[inline]
    pub fn process_sample(&mut self, x: f64, channel: usize) -> f64 {
        let first = self.stages[0].process_sample(x, channel);
        self.stages[1].process_sample(first, channel)
    }

    /// Filter an interleaved stereo block in place.
    pub fn process(&mut self, block: &mut [f32]) {
        self.stages[0].process(block);
        self.stages[1].process(block);
    }

    /// Reset both stages.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

/// Second-order Butterworth biquad from the RBJ cookbook.
fn butterworth(kind: CrossoverKind, cutoff_hz: f64, sample_rate: u32) -> Result<Biquad> {
    let q = 1.0 / SQRT_2;
    let w0 = 2.0 * PI * cutoff_hz / sample_rate as f64;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    let (b0, b1, b2) = match kind {
        CrossoverKind::LowPass => ((1.0 - cos_w0) * 0.5, 1.0 - cos_w0, (1.0 - cos_w0) * 0.5),
        CrossoverKind::HighPass => ((1.0 + cos_w0) * 0.5, -(1.0 + cos_w0), (1.0 + cos_w0) * 0.5),
    };

    Biquad::new(b0, b1, b2, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
}
