//! Tempo estimation for display overlays.
//!
//! Uses SoundTouch's BPMDetect for the tempo and an FFT spectral-flux onset
//! envelope to place the beat grid. The estimate is informational only:
//! nothing in the render path reads it.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use soundtouch::BPMDetect;

use crate::buffer::PcmBuffer;

/// BPM reported when a signal is too short or too quiet to analyze.
pub const DEFAULT_BPM: f64 = 120.0;

/// Fewest mono samples BPMDetect is given.
const MIN_SAMPLES: usize = 4096;

/// SoundTouch reports no confidence; a successful detection gets this value.
const DETECTED_CONFIDENCE: f32 = 0.9;

/// Beat grid produced by a [`TempoAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Detected BPM.
    pub bpm: f64,
    /// Analysis confidence (0.0-1.0).
    pub confidence: f32,
    /// Beat positions as sample-frame indices, ascending.
    pub beats: Vec<usize>,
}

impl BeatGrid {
    fn fallback() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            confidence: 0.0,
            beats: Vec::new(),
        }
    }

    /// Get the beat interval in seconds.
    pub fn beat_interval_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Find the beat closest to `frame`.
    pub fn nearest_beat(&self, frame: usize) -> Option<usize> {
        let idx = self.beats.partition_point(|&b| b < frame);
        let after = self.beats.get(idx).copied();
        let before = idx.checked_sub(1).map(|i| self.beats[i]);
        match (before, after) {
            (Some(b), Some(a)) => Some(if frame - b <= a - frame { b } else { a }),
            (b, a) => b.or(a),
        }
    }
}

/// Produces a tempo estimate from decoded PCM.
pub trait TempoAnalyzer {
    fn analyze(&self, pcm: &PcmBuffer, sample_rate: u32) -> BeatGrid;
}

/// SoundTouch BPM detection plus a spectral-flux beat grid.
#[derive(Debug, Clone)]
pub struct SoundTouchTempoAnalyzer {
    /// FFT window size for the onset envelope.
    pub fft_size: usize,
    /// Hop size between FFT windows.
    pub hop_size: usize,
    /// Minimum BPM reported; slower detections are doubled into range.
    pub min_bpm: f64,
    /// Maximum BPM reported; faster detections are halved into range.
    pub max_bpm: f64,
}

impl Default for SoundTouchTempoAnalyzer {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
        }
    }
}

impl TempoAnalyzer for SoundTouchTempoAnalyzer {
    fn analyze(&self, pcm: &PcmBuffer, sample_rate: u32) -> BeatGrid {
        let mono: Vec<f32> = pcm.mono().collect();
        if mono.len() < MIN_SAMPLES || sample_rate == 0 {
            return BeatGrid::fallback();
        }

        let onsets = self.onset_envelope(&mono);
        if !onsets.iter().any(|&flux| flux > 0.0) {
            log::debug!("Tempo analysis: no onsets, using {} BPM", DEFAULT_BPM);
            return BeatGrid::fallback();
        }

        let Some(detected) = detect_bpm(&mono, sample_rate) else {
            log::debug!("Tempo analysis: BPMDetect found no tempo, using {} BPM", DEFAULT_BPM);
            return BeatGrid::fallback();
        };
        let bpm = fold_into_range(detected, self.min_bpm, self.max_bpm);

        let beats = match self.first_onset(&onsets) {
            Some(first) => beat_positions(first, bpm, sample_rate, pcm.frame_count()),
            None => Vec::new(),
        };

        log::debug!(
            "Tempo analysis: {:.2} BPM (detected {:.2}, {} beats)",
            bpm,
            detected,
            beats.len()
        );

        BeatGrid {
            bpm,
            confidence: DETECTED_CONFIDENCE,
            beats,
        }
    }
}

impl SoundTouchTempoAnalyzer {
    /// Half-wave rectified spectral flux per hop over Hann-windowed frames.
    fn onset_envelope(&self, samples: &[f32]) -> Vec<f32> {
        let fft_size = self.fft_size.max(2);
        let hop = self.hop_size.max(1);
        let bins = fft_size / 2 + 1;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (fft_size - 1) as f32).cos())
            })
            .collect();

        let mut envelope = Vec::new();
        let mut prev_spectrum = vec![0.0f32; bins];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];

        for start in (0..samples.len().saturating_sub(fft_size)).step_by(hop) {
            for ((slot, sample), w) in buffer
                .iter_mut()
                .zip(&samples[start..start + fft_size])
                .zip(&window)
            {
                *slot = Complex::new(sample * w, 0.0);
            }

            fft.process(&mut buffer);

            let mut flux = 0.0f32;
            for (c, prev) in buffer[..bins].iter().zip(prev_spectrum.iter_mut()) {
                let magnitude = c.norm();
                flux += (magnitude - *prev).max(0.0);
                *prev = magnitude;
            }
            envelope.push(flux);
        }

        envelope
    }

    /// Frame of the first onset above mean + 1.5 standard deviations,
    /// placed at the centre of its FFT window.
    fn first_onset(&self, envelope: &[f32]) -> Option<usize> {
        if envelope.is_empty() {
            return None;
        }

        let n = envelope.len() as f32;
        let mean = envelope.iter().sum::<f32>() / n;
        let variance = envelope.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        let threshold = mean + 1.5 * variance.sqrt();

        envelope
            .iter()
            .position(|&flux| flux > threshold)
            .map(|i| i * self.hop_size.max(1) + self.fft_size.max(2) / 2)
    }
}

/// Run SoundTouch's BPMDetect over mono samples. `None` when it finds nothing.
fn detect_bpm(samples: &[f32], sample_rate: u32) -> Option<f64> {
    let mut detector = BPMDetect::new(1, sample_rate);
    detector.input_samples(samples);
    let bpm = detector.get_bpm() as f64;

    (bpm.is_finite() && bpm > 0.0).then_some(bpm)
}

/// Double or halve `bpm` until it lies in `[min_bpm, max_bpm]`, when an
/// octave step can get it there.
fn fold_into_range(mut bpm: f64, min_bpm: f64, max_bpm: f64) -> f64 {
    while bpm < min_bpm && bpm * 2.0 <= max_bpm {
        bpm *= 2.0;
    }
    while bpm > max_bpm && bpm / 2.0 >= min_bpm {
        bpm /= 2.0;
    }
    bpm
}

/// Beat frames starting at `first`, stepping by the beat period.
fn beat_positions(first: usize, bpm: f64, sample_rate: u32, total_frames: usize) -> Vec<usize> {
    let period = 60.0 * sample_rate as f64 / bpm;
    let mut beats = Vec::new();
    let mut position = first as f64;
    while position < total_frames as f64 {
        beats.push(position as usize);
        position += period;
    }
    beats
}
