//! Min/max waveform overviews for display.

use serde::{Deserialize, Serialize};

use crate::buffer::PcmBuffer;

/// One display column, amplitudes mapped from [-1, 1] to 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakColumn {
    pub min: u8,
    pub max: u8,
}

/// (min, max) of the mono mix per block of `samples_per_pixel` frames.
///
/// The last block is padded with zeros, so its range always includes 0.
pub fn waveform_peaks(pcm: &PcmBuffer, samples_per_pixel: usize) -> Vec<(f32, f32)> {
    let spp = samples_per_pixel.max(1);
    let mono: Vec<f32> = pcm.mono().collect();

    mono.chunks(spp)
        .map(|block| {
            let (mut min, mut max) = block
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), &s| (lo.min(s), hi.max(s)));
            if block.len() < spp {
                min = min.min(0.0);
                max = max.max(0.0);
            }
            (min, max)
        })
        .collect()
}

/// About `columns` peak columns covering the whole buffer.
pub fn peak_columns(pcm: &PcmBuffer, columns: usize) -> Vec<PeakColumn> {
    if columns == 0 {
        return Vec::new();
    }
    let spp = pcm.frame_count().div_ceil(columns).max(1);
    waveform_peaks(pcm, spp)
        .into_iter()
        .map(|(min, max)| PeakColumn {
            min: encode(min),
            max: encode(max),
        })
        .collect()
}

fn encode(value: f32) -> u8 {
    (((value.clamp(-1.0, 1.0) + 1.0) * 0.5) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(values: &[f32]) -> PcmBuffer {
        let frames: Vec<[f32; 2]> = values.iter().map(|&v| [v, v]).collect();
        PcmBuffer::from_frames(&frames).unwrap()
    }

    #[test]
    fn test_waveform_peaks_blocks() {
        let peaks = waveform_peaks(&pcm(&[0.5, -0.25, 0.1, 0.2]), 2);
        assert_eq!(peaks, vec![(-0.25, 0.5), (0.1, 0.2)]);
    }

    #[test]
    fn test_waveform_peaks_pads_last_block() {
        let peaks = waveform_peaks(&pcm(&[0.5, 0.6, 0.7]), 2);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[1], (0.0, 0.7));
    }

    #[test]
    fn test_peak_columns_encoding() {
        let columns = peak_columns(&pcm(&[-1.0, 1.0, 0.0, 0.0]), 2);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0], PeakColumn { min: 0, max: 255 });
        assert_eq!(columns[1], PeakColumn { min: 128, max: 128 });
    }

    #[test]
    fn test_peak_columns_count() {
        let values = vec![0.1f32; 1000];
        assert_eq!(peak_columns(&pcm(&values), 100).len(), 100);
        assert_eq!(peak_columns(&pcm(&values), 300).len(), 250);
        assert!(peak_columns(&pcm(&values), 0).is_empty());
    }
}
