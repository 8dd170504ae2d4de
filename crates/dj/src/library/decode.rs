//! Decode audio files into engine-ready stereo PCM.

use std::fs::File;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::buffer::{PcmBuffer, CHANNELS};

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 4096;

/// Supported audio file extensions.
pub fn supported_extensions() -> &'static [&'static str] {
    &["mp3", "wav", "aiff", "aif", "flac"]
}

/// Check if a file has a supported audio extension.
pub fn is_supported_audio_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| supported_extensions().contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode a file to stereo PCM at `target_rate`.
///
/// Mono sources are duplicated to both channels, sources with more than two
/// channels keep the first two. Returns the buffer and its sample rate, which
/// is always `target_rate`.
pub fn load_audio_to_pcm<P: AsRef<Path>>(
    path: P,
    target_rate: u32,
) -> anyhow::Result<(PcmBuffer, u32)> {
    let path = path.as_ref();
    let (interleaved, source_rate, channels) = decode_interleaved(path)?;
    if interleaved.is_empty() {
        anyhow::bail!("No audio decoded from {:?}", path);
    }

    let [mut left, mut right] = split_stereo(&interleaved, channels);
    if source_rate != target_rate {
        log::info!(
            "Resampling {:?} from {} Hz to {} Hz",
            path,
            source_rate,
            target_rate
        );
        [left, right] = resample([left, right], source_rate, target_rate)?;
    }

    let samples: Vec<f32> = left
        .iter()
        .zip(&right)
        .flat_map(|(l, r)| [clamp_sample(*l), clamp_sample(*r)])
        .collect();
    let buffer = PcmBuffer::from_interleaved(samples, CHANNELS)?;

    log::info!(
        "Decoded {:?}: {} frames @ {} Hz",
        path,
        buffer.frame_count(),
        target_rate
    );
    Ok((buffer, target_rate))
}

/// Decode the first audio track to interleaved f32.
fn decode_interleaved(path: &Path) -> anyhow::Result<(Vec<f32>, u32, usize)> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("No audio track found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow::anyhow!("Unknown sample rate"))?;
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if channels == 0 {
        anyhow::bail!("Unknown channel layout");
    }
    Ok((samples, sample_rate, channels))
}

/// Split interleaved audio into left/right planes.
fn split_stereo(interleaved: &[f32], channels: usize) -> [Vec<f32>; 2] {
    let frames = interleaved.len() / channels;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in interleaved.chunks_exact(channels) {
        left.push(frame[0]);
        // Mono is duplicated, extra channels are dropped.
        right.push(if channels == 1 { frame[0] } else { frame[1] });
    }
    [left, right]
}

/// Sinc-resample planar stereo from `from` Hz to `to` Hz.
fn resample(planes: [Vec<f32>; 2], from: u32, to: u32) -> anyhow::Result<[Vec<f32>; 2]> {
    let ratio = to as f64 / from as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, CHANNELS)?;

    let input_frames = planes[0].len();
    let expected = (input_frames as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out = [
        Vec::with_capacity(expected + delay),
        Vec::with_capacity(expected + delay),
    ];

    let mut pos = 0;
    while pos + RESAMPLE_CHUNK <= input_frames {
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[pos..pos + RESAMPLE_CHUNK]).collect();
        append_planes(&mut out, resampler.process(&chunk, None)?);
        pos += RESAMPLE_CHUNK;
    }
    if pos < input_frames {
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[pos..]).collect();
        append_planes(&mut out, resampler.process_partial(Some(chunk.as_slice()), None)?);
    }
    // Flush the filter delay.
    while out[0].len() < expected + delay {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if tail.first().map_or(true, Vec::is_empty) {
            break;
        }
        append_planes(&mut out, tail);
    }

    for plane in &mut out {
        plane.drain(..delay.min(plane.len()));
        plane.truncate(expected);
    }
    Ok(out)
}

fn append_planes(out: &mut [Vec<f32>; 2], block: Vec<Vec<f32>>) {
    for (plane, samples) in out.iter_mut().zip(block) {
        plane.extend_from_slice(&samples);
    }
}

#[inline]
fn clamp_sample(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
