//! Audio output backends.
//!
//! The engine renders interleaved stereo blocks; a backend owns the device
//! stream that pulls them. [`CpalOutput`] drives a real device, [`NullOutput`]
//! only tracks the running state for headless use and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, SampleFormat, Stream, StreamConfig, StreamError, SupportedBufferSize,
};
use parking_lot::Mutex;

use super::{render_block, SharedState};
use crate::buffer::CHANNELS;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// An output stream the engine can start and stop.
///
/// `start` is only called while the backend is not running. Once started a
/// stream stays active until `stop` or until the device fails; pausing a deck
/// never pauses the stream.
pub trait AudioOutput {
    /// Open the device and begin pulling blocks from `state`.
    fn start(&mut self, state: SharedState, config: &EngineConfig) -> Result<()>;

    /// Stop and release the stream. Returns after in-flight callbacks finish.
    ///
    /// Also called on a stream that died, to release it before a restart.
    fn stop(&mut self);

    /// False after `stop` and after the device reported a stream error.
    fn is_running(&self) -> bool;

    /// Last error the device reported on the current stream.
    fn device_error(&self) -> Option<String> {
        None
    }
}

/// Output through the platform's default cpal host.
#[derive(Default)]
pub struct CpalOutput {
    stream: Option<Stream>,
    /// Set from cpal's error callback; a stream with an error is dead.
    error: Arc<Mutex<Option<String>>>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error callback for the stream: logs and marks the stream dead.
    fn error_callback(&self) -> impl FnMut(StreamError) + Send + 'static {
        let error = Arc::clone(&self.error);
        move |err| {
            log::error!("Audio stream error: {}", err);
            *error.lock() = Some(err.to_string());
        }
    }
}

impl AudioOutput for CpalOutput {
    fn start(&mut self, state: SharedState, config: &EngineConfig) -> Result<()> {
        let device = find_device(&config.device_name)?;
        let stream_config = find_config(&device, config)?;

        let channels = stream_config.channels as usize;
        log::info!(
            "Starting audio engine: {} channels @ {} Hz ({:?})",
            stream_config.channels,
            stream_config.sample_rate,
            stream_config.buffer_size
        );

        // Preallocated so the callback only grows it if the driver hands us
        // a larger block than requested.
        let mut stereo = vec![0.0f32; config.block_size as usize * CHANNELS];

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                if stereo.len() < frames * CHANNELS {
                    stereo.resize(frames * CHANNELS, 0.0);
                }
                let block = &mut stereo[..frames * CHANNELS];
                render_block(&state, block);

                // Mix goes to the first two device channels, the rest stay silent.
                for (frame, mixed) in data.chunks_mut(channels).zip(block.chunks_exact(CHANNELS)) {
                    frame.fill(0.0);
                    frame[..CHANNELS].copy_from_slice(mixed);
                }
            },
            self.error_callback(),
            None,
        )?;

        *self.error.lock() = None;
        stream.play()?;
        self.stream = Some(stream);

        log::info!("Audio engine started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::info!("Audio engine stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.stream.is_some() && self.error.lock().is_none()
    }

    fn device_error(&self) -> Option<String> {
        self.error.lock().clone()
    }
}

/// Find the audio device by name, falling back to the default device.
fn find_device(device_name: &str) -> Result<Device> {
    let host = cpal::default_host();

    if device_name.is_empty() {
        return host
            .default_output_device()
            .ok_or(EngineError::NoOutputDevice);
    }

    for device in host.output_devices()? {
        if let Ok(name) = device.name() {
            if name.contains(device_name) {
                log::info!("Found audio device: {}", name);
                return Ok(device);
            }
        }
    }

    log::warn!("Device '{}' not found, using default", device_name);
    host.default_output_device()
        .ok_or(EngineError::NoOutputDevice)
}

/// Find an f32 config with at least two channels at the engine rate.
///
/// The rate is never renegotiated: a device that cannot run at it is an error.
fn find_config(device: &Device, config: &EngineConfig) -> Result<StreamConfig> {
    let target_rate = config.sample_rate;

    for config_range in device.supported_output_configs()? {
        if config_range.channels() as usize >= CHANNELS
            && config_range.sample_format() == SampleFormat::F32
            && target_rate >= config_range.min_sample_rate()
            && target_rate <= config_range.max_sample_rate()
        {
            let buffer_size = match *config_range.buffer_size() {
                SupportedBufferSize::Range { min, max }
                    if (min..=max).contains(&config.block_size) =>
                {
                    BufferSize::Fixed(config.block_size)
                }
                _ => {
                    log::warn!(
                        "Block size {} not supported, using device default",
                        config.block_size
                    );
                    BufferSize::Default
                }
            };
            let mut stream_config: StreamConfig = config_range.with_sample_rate(target_rate).into();
            stream_config.buffer_size = buffer_size;
            return Ok(stream_config);
        }
    }

    Err(EngineError::UnsupportedStreamConfig {
        sample_rate: target_rate,
    })
}

/// Output that never touches hardware.
///
/// Records start/stop transitions; blocks can be pulled manually with
/// [`super::AudioEngine::render`].
#[derive(Debug, Default)]
pub struct NullOutput {
    state: Option<SharedState>,
    starts: usize,
    stops: Arc<AtomicUsize>,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the engine has started this output.
    pub fn start_count(&self) -> usize {
        self.starts
    }

    /// How many running streams have been stopped.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Shared stop counter that stays readable after the output is dropped.
    pub fn stop_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.stops)
    }
}

impl AudioOutput for NullOutput {
    fn start(&mut self, state: SharedState, _config: &EngineConfig) -> Result<()> {
        self.state = Some(state);
        self.starts += 1;
        log::debug!("Null output started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            self.stops.fetch_add(1, Ordering::SeqCst);
            log::debug!("Null output stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.state.is_some()
    }
}

/// Information about an audio output device.
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    /// Device name.
    pub name: String,
    /// Maximum number of output channels.
    pub max_channels: u16,
    /// Whether the device can run stereo f32 at the requested rate.
    pub supports_rate: bool,
    /// Whether this is the default device.
    pub is_default: bool,
}

/// List available audio output devices and whether they can run at `sample_rate`.
pub fn list_audio_devices(sample_rate: u32) -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = default_device_name().unwrap_or_default();

    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(name) = device.name() {
                let configs = device
                    .supported_output_configs()
                    .map(|configs| configs.collect::<Vec<_>>())
                    .unwrap_or_default();

                let max_channels = configs.iter().map(|c| c.channels()).max().unwrap_or(2);
                let supports_rate = configs.iter().any(|c| {
                    c.channels() as usize >= CHANNELS
                        && c.sample_format() == SampleFormat::F32
                        && sample_rate >= c.min_sample_rate()
                        && sample_rate <= c.max_sample_rate()
                });

                devices.push(AudioDeviceInfo {
                    is_default: name == default_name,
                    name,
                    max_channels,
                    supports_rate,
                });
            }
        }
    }

    devices
}

/// Get the default audio device name.
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineState;

    #[test]
    fn test_null_output_transitions() {
        let config = EngineConfig::default();
        let state = Arc::new(Mutex::new(EngineState::new(&config).unwrap()));

        let mut output = NullOutput::new();
        assert!(!output.is_running());

        output.start(Arc::clone(&state), &config).unwrap();
        assert!(output.is_running());
        assert_eq!(output.start_count(), 1);

        output.stop();
        assert!(!output.is_running());
        assert_eq!(output.stop_count(), 1);
        // Stopping twice is harmless.
        output.stop();
        assert!(!output.is_running());
        assert_eq!(output.stop_count(), 1);
    }

    #[test]
    fn test_cpal_error_callback_records_error() {
        let output = CpalOutput::new();
        assert!(!output.is_running());
        assert_eq!(output.device_error(), None);

        let mut on_error = output.error_callback();
        on_error(StreamError::DeviceNotAvailable);

        assert!(output.device_error().is_some());
        assert!(!output.is_running());
    }

    #[test]
    fn test_list_devices() {
        // This should not panic even if no devices are available
        let devices = list_audio_devices(48000);
        println!("Available audio devices: {:?}", devices);
    }
}
