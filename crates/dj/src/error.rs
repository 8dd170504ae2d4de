//! Error types for the mixing engine.

use thiserror::Error;

/// Errors raised by the engine control surface and its DSP building blocks.
///
/// Validation errors are always detected before shared state is touched, so a
/// call that returns an error leaves the engine exactly as it was.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad crossover frequencies, a zero leading filter coefficient, a sample
    /// rate mismatch, a malformed PCM buffer or an out-of-range config value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown deck identifier, out-of-range hot cue or non-finite control value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no output device available")]
    NoOutputDevice,

    #[error("output device does not support {sample_rate} Hz stereo f32 output")]
    UnsupportedStreamConfig { sample_rate: u32 },

    #[error("failed to enumerate output devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
