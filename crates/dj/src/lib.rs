//! Twindeck DJ engine
//!
//! Two-deck mixing engine with per-deck isolator EQ, rate control, hot cues
//! and an equal-power crossfader, rendered from a real-time audio callback.
//!
//! # Features
//!
//! - In-memory stereo decks with fractional-rate transport and hot cues
//! - 3-band isolator EQ built from Linkwitz-Riley 24 dB/oct crossovers
//! - Channel faders, equal-power crossfader and hard clipping
//! - cpal output started lazily on first play, or a headless null output
//! - File decoding and resampling, tempo estimation and waveform overviews

pub mod buffer;
pub mod config;
pub mod deck;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod library;

// Re-export main types
pub use buffer::PcmBuffer;
pub use config::EngineConfig;
pub use deck::{Deck, DeckId, DeckStatus, HotCue};
pub use engine::{AudioEngine, AudioOutput, CpalOutput, MixerState, NullOutput};
pub use error::{EngineError, Result};
pub use library::{BeatGrid, SoundTouchTempoAnalyzer, TempoAnalyzer};
