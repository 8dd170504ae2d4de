//! Deck state: loaded PCM, transport, hot cues and the deck's isolator EQ.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::{PcmBuffer, CHANNELS};
use crate::config::EngineConfig;
use crate::dsp::{BandGains, EqIsolator};
use crate::error::{EngineError, Result};

/// Deck identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    /// Both decks, in index order.
    pub const ALL: [DeckId; 2] = [DeckId::A, DeckId::B];

    /// Get the deck as a numeric index (0 for A, 1 for B).
    pub fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// Get the deck from a numeric index.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    /// Get the other deck.
    pub fn other(&self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

impl FromStr for DeckId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(EngineError::InvalidArgument(format!(
                "deck must be 'A' or 'B', got '{other}'"
            ))),
        }
    }
}

/// A set hot cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HotCue {
    /// 1-based cue index.
    pub index: usize,
    /// Frame the cue jumps to.
    pub frame: usize,
}

/// Point-in-time view of a deck for UI polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckStatus {
    pub id: DeckId,
    pub loaded: bool,
    pub playing: bool,
    pub position: usize,
    pub duration: usize,
    pub rate: f64,
    pub eq: BandGains,
    pub hot_cues: Vec<HotCue>,
}

/// Complete deck state.
///
/// Owned by the engine and only touched under the engine lock. `render` is
/// the real-time half; everything else is driven from the control thread.
#[derive(Debug)]
pub struct Deck {
    id: DeckId,
    /// Engine operating rate; loads must match it.
    sample_rate: u32,
    buffer: Option<PcmBuffer>,
    /// Fractional playhead in frames. `0 <= playhead <= frame_count` at rest.
    playhead: f64,
    rate: f64,
    playing: bool,
    /// Fixed hot cue table, slot `i` holds cue index `i + 1`.
    hot_cues: Box<[Option<usize>]>,
    eq: EqIsolator,
}

impl Deck {
    /// Create an empty deck running at the engine's sample rate.
    pub fn new(id: DeckId, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            id,
            sample_rate: config.sample_rate,
            buffer: None,
            playhead: 0.0,
            rate: 1.0,
            playing: false,
            hot_cues: vec![None; config.hot_cue_slots].into_boxed_slice(),
            eq: EqIsolator::new(config.sample_rate, config.low_cut_hz, config.high_cut_hz)?,
        })
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Replace the loaded PCM.
    ///
    /// Fails if `source_rate` differs from the engine rate; the caller must
    /// resample first. On failure nothing about the deck changes.
    pub fn load(&mut self, buffer: PcmBuffer, source_rate: u32) -> Result<()> {
        if source_rate != self.sample_rate {
            return Err(EngineError::InvalidConfig(format!(
                "sample rate {} Hz != engine rate {} Hz, resample before loading",
                source_rate, self.sample_rate
            )));
        }
        self.eq.set_sample_rate(self.sample_rate)?;

        let frames = buffer.frame_count();
        self.buffer = Some(buffer);
        self.playhead = 0.0;
        self.playing = false;
        self.rate = 1.0;
        self.hot_cues.fill(None);

        log::info!(
            "Deck {}: Loaded {} frames ({:.2}s)",
            self.id,
            frames,
            frames as f64 / self.sample_rate as f64
        );
        Ok(())
    }

    /// Whether a buffer is loaded.
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Total frames of the loaded buffer (0 when empty).
    pub fn frame_count(&self) -> usize {
        self.buffer.as_ref().map_or(0, PcmBuffer::frame_count)
    }

    /// Integer playhead position in frames.
    pub fn position(&self) -> usize {
        self.playhead as usize
    }

    /// Fractional playhead position in frames.
    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    // Transport

    /// Start playback.
    pub fn play(&mut self) {
        self.playing = true;
        log::debug!("Deck {}: Playing", self.id);
    }

    /// Pause playback. The output stream keeps running.
    pub fn pause(&mut self) {
        self.playing = false;
        log::debug!("Deck {}: Paused", self.id);
    }

    /// Flip between playing and paused.
    pub fn toggle_play(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the playhead, clamped to `[0, frame_count - 1]`. No-op when empty.
    pub fn seek(&mut self, frame: i64) {
        let frames = self.frame_count();
        if frames == 0 {
            return;
        }
        let last = (frames - 1) as i64;
        self.playhead = frame.clamp(0, last) as f64;
        log::debug!("Deck {}: Seek to frame {}", self.id, self.playhead);
    }

    /// Store the playback rate. Bounds are applied by the engine.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        log::debug!("Deck {}: Rate set to {:.3}", self.id, rate);
    }

    // Hot cue methods

    /// Record the current integer playhead under `index` (1-based).
    pub fn set_hot_cue(&mut self, index: usize) -> Result<()> {
        let slot = self.slot(index)?;
        let frame = self.position();
        self.hot_cues[slot] = Some(frame);
        log::debug!("Deck {}: Hot cue {} set at frame {}", self.id, index, frame);
        Ok(())
    }

    /// Jump to hot cue `index`. Returns false, changing nothing, if it is
    /// unset or outside the table.
    pub fn goto_hot_cue(&mut self, index: usize) -> bool {
        match self.hot_cue(index) {
            Some(frame) => {
                self.playhead = frame as f64;
                log::debug!("Deck {}: Jumped to hot cue {} at frame {}", self.id, index, frame);
                true
            }
            None => {
                log::debug!("Deck {}: Hot cue {} not set", self.id, index);
                false
            }
        }
    }

    /// Forget hot cue `index`.
    pub fn clear_hot_cue(&mut self, index: usize) -> Result<()> {
        let slot = self.slot(index)?;
        self.hot_cues[slot] = None;
        log::debug!("Deck {}: Hot cue {} cleared", self.id, index);
        Ok(())
    }

    /// Frame stored under hot cue `index`, if any.
    pub fn hot_cue(&self, index: usize) -> Option<usize> {
        self.slot(index).ok().and_then(|slot| self.hot_cues[slot])
    }

    /// All set hot cues in index order.
    pub fn hot_cues(&self) -> Vec<HotCue> {
        self.hot_cues
            .iter()
            .enumerate()
            .filter_map(|(slot, frame)| frame.map(|frame| HotCue { index: slot + 1, frame }))
            .collect()
    }

    fn slot(&self, index: usize) -> Result<usize> {
        if index == 0 || index > self.hot_cues.len() {
            return Err(EngineError::InvalidArgument(format!(
                "hot cue index {} out of range 1..={}",
                index,
                self.hot_cues.len()
            )));
        }
        Ok(index - 1)
    }

    // EQ

    pub fn eq(&self) -> &EqIsolator {
        &self.eq
    }

    pub fn eq_mut(&mut self) -> &mut EqIsolator {
        &mut self.eq
    }

    /// Snapshot for UI polling.
    pub fn status(&self) -> DeckStatus {
        DeckStatus {
            id: self.id,
            loaded: self.is_loaded(),
            playing: self.playing,
            position: self.position(),
            duration: self.frame_count(),
            rate: self.rate,
            eq: self.eq.gains_db(),
            hot_cues: self.hot_cues(),
        }
    }

    // Rendering

    /// Render the next interleaved stereo block through the deck's EQ.
    ///
    /// Called from the audio callback only. A paused or empty deck yields
    /// silence and does not advance.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.fill_block(out).is_some() {
            self.eq.process(out);
        }
    }

    /// Copy source frames into `out` and advance the playhead.
    ///
    /// Returns the number of frames copied, or `None` when the deck produced
    /// nothing. Frames past the end of the track are left silent.
    fn fill_block(&mut self, out: &mut [f32]) -> Option<usize> {
        out.fill(0.0);
        if !self.playing {
            return None;
        }
        let buffer = self.buffer.as_ref()?;

        let block_frames = out.len() / CHANNELS;
        let frames = buffer.frame_count();
        let start = self.playhead as usize;
        let source = buffer.frames(start, block_frames);
        out[..source.len()].copy_from_slice(source);

        self.playhead += block_frames as f64 * self.rate;
        if self.playhead >= frames as f64 {
            // Stop at end of track, no looping.
            self.playhead = (frames - 1) as f64;
            self.playing = false;
        }

        Some(source.len() / CHANNELS)
    }
}
