//! Two-deck audio engine.
//!
//! All deck and mixer state lives in one [`EngineState`] behind a single
//! mutex. Every control call and every render callback holds that lock for
//! its full duration. Control calls only do constant work under it.

mod mixer;
mod output;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

pub use mixer::{equal_power_weights, MixerState};
pub use output::{
    default_device_name, list_audio_devices, AudioDeviceInfo, AudioOutput, CpalOutput, NullOutput,
};

use crate::buffer::{PcmBuffer, CHANNELS};
use crate::config::EngineConfig;
use crate::deck::{Deck, DeckId, DeckStatus};
use crate::error::{EngineError, Result};

/// Engine state shared between the control thread and the audio callback.
pub type SharedState = Arc<Mutex<EngineState>>;

/// Everything the render callback reads: both decks and the mixer.
#[derive(Debug)]
pub struct EngineState {
    decks: [Deck; 2],
    mixer: MixerState,
    /// Per-deck render buffers, reused across callbacks.
    scratch: [Vec<f32>; 2],
}

impl EngineState {
    /// Create both decks for the given configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let block = config.block_size as usize * CHANNELS;
        Ok(Self {
            decks: [Deck::new(DeckId::A, config)?, Deck::new(DeckId::B, config)?],
            mixer: MixerState::default(),
            scratch: [vec![0.0; block], vec![0.0; block]],
        })
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    pub fn mixer(&self) -> &MixerState {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut MixerState {
        &mut self.mixer
    }

    /// Render one interleaved stereo block: both decks through their EQ,
    /// channel faders, equal-power crossfade, then a hard clip to [-1, 1].
    pub fn render(&mut self, out: &mut [f32]) {
        let len = out.len();
        for (deck, scratch) in self.decks.iter_mut().zip(self.scratch.iter_mut()) {
            if scratch.len() < len {
                scratch.resize(len, 0.0);
            }
            deck.render(&mut scratch[..len]);
        }

        let (weight_a, weight_b) = self.mixer.deck_weights();
        let [deck_a, deck_b] = &self.scratch;
        for ((sample, a), b) in out.iter_mut().zip(&deck_a[..len]).zip(&deck_b[..len]) {
            *sample = clip(weight_a * a + weight_b * b);
        }
    }
}

/// Hard clip to [-1, 1]; anything non-finite becomes silence.
#[inline]
fn clip(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Render under the engine lock without ever unwinding into the driver.
pub(crate) fn render_block(state: &SharedState, out: &mut [f32]) {
    guarded(out, |block| state.lock().render(block));
}

/// Run `render` on `out`, catching any panic.
///
/// A panic silences the whole block, including whatever `render` had already
/// written, and is logged; the stream keeps running.
pub(crate) fn guarded(out: &mut [f32], render: impl FnOnce(&mut [f32])) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| render(&mut *out)));
    if result.is_err() {
        out.fill(0.0);
        log::error!("Render callback fault, emitting silence for this block");
    }
}

/// Two-deck mixing engine with a thread-safe control API.
///
/// The output stream starts lazily on the first `play`/`toggle_play` of
/// either deck and runs until [`AudioEngine::close`] (or drop).
pub struct AudioEngine<O: AudioOutput = CpalOutput> {
    config: EngineConfig,
    state: SharedState,
    output: O,
}

impl AudioEngine<CpalOutput> {
    /// Create an engine that plays through the default cpal host.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_output(config, CpalOutput::new())
    }
}

impl<O: AudioOutput> AudioEngine<O> {
    /// Create an engine with an explicit output backend.
    pub fn with_output(config: EngineConfig, output: O) -> Result<Self> {
        config.validate()?;
        let state = EngineState::new(&config)?;
        log::info!(
            "Audio engine created: {} Hz, {} frame blocks, crossovers {}/{} Hz",
            config.sample_rate,
            config.block_size,
            config.low_cut_hz,
            config.high_cut_hz
        );
        Ok(Self {
            config,
            state: Arc::new(Mutex::new(state)),
            output,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fixed operating sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// The output backend.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Handle to the shared state, for backends and offline rendering.
    pub fn shared_state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    fn with_deck<R>(&self, deck: DeckId, f: impl FnOnce(&mut Deck) -> R) -> R {
        f(self.state.lock().deck_mut(deck))
    }

    // Deck loading

    /// Load stereo PCM onto a deck.
    ///
    /// `source_rate` must equal the engine rate. On error the deck keeps its
    /// previous track, position and playing state.
    pub fn load_pcm(&self, deck: DeckId, buffer: PcmBuffer, source_rate: u32) -> Result<()> {
        self.with_deck(deck, |d| d.load(buffer, source_rate))
    }

    // Transport

    /// Start a deck, starting the output stream if it is not running yet.
    pub fn play(&mut self, deck: DeckId) -> Result<()> {
        self.with_deck(deck, Deck::play);
        self.ensure_stream()
    }

    /// Pause a deck. The stream keeps running.
    pub fn pause(&self, deck: DeckId) {
        self.with_deck(deck, Deck::pause);
    }

    /// Flip a deck between playing and paused, making sure the stream runs.
    pub fn toggle_play(&mut self, deck: DeckId) -> Result<()> {
        self.with_deck(deck, Deck::toggle_play);
        self.ensure_stream()
    }

    /// Stop and release the output stream. Decks keep their state.
    pub fn close(&mut self) {
        let was_running = self.output.is_running();
        self.output.stop();
        if was_running {
            log::info!("Audio engine closed");
        }
    }

    /// Whether the output stream is active. False once the device has
    /// reported an error, until the next `play` restarts it.
    pub fn is_running(&self) -> bool {
        self.output.is_running()
    }

    /// Last error the output device reported, if the stream died.
    pub fn device_error(&self) -> Option<String> {
        self.output.device_error()
    }

    /// Start the stream if it is not running, releasing a dead one first.
    fn ensure_stream(&mut self) -> Result<()> {
        if !self.output.is_running() {
            if let Some(err) = self.output.device_error() {
                log::warn!("Restarting audio stream after device error: {}", err);
            }
            self.output.stop();
            self.output.start(Arc::clone(&self.state), &self.config)?;
        }
        Ok(())
    }

    /// Seek to a frame, clamped to the track. Ignored when the deck is empty.
    pub fn seek_frames(&self, deck: DeckId, frame: i64) {
        self.with_deck(deck, |d| d.seek(frame));
    }

    /// Set the playback rate, clamped to the configured `[min_rate, max_rate]`.
    pub fn set_rate(&self, deck: DeckId, rate: f64) -> Result<()> {
        if !rate.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "rate must be finite, got {rate}"
            )));
        }
        let clamped = rate.clamp(self.config.min_rate, self.config.max_rate);
        if clamped != rate {
            log::debug!("Deck {}: Rate {:.3} clamped to {:.3}", deck, rate, clamped);
        }
        self.with_deck(deck, |d| d.set_rate(clamped));
        Ok(())
    }

    /// Current playhead in whole frames.
    pub fn position(&self, deck: DeckId) -> usize {
        self.with_deck(deck, |d| d.position())
    }

    /// Loaded track length in frames (0 when empty).
    pub fn duration(&self, deck: DeckId) -> usize {
        self.with_deck(deck, |d| d.frame_count())
    }

    /// Consistent snapshot of one deck.
    pub fn deck_status(&self, deck: DeckId) -> DeckStatus {
        self.with_deck(deck, |d| d.status())
    }

    // Hot cues

    /// Store the current position under hot cue `index` (1-based).
    pub fn set_hotcue(&self, deck: DeckId, index: usize) -> Result<()> {
        self.with_deck(deck, |d| d.set_hot_cue(index))
    }

    /// Jump to hot cue `index`. Returns false, doing nothing, when the cue is
    /// unset or `index` is outside the table.
    pub fn goto_hotcue(&self, deck: DeckId, index: usize) -> bool {
        self.with_deck(deck, |d| d.goto_hot_cue(index))
    }

    /// Forget hot cue `index`.
    pub fn clear_hotcue(&self, deck: DeckId, index: usize) -> Result<()> {
        self.with_deck(deck, |d| d.clear_hot_cue(index))
    }

    // EQ

    /// Set a deck's band gains in dB. At or below -80 dB kills the band.
    pub fn set_eq(&self, deck: DeckId, low_db: f64, mid_db: f64, high_db: f64) {
        self.with_deck(deck, |d| d.eq_mut().set_gains_db(low_db, mid_db, high_db));
        log::debug!(
            "Deck {}: EQ low {:.1} dB, mid {:.1} dB, high {:.1} dB",
            deck,
            low_db,
            mid_db,
            high_db
        );
    }

    /// Move a deck's isolator crossovers. Filter state restarts from silence.
    pub fn set_crossovers(&self, deck: DeckId, low_cut_hz: f64, high_cut_hz: f64) -> Result<()> {
        self.with_deck(deck, |d| d.eq_mut().set_crossovers(low_cut_hz, high_cut_hz))?;
        log::debug!(
            "Deck {}: Crossovers set to {} / {} Hz",
            deck,
            low_cut_hz,
            high_cut_hz
        );
        Ok(())
    }

    // Mixer

    /// Set the crossfader, clamped to `[0, 1]` (0 = A, 1 = B).
    pub fn set_crossfader(&self, position: f32) -> Result<()> {
        if !position.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "crossfader must be finite, got {position}"
            )));
        }
        self.state.lock().mixer_mut().set_crossfader(position);
        Ok(())
    }

    pub fn crossfader(&self) -> f32 {
        self.state.lock().mixer().crossfader()
    }

    /// Set a channel fader, clamped to `[0, 1]`.
    pub fn set_channel_gain(&self, deck: DeckId, gain: f32) -> Result<()> {
        if !gain.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "channel gain must be finite, got {gain}"
            )));
        }
        self.state.lock().mixer_mut().set_channel_gain(deck, gain);
        Ok(())
    }

    pub fn channel_gain(&self, deck: DeckId) -> f32 {
        self.state.lock().mixer().channel_gain(deck)
    }

    /// Copy of the mixer parameters, read together.
    pub fn mixer(&self) -> MixerState {
        *self.state.lock().mixer()
    }

    /// Run the render callback on an interleaved stereo block.
    pub fn render(&self, out: &mut [f32]) {
        render_block(&self.state, out);
    }
}

impl<O: AudioOutput> Drop for AudioEngine<O> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(frames: usize, value: f32) -> PcmBuffer {
        PcmBuffer::from_frames(&vec![[value, value]; frames]).unwrap()
    }

    fn state_with_decks(a: f32, b: f32) -> EngineState {
        let mut state = EngineState::new(&EngineConfig::default()).unwrap();
        for (deck, value) in [(DeckId::A, a), (DeckId::B, b)] {
            let d = state.deck_mut(deck);
            d.load(constant(48000, value), 48000).unwrap();
            d.play();
        }
        state
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip(0.5), 0.5);
        assert_eq!(clip(1.5), 1.0);
        assert_eq!(clip(-3.0), -1.0);
        assert_eq!(clip(f32::NAN), 0.0);
        assert_eq!(clip(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_render_silent_when_idle() {
        let mut state = EngineState::new(&EngineConfig::default()).unwrap();
        let mut out = vec![0.3f32; 512];
        state.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_render_clips_sum() {
        let mut state = state_with_decks(0.9, 0.9);
        // Centre position: 0.9 * 0.707 * 2 = 1.27 before clipping.
        let mut out = vec![0.0f32; 4096 * 2];
        for _ in 0..4 {
            state.render(&mut out);
        }
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(out[out.len() - 2..].iter().all(|s| (*s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_render_grows_scratch() {
        let mut state = state_with_decks(0.1, 0.1);
        let mut out = vec![0.0f32; 2048 * 2];
        state.render(&mut out);
        assert_eq!(state.deck(DeckId::A).position(), 2048);
        assert_eq!(state.deck(DeckId::B).position(), 2048);
    }

    #[test]
    fn test_render_block_shared() {
        let state: SharedState = Arc::new(Mutex::new(state_with_decks(0.0, 0.0)));
        let mut out = vec![1.0f32; 256 * 2];
        render_block(&state, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(state.lock().deck(DeckId::A).position(), 256);
    }

    #[test]
    fn test_guarded_panic_silences_block() {
        let mut out = vec![0.0f32; 256 * 2];
        guarded(&mut out, |block| {
            block.fill(0.5);
            panic!("render fault");
        });
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_guarded_panic_releases_lock() {
        let state: SharedState = Arc::new(Mutex::new(state_with_decks(0.25, 0.0)));
        let mut out = vec![0.0f32; 256 * 2];
        guarded(&mut out, |block| {
            let mut locked = state.lock();
            locked.render(block);
            panic!("render fault");
        });
        assert!(out.iter().all(|s| *s == 0.0));

        // The next callback still gets the lock and renders audio.
        render_block(&state, &mut out);
        assert_eq!(state.lock().deck(DeckId::A).position(), 512);
        assert!(out.iter().any(|s| *s != 0.0));
    }
}
