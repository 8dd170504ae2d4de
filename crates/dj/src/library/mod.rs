//! Library collaborators: decoding files into deck-ready PCM, tempo
//! estimation and waveform overviews.

pub mod analysis;
pub mod decode;
pub mod waveform;

pub use analysis::{BeatGrid, SoundTouchTempoAnalyzer, TempoAnalyzer};
pub use decode::{is_supported_audio_file, load_audio_to_pcm, supported_extensions};
pub use waveform::{peak_columns, waveform_peaks, PeakColumn};
