//! Signal processing building blocks for the per-deck isolator EQ.
//!
//! - [`Biquad`]: one second-order IIR section with per-channel state
//! - [`Lr4Filter`]: two cascaded Butterworth biquads (24 dB/oct)
//! - [`EqIsolator`]: 3-band low/mid/high isolator built from four LR4 chains

mod biquad;
mod crossover;
mod isolator;

pub use biquad::Biquad;
pub use crossover::{CrossoverKind, Lr4Filter};
pub use isolator::{BandGains, EqIsolator};
pub(crate) use isolator::validate_crossovers;

/// Gains at or below this level are treated as a full kill.
pub const KILL_DB: f64 = -80.0;

/// Convert decibels to a linear gain.
///
/// Anything at or below [`KILL_DB`], or non-finite, maps to exactly 0.0 so a
/// killed band contributes nothing (and never produces denormals).
pub fn db_to_linear(db: f64) -> f64 {
    if !db.is_finite() || db <= KILL_DB {
        return 0.0;
    }
    10f64.powf(db / 20.0)
}

/// Clamp a control value to the unit range `[0, 1]`.
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}
