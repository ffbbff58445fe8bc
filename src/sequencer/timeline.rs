// Timeline - Tempo representation and tick/time conversion
// Handles conversion between ticks, beats and seconds, plus smooth tempo ramps

use crate::error::{SequencerError, SequencerResult};
use serde::Serialize;
use std::fmt;

/// Inclusive BPM bounds accepted by the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRange {
    pub min: f64,
    pub max: f64,
}

impl TempoRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Validate a BPM value against this range
    ///
    /// Non-finite and non-positive values are always rejected.
    pub fn check(&self, bpm: f64) -> SequencerResult<Tempo> {
        if !bpm.is_finite() || bpm <= 0.0 || bpm < self.min || bpm > self.max {
            return Err(SequencerError::InvalidTempo {
                bpm,
                min: self.min,
                max: self.max,
            });
        }
        Ok(Tempo { bpm })
    }
}

impl Default for TempoRange {
    fn default() -> Self {
        Self::new(30.0, 240.0)
    }
}

/// Tempo in BPM (Beats Per Minute)
///
/// Only constructed through [`TempoRange::check`], so a `Tempo` is always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Transport ticks per second at this tempo
    pub fn ticks_per_second(&self, ticks_per_beat: u32) -> f64 {
        self.bpm / 60.0 * ticks_per_beat as f64
    }

    /// Duration of `ticks` in seconds at this tempo
    pub fn ticks_to_seconds(&self, ticks: f64, ticks_per_beat: u32) -> f64 {
        ticks / self.ticks_per_second(ticks_per_beat)
    }

    /// Number of ticks elapsed in `seconds` at this tempo
    pub fn seconds_to_ticks(&self, seconds: f64, ticks_per_beat: u32) -> f64 {
        seconds * self.ticks_per_second(ticks_per_beat)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Linear BPM ramp evaluated against audio-clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRamp {
    from: f64,
    to: f64,
    duration: f64,
    elapsed: f64,
}

impl TempoRamp {
    /// A ramp that has already settled on `tempo`
    pub fn settled(tempo: Tempo) -> Self {
        Self {
            from: tempo.bpm,
            to: tempo.bpm,
            duration: 0.0,
            elapsed: 0.0,
        }
    }

    /// Start a new ramp from the current instantaneous value toward `target`
    pub fn retarget(&mut self, target: Tempo, duration_seconds: f64) {
        self.from = self.current_bpm();
        self.to = target.bpm;
        self.duration = duration_seconds.max(0.0);
        self.elapsed = 0.0;
    }

    /// Instantaneous BPM
    pub fn current_bpm(&self) -> f64 {
        if !self.is_active() {
            return self.to;
        }
        let t = self.elapsed / self.duration;
        self.from + (self.to - self.from) * t
    }

    pub fn current(&self) -> Tempo {
        Tempo {
            bpm: self.current_bpm(),
        }
    }

    /// Target BPM the ramp settles on
    pub fn target(&self) -> Tempo {
        Tempo { bpm: self.to }
    }

    pub fn is_active(&self) -> bool {
        self.elapsed < self.duration
    }

    /// Seconds left before the ramp settles
    pub fn remaining_seconds(&self) -> f64 {
        (self.duration - self.elapsed).max(0.0)
    }

    /// Move the ramp forward by `seconds` of audio time
    pub fn advance(&mut self, seconds: f64) {
        self.elapsed = (self.elapsed + seconds).min(self.duration);
    }
}
