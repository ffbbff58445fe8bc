// Sequencer configuration
// Loaded once at startup; persisted as RON like the rest of the app's state files

use crate::error::{SequencerError, SequencerResult};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.ron";

/// Engine configuration
///
/// Every field has a default, so a config file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Transport resolution: ticks in one loop cycle (one bar)
    pub ticks_per_bar: u32,
    /// Beats in one bar (4/4 time by default)
    pub beats_per_bar: u32,
    /// Steps per bar in the pattern grid
    pub subdivisions: u32,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Tempo restored by reset
    pub default_bpm: f64,
    /// Duration of a tempo ramp in milliseconds
    pub ramp_ms: f64,
    /// Audio clock rate used to convert frames to seconds
    pub sample_rate: f64,
    /// Sound a cell immediately when it is switched on while stopped
    pub preview_on_toggle: bool,
    pub notification_capacity: usize,
    pub voice_queue_capacity: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            ticks_per_bar: 192,
            beats_per_bar: 4,
            subdivisions: 16,
            min_bpm: 30.0,
            max_bpm: 240.0,
            default_bpm: 85.0,
            ramp_ms: 100.0,
            sample_rate: 48000.0,
            preview_on_toggle: true,
            notification_capacity: 256,
            voice_queue_capacity: 512,
        }
    }
}

impl SequencerConfig {
    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> SequencerResult<()> {
        if self.ticks_per_bar == 0 {
            return Err(SequencerError::Config(
                "ticks per bar must be non-zero".to_string(),
            ));
        }
        if self.subdivisions == 0 || self.ticks_per_bar % self.subdivisions != 0 {
            return Err(SequencerError::NonIntegralSubdivision {
                loop_ticks: self.ticks_per_bar,
                subdivisions: self.subdivisions,
            });
        }
        if self.beats_per_bar == 0 || self.ticks_per_bar % self.beats_per_bar != 0 {
            return Err(SequencerError::Config(format!(
                "{} beats per bar do not evenly divide {} ticks",
                self.beats_per_bar, self.ticks_per_bar
            )));
        }
        if !(self.min_bpm.is_finite() && self.max_bpm.is_finite())
            || self.min_bpm <= 0.0
            || self.min_bpm > self.max_bpm
        {
            return Err(SequencerError::Config(format!(
                "invalid tempo bounds {}..={}",
                self.min_bpm, self.max_bpm
            )));
        }
        if !(self.min_bpm..=self.max_bpm).contains(&self.default_bpm) {
            return Err(SequencerError::InvalidTempo {
                bpm: self.default_bpm,
                min: self.min_bpm,
                max: self.max_bpm,
            });
        }
        if !self.ramp_ms.is_finite() || self.ramp_ms < 0.0 {
            return Err(SequencerError::Config(format!(
                "ramp duration must be >= 0 ms, got {}",
                self.ramp_ms
            )));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(SequencerError::Config(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.notification_capacity == 0 || self.voice_queue_capacity == 0 {
            return Err(SequencerError::Config(
                "queue capacities must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Ticks covered by one beat
    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_bar / self.beats_per_bar
    }

    /// Parse a RON document and validate it
    pub fn from_ron_str(ron_data: &str) -> SequencerResult<Self> {
        let config: Self = ron::from_str(ron_data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> SequencerResult<String> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    /// Load config from a RON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SequencerResult<Self> {
        let ron_data = std::fs::read_to_string(path)?;
        Self::from_ron_str(&ron_data)
    }

    /// Save config to a RON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SequencerResult<()> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Platform config location, e.g. `~/.config/drum-sequencer/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("drum-sequencer").join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load_or_default() -> SequencerResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = SequencerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ticks_per_beat(), 48);
    }

    #[test]
    fn test_non_integral_subdivision_rejected() {
        let config = SequencerConfig {
            subdivisions: 10,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SequencerError::NonIntegralSubdivision {
                loop_ticks: 192,
                subdivisions: 10
            })
        ));

        let zero = SequencerConfig {
            subdivisions: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(SequencerError::NonIntegralSubdivision { .. })
        ));
    }

    #[test]
    fn test_zero_length_loop_rejected() {
        let config = SequencerConfig {
            ticks_per_bar: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SequencerError::Config(_))));
    }

    #[test]
    fn test_default_bpm_must_be_in_range() {
        let config = SequencerConfig {
            default_bpm: 300.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SequencerError::InvalidTempo { .. })
        ));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SequencerConfig::from_ron_str("(default_bpm: 100.0, subdivisions: 8)").unwrap();
        assert_eq!(config.default_bpm, 100.0);
        assert_eq!(config.subdivisions, 8);
        assert_eq!(config.ticks_per_bar, 192);
        assert!(config.preview_on_toggle);
    }

    #[test]
    fn test_save_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ron");

        let config = SequencerConfig {
            max_bpm: 200.0,
            preview_on_toggle: false,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = SequencerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
