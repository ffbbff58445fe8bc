// Presets - Named (tempo, pattern) pairs
// Built-in rock and house beats, extendable from JSON preset files

use super::pattern::PatternGrid;
use crate::error::{SequencerError, SequencerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A named tempo + grid pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub bpm: f64,
    pub pattern: PatternGrid,
}

impl Preset {
    pub fn new(name: impl Into<String>, bpm: f64, pattern: PatternGrid) -> Self {
        Self {
            name: name.into(),
            bpm,
            pattern,
        }
    }

    /// Straight rock beat
    pub fn rock() -> Self {
        Self::builtin(
            "rock",
            100.0,
            &[
                "................",
                "x.x.x.x.x.x.x.x.",
                "....x.......x...",
                "x.......x.x.....",
            ],
        )
    }

    /// Four-on-the-floor house beat
    pub fn house() -> Self {
        Self::builtin(
            "house",
            140.0,
            &[
                "..x...x...x...x.",
                "x.x.x.x.x.x.x.x.",
                "....x.......x...",
                "x...x...x...x...",
            ],
        )
    }

    fn builtin(name: &str, bpm: f64, rows: &[&str]) -> Self {
        // Built-in rows are literals of equal length
        let pattern = PatternGrid::parse(rows)
            .unwrap_or_else(|_| PatternGrid::default_grid(rows.len(), 16));
        Self::new(name, bpm, pattern)
    }
}

/// Lookup table of presets by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetLibrary {
    presets: BTreeMap<String, Preset>,
}

impl PresetLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding the built-in presets
    pub fn builtin() -> Self {
        let mut library = Self::new();
        library.insert(Preset::rock());
        library.insert(Preset::house());
        library
    }

    /// Add a preset, replacing any preset with the same name
    pub fn insert(&mut self, preset: Preset) -> Option<Preset> {
        self.presets.insert(preset.name.clone(), preset)
    }

    /// Look up a preset by name
    pub fn get(&self, name: &str) -> SequencerResult<&Preset> {
        self.presets
            .get(name)
            .ok_or_else(|| SequencerError::UnknownPreset(name.to_string()))
    }

    /// Preset names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Parse a JSON array of presets
    pub fn from_json_str(json: &str) -> SequencerResult<Self> {
        let presets: Vec<Preset> = serde_json::from_str(json)?;
        let mut library = Self::new();
        for preset in presets {
            library.insert(preset);
        }
        Ok(library)
    }

    /// Serialize to a JSON array of presets
    pub fn to_json_string(&self) -> SequencerResult<String> {
        let presets: Vec<&Preset> = self.presets.values().collect();
        Ok(serde_json::to_string_pretty(&presets)?)
    }

    /// Merge presets from a JSON file, overriding existing names
    pub fn load_json_file<P: AsRef<Path>>(&mut self, path: P) -> SequencerResult<usize> {
        let json = std::fs::read_to_string(path)?;
        let loaded = Self::from_json_str(&json)?;
        let count = loaded.len();
        self.presets.extend(loaded.presets);
        Ok(count)
    }

    /// Save all presets to a JSON file
    pub fn save_json_file<P: AsRef<Path>>(&self, path: P) -> SequencerResult<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_presets() {
        let library = PresetLibrary::builtin();
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["house", "rock"]);

        let rock = library.get("rock").unwrap();
        assert_eq!(rock.bpm, 100.0);
        assert_eq!(rock.pattern.rows(), 4);
        assert_eq!(rock.pattern.steps(), 16);
        assert!(rock.pattern.is_active(3, 0));

        let house = library.get("house").unwrap();
        assert_eq!(house.bpm, 140.0);
        assert_eq!(house.pattern.row(3).unwrap().iter().filter(|c| **c).count(), 4);
    }

    #[test]
    fn test_unknown_preset() {
        let library = PresetLibrary::builtin();
        assert!(matches!(
            library.get("polka"),
            Err(SequencerError::UnknownPreset(name)) if name == "polka"
        ));
    }

    #[test]
    fn test_json_format() {
        let json = r#"[{"name": "tiny", "bpm": 90.0, "pattern": [[1, 0], [0, 1]]}]"#;
        let library = PresetLibrary::from_json_str(json).unwrap();

        let tiny = library.get("tiny").unwrap();
        assert_eq!(tiny.bpm, 90.0);
        assert!(tiny.pattern.is_active(0, 0));
        assert!(tiny.pattern.is_active(1, 1));
    }

    #[test]
    fn test_malformed_json_grid_rejected() {
        let json = r#"[{"name": "bad", "bpm": 90.0, "pattern": [[1, 0], [0]]}]"#;
        assert!(matches!(
            PresetLibrary::from_json_str(json),
            Err(SequencerError::Json(_))
        ));
    }

    #[test]
    fn test_save_load_presets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("presets.json");

        PresetLibrary::builtin().save_json_file(&path).unwrap();

        let mut library = PresetLibrary::new();
        assert_eq!(library.load_json_file(&path).unwrap(), 2);
        assert_eq!(library.get("rock").unwrap(), &Preset::rock());
        assert_eq!(library.get("house").unwrap(), &Preset::house());
    }

    #[test]
    fn test_insert_overrides() {
        let mut library = PresetLibrary::builtin();
        let custom = Preset::new("rock", 140.0, PatternGrid::default_grid(4, 16));
        assert!(library.insert(custom).is_some());
        assert_eq!(library.get("rock").unwrap().bpm, 140.0);
    }
}
