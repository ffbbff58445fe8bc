// Command types - UI → sequencer

/// A command issued by the UI boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    TogglePlay,
    Reset,
    SetTempo(f64),
    ToggleCell { row: usize, col: usize },
    LoadPreset(String),
}
