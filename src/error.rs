// Sequencer error types
// Every failure here is an input or configuration error, reported synchronously

/// Errors raised by the sequencer engine
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Invalid tempo {bpm} BPM (allowed range {min}..={max})")]
    InvalidTempo { bpm: f64, min: f64, max: f64 },

    #[error("Cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{subdivisions} subdivisions do not evenly divide a {loop_ticks}-tick loop")]
    NonIntegralSubdivision { loop_ticks: u32, subdivisions: u32 },

    #[error("Offset {offset} is outside the {loop_ticks}-tick loop")]
    OffsetOutOfRange { offset: u32, loop_ticks: u32 },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error(
        "Grid shape {rows}x{steps} does not match the configured {expected_rows}x{expected_steps}"
    )]
    ShapeMismatch {
        expected_rows: usize,
        expected_steps: usize,
        rows: usize,
        steps: usize,
    },

    #[error("Malformed grid: {0}")]
    MalformedGrid(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
}

pub type SequencerResult<T> = Result<T, SequencerError>;
