// Pattern - Drum instruments and the step grid
// A grid is an immutable snapshot; every edit produces a new grid

use crate::error::{SequencerError, SequencerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Drum voice identifier
///
/// Declaration order is the row order of every [`PatternGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Instrument {
    OpenHat,
    ClosedHat,
    Snare,
    Kick,
}

impl Instrument {
    /// All instruments in row order
    pub const ALL: [Instrument; 4] = [
        Instrument::OpenHat,
        Instrument::ClosedHat,
        Instrument::Snare,
        Instrument::Kick,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Instrument for a grid row
    pub fn from_row(row: usize) -> Option<Self> {
        Self::ALL.get(row).copied()
    }

    /// Grid row of this instrument
    pub fn row(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::OpenHat => "openHat",
            Instrument::ClosedHat => "closedHat",
            Instrument::Snare => "snare",
            Instrument::Kick => "kick",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable instrument × step matrix of active cells
///
/// Cells are shared behind an `Arc`, so cloning a grid is cheap and a clone is a
/// stable snapshot: [`PatternGrid::toggle`] never touches the cells it was called on.
/// Serialized as rows of 0/1 values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct PatternGrid {
    rows: usize,
    steps: usize,
    /// Row-major cells
    cells: Arc<[bool]>,
}

impl PatternGrid {
    /// All-false grid of the given shape
    pub fn default_grid(rows: usize, steps: usize) -> Self {
        Self {
            rows,
            steps,
            cells: vec![false; rows * steps].into(),
        }
    }

    /// Build a grid from rows of booleans
    ///
    /// Fails with `MalformedGrid` if the rows have different lengths or no steps.
    pub fn from_rows<R: AsRef<[bool]>>(rows: &[R]) -> SequencerResult<Self> {
        let steps = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if !rows.is_empty() && steps == 0 {
            return Err(SequencerError::MalformedGrid(format!(
                "{} rows with no steps",
                rows.len()
            )));
        }
        let mut cells = Vec::with_capacity(rows.len() * steps);

        for (index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != steps {
                return Err(SequencerError::MalformedGrid(format!(
                    "row {} has {} steps, expected {}",
                    index,
                    row.len(),
                    steps
                )));
            }
            cells.extend_from_slice(row);
        }

        Ok(Self {
            rows: rows.len(),
            steps,
            cells: cells.into(),
        })
    }

    /// Parse rows written as step strings, `x` for active and `.` for rest
    ///
    /// ```
    /// use drum_sequencer::PatternGrid;
    ///
    /// let grid = PatternGrid::parse(&["x...", "..x."]).unwrap();
    /// assert!(grid.is_active(0, 0));
    /// assert!(grid.is_active(1, 2));
    /// ```
    pub fn parse(rows: &[&str]) -> SequencerResult<Self> {
        let parsed = rows
            .iter()
            .map(|row| {
                row.chars()
                    .map(|c| match c {
                        'x' | 'X' => Ok(true),
                        '.' | '-' => Ok(false),
                        other => Err(SequencerError::MalformedGrid(format!(
                            "unexpected step character '{}'",
                            other
                        ))),
                    })
                    .collect::<SequencerResult<Vec<bool>>>()
            })
            .collect::<SequencerResult<Vec<_>>>()?;

        Self::from_rows(&parsed)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Fails with `IndexOutOfRange` when (row, col) lies outside the grid
    fn index(&self, row: usize, col: usize) -> SequencerResult<usize> {
        if row >= self.rows || col >= self.steps {
            return Err(SequencerError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.steps,
            });
        }
        Ok(row * self.steps + col)
    }

    /// Read a cell
    pub fn get(&self, row: usize, col: usize) -> SequencerResult<bool> {
        Ok(self.cells[self.index(row, col)?])
    }

    /// Read a cell, treating out-of-range coordinates as inactive
    pub fn is_active(&self, row: usize, col: usize) -> bool {
        self.get(row, col).unwrap_or(false)
    }

    /// New grid equal to this one except for cell (row, col), which is flipped
    pub fn toggle(&self, row: usize, col: usize) -> SequencerResult<Self> {
        let index = self.index(row, col)?;
        let mut cells = self.cells.to_vec();
        cells[index] = !cells[index];

        Ok(Self {
            rows: self.rows,
            steps: self.steps,
            cells: cells.into(),
        })
    }

    /// Cells of one row
    pub fn row(&self, row: usize) -> Option<&[bool]> {
        (row < self.rows).then(|| &self.cells[row * self.steps..(row + 1) * self.steps])
    }

    /// Iterate over the (row, col) coordinates of every active cell, row-major
    pub fn active_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let steps = self.steps;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, active)| **active)
            .map(move |(index, _)| (index / steps, index % steps))
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// Check this grid against the expected shape
    pub fn ensure_shape(&self, rows: usize, steps: usize) -> SequencerResult<()> {
        if self.rows != rows || self.steps != steps {
            return Err(SequencerError::ShapeMismatch {
                expected_rows: rows,
                expected_steps: steps,
                rows: self.rows,
                steps: self.steps,
            });
        }
        Ok(())
    }

    /// True when both grids share the same cell storage
    pub fn shares_storage(&self, other: &PatternGrid) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }
}

impl TryFrom<Vec<Vec<u8>>> for PatternGrid {
    type Error = SequencerError;

    fn try_from(rows: Vec<Vec<u8>>) -> SequencerResult<Self> {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        0 => Ok(false),
                        1 => Ok(true),
                        other => Err(SequencerError::MalformedGrid(format!(
                            "cell value {} is not 0 or 1",
                            other
                        ))),
                    })
                    .collect::<SequencerResult<Vec<bool>>>()
            })
            .collect::<SequencerResult<Vec<_>>>()?;

        Self::from_rows(&rows)
    }
}

impl From<PatternGrid> for Vec<Vec<u8>> {
    fn from(grid: PatternGrid) -> Self {
        grid.cells
            .chunks(grid.steps.max(1))
            .take(grid.rows)
            .map(|row| row.iter().map(|c| u8::from(*c)).collect())
            .collect()
    }
}

impl fmt::Display for PatternGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            let label = Instrument::from_row(row).map(Instrument::name).unwrap_or("?");
            write!(f, "{:>10} ", label)?;
            for col in 0..self.steps {
                f.write_str(if self.is_active(row, col) { "x" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
