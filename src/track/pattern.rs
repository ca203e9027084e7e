// Patterns - per-step trigger data for a track
// Resizing truncates or zero-pads; it never reallocates identity

use serde::{Deserialize, Serialize};

/// Number of scale-degree rows cells a Bass/Poly step carries
pub const DEGREES_PER_STEP: usize = 8;

/// Boolean step grid for a drum track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumPattern {
    steps: Vec<bool>,
}

impl DrumPattern {
    pub fn new(step_count: usize) -> Self {
        Self {
            steps: vec![false; step_count],
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the given step is active; out-of-range reads are inert
    pub fn is_active(&self, step: usize) -> bool {
        self.steps.get(step).copied().unwrap_or(false)
    }

    pub fn set(&mut self, step: usize, active: bool) {
        if let Some(cell) = self.steps.get_mut(step) {
            *cell = active;
        }
    }

    pub fn toggle(&mut self, step: usize) {
        if let Some(cell) = self.steps.get_mut(step) {
            *cell = !*cell;
        }
    }

    /// Truncate or pad with inactive steps to the new length
    pub fn resize(&mut self, step_count: usize) {
        self.steps.resize(step_count, false);
    }

    pub fn clear(&mut self) {
        self.steps.iter_mut().for_each(|s| *s = false);
    }
}

/// Per-step rows of scale-degree cells for bass and poly tracks.
///
/// For Bass, the first active cell in a row picks the note; for Poly,
/// any active cell gates the current chord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPattern {
    rows: Vec<Vec<bool>>,
    degrees: usize,
}

impl RowPattern {
    pub fn new(step_count: usize) -> Self {
        Self::with_degrees(step_count, DEGREES_PER_STEP)
    }

    pub fn with_degrees(step_count: usize, degrees: usize) -> Self {
        Self {
            rows: vec![vec![false; degrees]; step_count],
            degrees,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn degrees(&self) -> usize {
        self.degrees
    }

    /// The row for a step; out-of-range steps read as an empty row
    pub fn row(&self, step: usize) -> &[bool] {
        static EMPTY: [bool; 0] = [];
        self.rows.get(step).map(|r| r.as_slice()).unwrap_or(&EMPTY)
    }

    pub fn is_cell_active(&self, step: usize, degree: usize) -> bool {
        self.rows
            .get(step)
            .and_then(|r| r.get(degree))
            .copied()
            .unwrap_or(false)
    }

    pub fn set_cell(&mut self, step: usize, degree: usize, active: bool) {
        if let Some(cell) = self.rows.get_mut(step).and_then(|r| r.get_mut(degree)) {
            *cell = active;
        }
    }

    pub fn toggle_cell(&mut self, step: usize, degree: usize) {
        if let Some(cell) = self.rows.get_mut(step).and_then(|r| r.get_mut(degree)) {
            *cell = !*cell;
        }
    }

    /// Lowest-indexed active degree in a step's row, if any (Bass rule)
    pub fn first_active_degree(&self, step: usize) -> Option<usize> {
        self.row(step).iter().position(|&cell| cell)
    }

    /// Whether any cell in the step's row is active (Poly gate rule)
    pub fn any_active(&self, step: usize) -> bool {
        self.row(step).iter().any(|&cell| cell)
    }

    /// Truncate or pad with empty rows to the new length
    pub fn resize(&mut self, step_count: usize) {
        let degrees = self.degrees;
        self.rows.resize_with(step_count, || vec![false; degrees]);
    }

    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.iter_mut().for_each(|c| *c = false);
        }
    }
}
