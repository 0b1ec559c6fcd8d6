use crate::model::song::Note;
use crate::model::time::RowTime;
use crate::util::{gcd_all, lcm};
use log::debug;
use std::iter;

/// Finest subdivision a simfile bar can carry.
pub const MAX_BAR_SNAP: u64 = 192;

/// Coarsest subdivision written for a bar, populated or not.
pub const MIN_BAR_SNAP: u64 = 4;

const EMPTY_CELL: char = '0';

/// Smallest number of rows that places every note of one bar on a whole row.
///
/// The result is at least [`MIN_BAR_SNAP`] and at most [`MAX_BAR_SNAP`]; notes that
/// need a finer grid than the cap are rounded onto the nearest row by [`slot_index`].
pub fn resolve_bar_snap(notes: &[&Note]) -> u64 {
    if notes.is_empty() {
        return MIN_BAR_SNAP;
    }

    let Some(combined) = lcm(notes.iter().map(|note| note.time.snap() as u64)) else {
        debug!(
            "Snap of {} notes overflows, falling back to {}",
            notes.len(),
            MAX_BAR_SNAP
        );
        return MAX_BAR_SNAP;
    };

    // Row of every note on the combined grid; exact since `beat < snap` divides `combined`.
    let rows = notes
        .iter()
        .map(|note| note.time.beat() as u64 * (combined / note.time.snap() as u64));
    let common = gcd_all(iter::once(combined).chain(rows));

    let mut snap = combined / common;
    while snap < MIN_BAR_SNAP {
        snap *= 2;
    }

    snap.min(MAX_BAR_SNAP)
}

/// Row index of `time` inside its bar on a grid of `snap` rows, always `< snap`.
pub fn slot_index(time: &RowTime, snap: u64) -> usize {
    let exact = time.beat() as f64 / time.snap() as f64 * snap as f64;
    (exact.round() as usize).min(snap as usize - 1)
}

/// The rows of one bar, one character per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarGrid {
    rows: Vec<Vec<char>>,
}

impl BarGrid {
    pub fn empty(num_columns: usize) -> Self {
        Self {
            rows: vec![vec![EMPTY_CELL; num_columns]; MIN_BAR_SNAP as usize],
        }
    }

    /// Lays out the notes of one bar. Later notes overwrite earlier ones on the same cell.
    pub fn from_notes(notes: &[&Note], num_columns: usize) -> Self {
        let snap = resolve_bar_snap(notes);
        let mut rows = vec![vec![EMPTY_CELL; num_columns]; snap as usize];

        for note in notes {
            let slot = slot_index(&note.time, snap);
            let Some(cell) = rows[slot].get_mut(note.column) else {
                debug!("Skipping note on missing column {}", note.column);
                continue;
            };

            if *cell != EMPTY_CELL {
                debug!(
                    "Note at {} column {} overwrites '{}'",
                    note.time, note.column, cell
                );
            }
            *cell = note.kind.symbol();
        }

        Self { rows }
    }

    pub fn snap(&self) -> usize {
        self.rows.len()
    }

    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
