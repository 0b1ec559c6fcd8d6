//! Timing core: per-bar grid resolution, tempo resync and time integration.

pub mod grid;
pub mod tempo;

pub use grid::{BarGrid, MAX_BAR_SNAP, MIN_BAR_SNAP, resolve_bar_snap, slot_index};
pub use tempo::{TEMPO_GRID, bar_duration_secs, resync_tempo, seconds_at};
