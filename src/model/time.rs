use crate::error::{ChartError, ChartResult};
use crate::util::is_whole;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Malody counts whole beats, four of them to a bar.
pub const BEATS_PER_BAR: i64 = 4;

/// An exact position in musical time: `bar + beat / snap` bars.
///
/// Always normalized, so `0 <= beat < snap` holds for every value that exists.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowTime {
    bar: i64,
    beat: i64,
    snap: i64,
}

impl RowTime {
    /// Folds any `beat` outside `0..snap` into `bar`.
    pub fn new(bar: i64, beat: i64, snap: i64) -> ChartResult<Self> {
        if snap <= 0 {
            return Err(ChartError::InvalidSnap { snap });
        }

        let folded = bar
            .checked_add(beat.div_euclid(snap))
            .ok_or(ChartError::PositionOverflow { bar, beat, snap })?;

        Ok(Self {
            bar: folded,
            beat: beat.rem_euclid(snap),
            snap,
        })
    }

    pub fn bar(&self) -> i64 {
        self.bar
    }

    pub fn beat(&self) -> i64 {
        self.beat
    }

    pub fn snap(&self) -> i64 {
        self.snap
    }

    pub fn absolute_bar(&self) -> f64 {
        self.bar as f64 + self.beat as f64 / self.snap as f64
    }

    /// Position in quarter-note beats, the unit the simfile tempo field uses.
    pub fn absolute_beat(&self) -> f64 {
        self.absolute_bar() * BEATS_PER_BAR as f64
    }

    /// Whether this position sits exactly on a row of a `rows_per_bar` grid.
    pub fn is_on_grid(&self, rows_per_bar: i64) -> bool {
        is_whole(self.absolute_bar() * rows_per_bar as f64)
    }
}

impl fmt::Display for RowTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.bar, self.beat, self.snap)
    }
}

/// A `(beats, subbeat, subbeat_snap)` triple as it appears in a Malody chart.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "[i64; 3]", into = "[i64; 3]")]
pub struct RawBeat {
    pub beats: i64,
    pub subbeat: i64,
    pub subbeat_snap: i64,
}

impl RawBeat {
    pub fn new(beats: i64, subbeat: i64, subbeat_snap: i64) -> Self {
        Self {
            beats,
            subbeat,
            subbeat_snap,
        }
    }
}

impl From<[i64; 3]> for RawBeat {
    fn from([beats, subbeat, subbeat_snap]: [i64; 3]) -> Self {
        Self::new(beats, subbeat, subbeat_snap)
    }
}

impl From<RawBeat> for [i64; 3] {
    fn from(raw: RawBeat) -> Self {
        [raw.beats, raw.subbeat, raw.subbeat_snap]
    }
}

impl fmt::Display for RawBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.beats, self.subbeat, self.subbeat_snap)
    }
}

/// The outcome of normalizing a [`RawBeat`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub time: RowTime,
    /// Set when the scaled beat was not a whole number before rounding.
    pub anomaly: Option<ChartError>,
}

/// Converts a raw Malody triple into a [`RowTime`].
///
/// A negative `subbeat_snap` flips the sign of the whole fraction, sub-beats that
/// run past the end of the bar are folded into the following bar, and a scaled
/// beat that is not (almost) whole is rounded and reported through
/// [`Normalized::anomaly`] rather than failing.
///
/// Snaps too large to scale to a bar are `InvalidSnap`, positions outside `i64` are
/// `PositionOverflow`.
pub fn normalize_raw(raw: RawBeat) -> ChartResult<Normalized> {
    let RawBeat {
        beats,
        mut subbeat,
        mut subbeat_snap,
    } = raw;
    let invalid_snap = ChartError::InvalidSnap {
        snap: raw.subbeat_snap,
    };
    let overflow = ChartError::PositionOverflow {
        bar: raw.beats,
        beat: raw.subbeat,
        snap: raw.subbeat_snap,
    };

    if subbeat_snap == 0 {
        return Err(invalid_snap);
    }

    if subbeat_snap < 0 {
        subbeat_snap = subbeat_snap.checked_neg().ok_or(invalid_snap.clone())?;
        subbeat = subbeat.checked_neg().ok_or(overflow.clone())?;
    }

    let bar = beats.div_euclid(BEATS_PER_BAR);
    let quarter = beats.rem_euclid(BEATS_PER_BAR);
    let snap = subbeat_snap
        .checked_mul(BEATS_PER_BAR)
        .ok_or(invalid_snap)?;

    let beat_in_quarters = quarter as f64 + subbeat as f64 / subbeat_snap as f64;
    let scaled = beat_in_quarters / BEATS_PER_BAR as f64 * snap as f64;
    if !(scaled.abs() < i64::MAX as f64) {
        return Err(overflow);
    }

    let (beat, anomaly) = round_to_row(scaled);
    if let Some(anomaly) = &anomaly {
        warn!("{} while normalizing {}", anomaly, raw);
    }

    Ok(Normalized {
        time: RowTime::new(bar, beat, snap)?,
        anomaly,
    })
}

/// Nearest whole row to `scaled`, with a `RoundingAnomaly` when it was not already whole.
///
/// Integer triples scale to whole rows, so in practice this only fires on float
/// error with very large sub-beats.
fn round_to_row(scaled: f64) -> (i64, Option<ChartError>) {
    let row = scaled.round();
    if is_whole(scaled) {
        return (row as i64, None);
    }

    let anomaly = ChartError::RoundingAnomaly {
        value: scaled,
        error: (scaled - row).abs(),
    };
    (row as i64, Some(anomaly))
}

/// Like [`normalize_raw`] but only keeps the position; anomalies are already logged.
pub fn parse_raw_beat(raw: RawBeat) -> ChartResult<RowTime> {
    normalize_raw(raw).map(|normalized| normalized.time)
}
