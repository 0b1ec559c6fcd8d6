use thiserror::Error;

/// Failures raised while normalizing, resolving or serializing chart timing.
///
/// Only some of these abort anything: `RoundingAnomaly` and `OutOfRangeColumn` are
/// reported and the offending value is kept or dropped, `InvalidSnap` and
/// `PositionOverflow` lose a single note or tempo point, `UnknownColumnCount` and
/// `ChartTooLong` lose one chart, and everything else loses one song.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("Invalid snap {snap}, denominators must be positive..!")]
    InvalidSnap { snap: i64 },

    #[error("Beat {value} is {error:.6} away from the nearest grid row, rounding anyway..!")]
    RoundingAnomaly { value: f64, error: f64 },

    #[error("Position {bar} + {beat}/{snap} does not fit in a chart..!")]
    PositionOverflow { bar: i64, beat: i64, snap: i64 },

    #[error("Chart runs to bar {last_bar}, past the {max_bars} bars a simfile chart may have..!")]
    ChartTooLong { last_bar: i64, max_bars: i64 },

    #[error("Column {column} does not exist on a {num_columns}-column chart..!")]
    OutOfRangeColumn { column: usize, num_columns: usize },

    #[error("No simfile chart type exists for {0} columns..!")]
    UnknownColumnCount(usize),

    #[error("Tempo of {0} bpm cannot be integrated..!")]
    InvalidBpm(f64),

    #[error("Tempo point {index} at bar {bar} would no longer be strictly after bar {previous}..!")]
    TempoOrderingViolation { index: usize, bar: f64, previous: f64 },

    #[error("A song needs at least one tempo point..!")]
    EmptyTempoTimeline,

    #[error("A chart needs at least one column..!")]
    NoColumns,

    #[error("Missing required song field `{0}`..!")]
    MissingMetadata(&'static str),
}

pub type ChartResult<T> = Result<T, ChartError>;
