use crate::error::{ChartError, ChartResult};
use crate::model::song::TempoPoint;
use crate::model::time::{BEATS_PER_BAR, RowTime};
use log::debug;

/// Rows per bar at which a simfile may change tempo.
pub const TEMPO_GRID: i64 = 192;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Wall-clock length of `bars` bars played at `bpm` quarter notes per minute.
pub fn bar_duration_secs(bars: f64, bpm: f64) -> f64 {
    bars * BEATS_PER_BAR as f64 * SECONDS_PER_MINUTE / bpm
}

/// Moves every tempo point onto the [`TEMPO_GRID`] without changing when anything plays.
///
/// Snapping point `i` stretches or squeezes the segments on both sides of it, so
/// the bpm of the preceding segment and of point `i`'s own segment are scaled by
/// the ratio of new to old segment length. Points are processed in order, each
/// against the already-adjusted previous point.
///
/// The first point keeps its bpm: [`seconds_at`] plays the lead-in from bar 0 at
/// that bpm too, so moving it changes nothing before the second point.
pub fn resync_tempo(points: &[TempoPoint]) -> ChartResult<Vec<TempoPoint>> {
    if points.is_empty() {
        return Err(ChartError::EmptyTempoTimeline);
    }
    check_order(points)?;

    let mut synced = points.to_vec();
    for i in 0..synced.len() {
        if synced[i].time.is_on_grid(TEMPO_GRID) {
            continue;
        }

        let row = synced[i].time.absolute_bar();
        let new_time = RowTime::new(0, (row * TEMPO_GRID as f64).round() as i64, TEMPO_GRID)?;
        let new_row = new_time.absolute_bar();

        if i > 0 {
            let previous = synced[i - 1].time.absolute_bar();
            if new_row <= previous {
                return Err(ChartError::TempoOrderingViolation {
                    index: i,
                    bar: new_row,
                    previous,
                });
            }
            synced[i - 1].bpm *= (new_row - previous) / (row - previous);
        }

        if let Some(next) = synced.get(i + 1).map(|p| p.time.absolute_bar()) {
            if new_row >= next {
                return Err(ChartError::TempoOrderingViolation {
                    index: i + 1,
                    bar: next,
                    previous: new_row,
                });
            }
            if i > 0 {
                synced[i].bpm *= (next - new_row) / (next - row);
            }
        }

        debug!(
            "Resynced tempo point {} from {} to {} ({} bpm)",
            i, synced[i].time, new_time, synced[i].bpm
        );
        synced[i].time = new_time;
    }

    Ok(synced)
}

fn check_order(points: &[TempoPoint]) -> ChartResult<()> {
    for (i, pair) in points.windows(2).enumerate() {
        let previous = pair[0].time.absolute_bar();
        let bar = pair[1].time.absolute_bar();
        if bar <= previous {
            return Err(ChartError::TempoOrderingViolation {
                index: i + 1,
                bar,
                previous,
            });
        }
    }

    for point in points {
        if !(point.bpm.is_finite() && point.bpm > 0.0) {
            return Err(ChartError::InvalidBpm(point.bpm));
        }
    }

    Ok(())
}

/// Seconds elapsed from bar 0 until `target`.
///
/// Each point's bpm governs until the next point; the last point's bpm governs
/// everything after it, and the first point's bpm also covers any stretch between
/// bar 0 and that point.
pub fn seconds_at(points: &[TempoPoint], target: &RowTime) -> f64 {
    let target = target.absolute_bar();
    let mut position = 0.0;
    let mut seconds = 0.0;

    for (i, point) in points.iter().enumerate() {
        if position >= target {
            break;
        }

        let segment_end = points
            .get(i + 1)
            .map_or(target, |next| next.time.absolute_bar().min(target));

        if segment_end > position {
            seconds += bar_duration_secs(segment_end - position, point.bpm);
            position = segment_end;
        }
    }

    seconds
}
