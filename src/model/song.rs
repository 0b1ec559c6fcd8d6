use crate::error::{ChartError, ChartResult};
use crate::model::time::RowTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Tap,
    HoldHead,
    RollHead,
    Tail,
    Mine,
}

impl NoteKind {
    /// The character written into a simfile note row.
    pub fn symbol(self) -> char {
        match self {
            NoteKind::Tap => '1',
            NoteKind::HoldHead => '2',
            NoteKind::Tail => '3',
            NoteKind::RollHead => '4',
            NoteKind::Mine => 'M',
        }
    }
}

/// A single point event. Holds and rolls are a head note plus a separate `Tail`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub column: usize,
    pub time: RowTime,
    pub kind: NoteKind,
}

impl Note {
    pub fn new(column: usize, time: RowTime, kind: NoteKind) -> Self {
        Self { column, time, kind }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TempoPoint {
    pub time: RowTime,
    pub bpm: f64,
}

impl TempoPoint {
    pub fn new(time: RowTime, bpm: f64) -> Self {
        Self { time, bpm }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Chart {
    pub creator: Option<String>,
    pub label: String,
    pub background: Option<String>,
    pub video: Option<String>,
    pub num_columns: usize,
    pub difficulty: Option<u32>,
    pub may_be_keysounded: bool,
    pub source_path: Option<PathBuf>,
    notes: Vec<Note>,
}

impl Chart {
    /// Notes in chronological order; simultaneous notes keep their insertion order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Whether two charts are the same chart imported twice.
    pub fn is_duplicate_of(&self, other: &Chart) -> bool {
        self.creator == other.creator
            && self.label == other.label
            && self.num_columns == other.num_columns
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChartBuilder {
    creator: Option<String>,
    label: String,
    background: Option<String>,
    video: Option<String>,
    num_columns: usize,
    difficulty: Option<u32>,
    may_be_keysounded: bool,
    source_path: Option<PathBuf>,
    notes: Vec<Note>,
    dropped: usize,
}

impl ChartBuilder {
    pub fn new(num_columns: usize) -> Self {
        Self {
            num_columns,
            ..Default::default()
        }
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn creator(mut self, creator: Option<String>) -> Self {
        self.creator = creator;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn background(mut self, background: Option<String>) -> Self {
        self.background = background;
        self
    }

    pub fn video(mut self, video: Option<String>) -> Self {
        self.video = video;
        self
    }

    pub fn difficulty(mut self, difficulty: Option<u32>) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn source_path(mut self, path: Option<PathBuf>) -> Self {
        self.source_path = path;
        self
    }

    pub fn mark_keysounded(&mut self) {
        self.may_be_keysounded = true;
    }

    /// Adds a note, or drops it when its lane does not exist on this chart.
    pub fn push_note(&mut self, note: Note) -> ChartResult<()> {
        if note.column >= self.num_columns {
            self.dropped += 1;
            let err = ChartError::OutOfRangeColumn {
                column: note.column,
                num_columns: self.num_columns,
            };
            debug!("Dropping note at {}: {}", note.time, err);
            return Err(err);
        }

        self.notes.push(note);
        Ok(())
    }

    pub fn dropped_notes(&self) -> usize {
        self.dropped
    }

    pub fn build(mut self) -> ChartResult<Chart> {
        if self.num_columns == 0 {
            return Err(ChartError::NoColumns);
        }

        self.notes
            .sort_by(|a, b| a.time.absolute_bar().total_cmp(&b.time.absolute_bar()));

        Ok(Chart {
            creator: self.creator,
            label: self.label,
            background: self.background,
            video: self.video,
            num_columns: self.num_columns,
            difficulty: self.difficulty,
            may_be_keysounded: self.may_be_keysounded,
            source_path: self.source_path,
            notes: self.notes,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Song {
    pub title: String,
    pub title_translit: Option<String>,
    pub artist: String,
    pub artist_translit: Option<String>,
    pub creator: Option<String>,
    pub audio: Option<String>,
    /// Audio offset in seconds.
    pub offset: Option<f64>,
    pub source_id: Option<u64>,
    charts: Vec<Chart>,
    tempo: Vec<TempoPoint>,
}

impl Song {
    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// The shared tempo timeline, ordered by position and never empty.
    pub fn tempo(&self) -> &[TempoPoint] {
        &self.tempo
    }

    /// Every credited creator, first-seen order, without duplicates.
    pub fn creators(&self) -> Vec<&str> {
        let mut creators: Vec<&str> = Vec::new();
        let candidates = self
            .charts
            .iter()
            .filter_map(|chart| chart.creator.as_deref())
            .chain(self.creator.as_deref());

        for creator in candidates {
            if !creators.contains(&creator) {
                creators.push(creator);
            }
        }

        creators
    }

    /// Only the first chart's background is kept for the song.
    pub fn background(&self) -> Option<&str> {
        self.charts.first().and_then(|chart| chart.background.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SongBuilder {
    pub title: Option<String>,
    pub title_translit: Option<String>,
    pub artist: Option<String>,
    pub artist_translit: Option<String>,
    pub creator: Option<String>,
    pub audio: Option<String>,
    pub offset: Option<f64>,
    pub source_id: Option<u64>,
    charts: Vec<Chart>,
    tempo: Vec<TempoPoint>,
}

impl SongBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    pub fn tempo(&self) -> &[TempoPoint] {
        &self.tempo
    }

    /// Replaces the timeline. Points are ordered by position and, when two share a
    /// position exactly, the later one wins.
    pub fn set_tempo(&mut self, mut points: Vec<TempoPoint>) {
        points.sort_by(|a, b| a.time.absolute_bar().total_cmp(&b.time.absolute_bar()));

        let mut tempo: Vec<TempoPoint> = Vec::with_capacity(points.len());
        for point in points {
            if let Some(last) = tempo.last_mut()
                && last.time.absolute_bar() == point.time.absolute_bar()
            {
                debug!(
                    "Tempo {} at {} replaces {} at the same position",
                    point.bpm, point.time, last.bpm
                );
                *last = point;
                continue;
            }
            tempo.push(point);
        }

        self.tempo = tempo;
    }

    /// Adds a chart unless an identical one is already present. Returns whether it was added.
    pub fn add_chart(&mut self, chart: Chart) -> bool {
        if self.charts.iter().any(|c| c.is_duplicate_of(&chart)) {
            return false;
        }

        self.charts.push(chart);
        true
    }

    pub fn build(self) -> ChartResult<Song> {
        let title = self.title.ok_or(ChartError::MissingMetadata("title"))?;
        let artist = self.artist.ok_or(ChartError::MissingMetadata("artist"))?;

        if self.tempo.is_empty() {
            return Err(ChartError::EmptyTempoTimeline);
        }

        Ok(Song {
            title,
            title_translit: self.title_translit,
            artist,
            artist_translit: self.artist_translit,
            creator: self.creator,
            audio: self.audio,
            offset: self.offset,
            source_id: self.source_id,
            charts: self.charts,
            tempo: self.tempo,
        })
    }
}
