use crate::error::ChartError;
use crate::model::song::{Song, SongBuilder};
use anyhow::Result;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// What happened to one chart file handed to an importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Added,
    /// The same chart was already imported for this song.
    Duplicate,
    /// The file is valid but excluded, e.g. a non key-mode chart or another keymode.
    Filtered(String),
}

/// A reader for one source chart format.
pub trait ChartImporter {
    /// File extension (without the dot) of the charts this importer reads.
    fn extension(&self) -> &'static str;

    /// Parses one chart file into the library, merging it into its song.
    fn import(&self, path: &Path, library: &mut Library) -> Result<ImportOutcome>;
}

/// Songs under construction, keyed by their id in the source game.
#[derive(Debug, Default)]
pub struct Library {
    songs: Vec<SongBuilder>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// The song with this source id, created empty on first use.
    pub fn song_entry(&mut self, source_id: u64) -> &mut SongBuilder {
        let index = match self
            .songs
            .iter()
            .position(|song| song.source_id == Some(source_id))
        {
            Some(index) => index,
            None => {
                debug!("New song with source id {}", source_id);
                let mut song = SongBuilder::new();
                song.source_id = Some(source_id);
                self.songs.push(song);
                self.songs.len() - 1
            }
        };

        &mut self.songs[index]
    }

    pub fn find(&self, source_id: u64) -> Option<&SongBuilder> {
        self.songs
            .iter()
            .find(|song| song.source_id == Some(source_id))
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Builds every song. Songs without charts are dropped quietly, songs that fail to
    /// build are dropped and reported.
    pub fn build(self) -> LibraryBuild {
        let mut songs = Vec::new();
        let mut failures = Vec::new();

        for builder in self.songs {
            if builder.charts().is_empty() {
                debug!(
                    "Dropping song {:?} without charts",
                    builder.title.as_deref().unwrap_or("<untitled>")
                );
                continue;
            }

            let name = builder
                .title
                .clone()
                .or_else(|| builder.source_id.map(|id| format!("#{}", id)))
                .unwrap_or_else(|| "<untitled>".into());

            match builder.build() {
                Ok(song) => songs.push(song),
                Err(error) => {
                    warn!("Dropping song '{}': {}", name, error);
                    failures.push(FailedSong { name, error });
                }
            }
        }

        LibraryBuild { songs, failures }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedSong {
    pub name: String,
    pub error: ChartError,
}

#[derive(Debug, Clone)]
pub struct LibraryBuild {
    pub songs: Vec<Song>,
    pub failures: Vec<FailedSong>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LibraryStats {
    pub songs: usize,
    pub charts: usize,
    /// Number of charts per column count.
    pub keymodes: BTreeMap<usize, usize>,
}

impl LibraryStats {
    pub fn of(songs: &[Song]) -> Self {
        let mut stats = Self {
            songs: songs.len(),
            ..Default::default()
        };

        for chart in songs.iter().flat_map(|song| song.charts()) {
            stats.charts += 1;
            *stats.keymodes.entry(chart.num_columns).or_default() += 1;
        }

        stats
    }
}

impl fmt::Display for LibraryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} songs, {} charts", self.songs, self.charts)?;
        let keymodes = self
            .keymodes
            .iter()
            .map(|(keys, count)| format!("{}k: {}", keys, count))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}", keymodes)
    }
}
