use crate::engine::seconds_at;
use crate::model::library::{ChartImporter, ImportOutcome, Library};
use crate::model::song::{ChartBuilder, Note, NoteKind, SongBuilder, TempoPoint};
use crate::model::time::{RawBeat, RowTime, parse_raw_beat};
use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Malody `meta.mode` of key-mode charts; every other mode is skipped.
const KEY_MODE: i64 = 0;
const MAX_GUESSED_DIFFICULTY: u32 = 100;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

type Unknown = BTreeMap<String, Value>;

#[derive(Debug, Deserialize)]
struct McFile {
    meta: McMeta,
    #[serde(default)]
    time: Vec<McTempo>,
    #[serde(default)]
    note: Vec<McEvent>,
}

#[derive(Debug, Deserialize)]
struct McMeta {
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    version: String,
    #[serde(default)]
    background: Option<String>,
    #[serde(default)]
    video: Option<String>,
    #[serde(default)]
    mode: i64,
    song: McSong,
    mode_ext: McModeExt,
    #[serde(rename = "$ver", default)]
    _ver: Option<Value>,
    #[serde(rename = "id", default)]
    _id: Option<Value>,
    #[serde(rename = "time", default)]
    _time: Option<Value>,
    #[serde(rename = "preview", default)]
    _preview: Option<Value>,
    #[serde(flatten)]
    unknown: Unknown,
}

#[derive(Debug, Deserialize)]
struct McSong {
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    titleorg: Option<String>,
    #[serde(default)]
    artistorg: Option<String>,
    #[serde(default)]
    org: Option<McOrg>,
    id: u64,
    #[serde(flatten)]
    unknown: Unknown,
}

#[derive(Debug, Deserialize)]
struct McOrg {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
}

#[derive(Debug, Deserialize)]
struct McModeExt {
    column: usize,
    #[serde(rename = "bar_begin", default)]
    _bar_begin: Option<Value>,
    #[serde(flatten)]
    unknown: Unknown,
}

#[derive(Debug, Deserialize)]
struct McTempo {
    beat: RawBeat,
    bpm: f64,
    #[serde(flatten)]
    unknown: Unknown,
}

#[derive(Debug, Deserialize)]
struct McEvent {
    beat: RawBeat,
    #[serde(default)]
    endbeat: Option<RawBeat>,
    #[serde(default)]
    column: Option<usize>,
    #[serde(default)]
    sound: Option<String>,
    /// Song volume. Simfiles have no equivalent.
    #[serde(rename = "vol", default)]
    _vol: Option<Value>,
    #[serde(rename = "type", default)]
    _kind: Option<Value>,
    /// Audio offset in milliseconds.
    #[serde(default)]
    offset: Option<f64>,
    #[serde(flatten)]
    unknown: Unknown,
}

impl McFile {
    /// Dotted paths of every field this importer does not know about.
    fn unknown_fields(&self) -> Vec<String> {
        let prefixed = |prefix: &str, unknown: &Unknown| {
            unknown
                .keys()
                .map(|key| format!("{}{}", prefix, key))
                .collect::<Vec<_>>()
        };

        let mut fields = prefixed("meta.", &self.meta.unknown);
        fields.extend(prefixed("meta.song.", &self.meta.song.unknown));
        fields.extend(prefixed("meta.mode_ext.", &self.meta.mode_ext.unknown));
        for tempo in &self.time {
            fields.extend(prefixed("time[].", &tempo.unknown));
        }
        for event in &self.note {
            fields.extend(prefixed("note[].", &event.unknown));
        }

        fields.sort();
        fields.dedup();
        fields
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MalodyOptions {
    /// Reject charts carrying fields this importer does not understand.
    pub verify: bool,
    /// Only import charts with this many columns.
    pub keymode_filter: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MalodyImporter {
    pub options: MalodyOptions,
}

impl MalodyImporter {
    pub fn new(options: MalodyOptions) -> Self {
        Self { options }
    }
}

impl ChartImporter for MalodyImporter {
    fn extension(&self) -> &'static str {
        "mc"
    }

    fn import(&self, path: &Path, library: &mut Library) -> Result<ImportOutcome> {
        import_mc_file(path, library, self.options)
    }
}

pub fn import_mc_file<P: AsRef<Path>>(
    path: P,
    library: &mut Library,
    options: MalodyOptions,
) -> Result<ImportOutcome> {
    let bytes = fs::read(path.as_ref())
        .with_context(|| format!("Failed to read chart file {}", path.as_ref().display()))?;

    mc_bytes_to_chart(&bytes, path.as_ref(), library, options)
}

pub fn mc_bytes_to_chart(
    bytes: &[u8],
    source_path: &Path,
    library: &mut Library,
    options: MalodyOptions,
) -> Result<ImportOutcome> {
    let mc: McFile = serde_json::from_slice(bytes)
        .with_context(|| format!("Failed to parse Malody chart {}", source_path.display()))?;

    if mc.meta.mode != KEY_MODE {
        return Ok(ImportOutcome::Filtered(format!(
            "mode {} is not key mode",
            mc.meta.mode
        )));
    }

    let unknown = mc.unknown_fields();
    if !unknown.is_empty() {
        if options.verify {
            bail!(
                "Unknown fields in {}: {}",
                source_path.display(),
                unknown.join(", ")
            );
        }
        debug!("Ignoring unknown fields: {}", unknown.join(", "));
    }

    let num_columns = mc.meta.mode_ext.column;
    if let Some(keymode) = options.keymode_filter
        && keymode != num_columns
    {
        return Ok(ImportOutcome::Filtered(format!(
            "{}k chart while importing {}k",
            num_columns, keymode
        )));
    }

    let tempo = parse_tempo(&mc.time);

    let mut chart = ChartBuilder::new(num_columns)
        .creator(mc.meta.creator.clone())
        .label(mc.meta.version.clone())
        .background(mc.meta.background.clone())
        .video(mc.meta.video.clone())
        .difficulty(guess_difficulty(&mc.meta.version, num_columns))
        .source_path(Some(source_path.to_path_buf()));

    let mut events: Vec<&McEvent> = mc.note.iter().collect();
    events.sort_by_key(|event| event.beat.beats);

    let mut audio: Option<(String, f64)> = None;
    for event in events {
        if let Some(column) = event.column {
            add_note_event(&mut chart, column, event);
        }

        let Some(sound) = &event.sound else {
            continue;
        };

        if audio.is_some() {
            chart.mark_keysounded();
            continue;
        }

        if event.column.is_some_and(|column| column < num_columns) {
            warn!("Song audio '{}' comes from a keysound on a playable column..!", sound);
        }

        // Audio may start later than bar 0, which the offset has to account for.
        let start = match parse_raw_beat(event.beat) {
            Ok(row) => seconds_at(&tempo, &row),
            Err(e) => {
                warn!("Audio event at {} has an unusable position: {}", event.beat, e);
                0.0
            }
        };
        let offset_ms = event.offset.unwrap_or(0.0);
        audio = Some((sound.clone(), start + offset_ms / 1000.0));
    }

    if chart.dropped_notes() > 0 {
        warn!(
            "Dropped {} note(s) outside the {} columns of {}..!",
            chart.dropped_notes(),
            num_columns,
            source_path.display()
        );
    }

    let chart = chart.build()?;
    let song = library.song_entry(mc.meta.song.id);

    if song.charts().iter().any(|c| c.is_duplicate_of(&chart)) {
        debug!("Skipping duplicate chart '{}'", chart.label);
        return Ok(ImportOutcome::Duplicate);
    }

    apply_song_info(song, &mc.meta.song);
    song.set_tempo(tempo);

    match audio {
        Some((sound, offset)) => {
            song.audio = Some(sound);
            song.offset = Some(offset);
        }
        None => warn!("No audio file detected in {}..!", source_path.display()),
    }

    info!(
        "Imported {}k chart '{}' ({} notes) for '{}'",
        num_columns,
        chart.label,
        chart.notes().len(),
        song.title.as_deref().unwrap_or_default()
    );
    song.add_chart(chart);

    Ok(ImportOutcome::Added)
}

fn parse_tempo(events: &[McTempo]) -> Vec<TempoPoint> {
    let mut points: Vec<TempoPoint> = Vec::with_capacity(events.len());

    for event in events {
        if !(event.bpm.is_finite() && event.bpm > 0.0) {
            warn!("Skipping tempo change at {} to {} bpm..!", event.beat, event.bpm);
            continue;
        }

        match parse_raw_beat(event.beat) {
            Ok(time) => points.push(TempoPoint::new(time, event.bpm)),
            Err(e) => warn!("Skipping tempo change at {}: {}", event.beat, e),
        }
    }

    points.sort_by(|a, b| a.time.absolute_bar().total_cmp(&b.time.absolute_bar()));
    points
}

fn add_note_event(chart: &mut ChartBuilder, column: usize, event: &McEvent) {
    let time = match parse_raw_beat(event.beat) {
        Ok(time) => time,
        Err(e) => {
            warn!("Skipping note at {}: {}", event.beat, e);
            return;
        }
    };

    let end: Option<RowTime> = match event.endbeat.map(parse_raw_beat).transpose() {
        Ok(end) => end,
        Err(e) => {
            warn!("Skipping hold at {} with a broken end: {}", event.beat, e);
            return;
        }
    };

    let kind = if end.is_some() {
        NoteKind::HoldHead
    } else {
        NoteKind::Tap
    };

    // Malody ignores notes on lanes the chart does not have, and so do we.
    if chart.push_note(Note::new(column, time, kind)).is_err() {
        return;
    }

    if let Some(end) = end {
        let _ = chart.push_note(Note::new(column, end, NoteKind::Tail));
    }
}

/// Malody stores romanised names in the main fields and originals in `*org`.
fn apply_song_info(song: &mut SongBuilder, info: &McSong) {
    song.title = Some(info.title.clone());
    song.artist = Some(info.artist.clone());

    if let Some(title) = &info.titleorg {
        song.title_translit = song.title.replace(title.clone());
    }
    if let Some(artist) = &info.artistorg {
        song.artist_translit = song.artist.replace(artist.clone());
    }

    if let Some(org) = &info.org {
        if let Some(title) = org.title.as_ref().filter(|t| !t.is_empty()) {
            song.title_translit = song.title.replace(title.clone());
        }
        if let Some(artist) = org.artist.as_ref().filter(|a| !a.is_empty()) {
            song.artist_translit = song.artist.replace(artist.clone());
        }
    }
}

/// A difficulty number from a label like "4K Lv.17", if exactly one candidate exists.
pub fn guess_difficulty(label: &str, num_columns: usize) -> Option<u32> {
    let candidates: Vec<u32> = DIGITS
        .find_iter(label)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .filter(|&n| n as usize != num_columns && n < MAX_GUESSED_DIFFICULTY)
        .collect();

    match candidates.as_slice() {
        [difficulty] => Some(*difficulty),
        _ => None,
    }
}
