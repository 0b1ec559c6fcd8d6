use crate::model::library::{ChartImporter, ImportOutcome, Library};
use crate::model::song::Song;
use crate::util::escape_filename;
use crate::writer::write_simfile;
use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

pub const SIMFILE_NAME: &str = "file.sm";

/// `<library>/<song>/<chart>/<file>.mc`
const CHART_DEPTH: usize = 3;

/// Counts of what happened to each chart file while building a library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub duplicates: usize,
    pub filtered: usize,
    pub failed: usize,
}

/// Chart files of a library directory in a stable order.
pub fn find_chart_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(CHART_DEPTH)
        .max_depth(CHART_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect()
}

/// Imports every chart file under `dir`. A broken chart is logged and skipped.
pub fn build_library<I: ChartImporter>(
    dir: &Path,
    limit: Option<usize>,
    importer: &I,
) -> Result<(Library, ImportSummary)> {
    if !dir.is_dir() {
        return Err(anyhow!("{} is not a directory..!", dir.display()));
    }

    let mut paths = find_chart_files(dir, importer.extension());
    if let Some(limit) = limit {
        paths.truncate(limit);
    }
    info!("Importing {} chart files from '{}'...", paths.len(), dir.display());

    let mut library = Library::new();
    let mut summary = ImportSummary::default();

    for path in paths {
        match importer.import(&path, &mut library) {
            Ok(ImportOutcome::Added) => summary.added += 1,
            Ok(ImportOutcome::Duplicate) => summary.duplicates += 1,
            Ok(ImportOutcome::Filtered(reason)) => {
                debug!("Filtered {}: {}", path.display(), reason);
                summary.filtered += 1;
            }
            Err(e) => {
                error!("Error while importing {}: {:#}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    Ok((library, summary))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub written: usize,
    pub failed: usize,
    pub skipped_charts: usize,
    /// Set when the batch was stopped before every song was written.
    pub interrupted: bool,
}

/// Name of a song's directory inside the pack.
pub fn song_dir_name(song: &Song) -> String {
    match song.source_id {
        Some(id) => escape_filename(&format!("{} [{}]", song.title, id)),
        None => escape_filename(&song.title),
    }
}

/// Writes each song into its own directory under `output_dir`.
///
/// `stop` is checked between songs, so the song being written is always finished.
pub fn assemble_pack(songs: &[Song], output_dir: &Path, stop: &AtomicBool) -> Result<PackSummary> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let mut summary = PackSummary::default();

    for song in songs {
        if stop.load(Ordering::SeqCst) {
            warn!("Stopping before '{}'..!", song.title);
            summary.interrupted = true;
            break;
        }

        match write_song(song, output_dir) {
            Ok(skipped) => {
                summary.written += 1;
                summary.skipped_charts += skipped;
            }
            Err(e) => {
                error!("Error while writing '{}': {:#}", song.title, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Wrote {} songs into '{}' ({} failed, {} charts skipped)..!",
        summary.written,
        output_dir.display(),
        summary.failed,
        summary.skipped_charts
    );

    Ok(summary)
}

/// Returns the number of charts left out of the simfile.
fn write_song(song: &Song, output_dir: &Path) -> Result<usize> {
    let simfile = write_simfile(song)?;
    for skipped in &simfile.skipped {
        warn!("'{}' lost chart '{}': {}", song.title, skipped.label, skipped.error);
    }

    let target_dir = output_dir.join(song_dir_name(song));
    fs::create_dir_all(&target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    let source_dir = song
        .charts()
        .first()
        .and_then(|chart| chart.source_path.as_deref())
        .and_then(Path::parent);
    if let Some(source_dir) = source_dir {
        copy_song_files(source_dir, &target_dir)?;
    }

    let target = target_dir.join(SIMFILE_NAME);
    fs::write(&target, simfile.text)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    info!("Wrote '{}'", target.display());

    Ok(simfile.skipped.len())
}

/// Copies audio, images and the rest of a chart directory. Source charts keep an
/// `.old` suffix so the game does not pick them up, and existing files are kept.
fn copy_song_files(source_dir: &Path, target_dir: &Path) -> Result<()> {
    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read {}", source_dir.display()))?;
        let relative = entry.path().strip_prefix(source_dir)?;
        let mut target = target_dir.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if target.extension().is_some_and(|ext| ext == "mc") {
            target.set_extension("mc.old");
        }
        if target.exists() {
            debug!("Keeping existing {}", target.display());
            continue;
        }

        fs::copy(entry.path(), &target).with_context(|| {
            format!("Failed to copy {} to {}", entry.path().display(), target.display())
        })?;
    }

    Ok(())
}
