use CHART_WELL::{Args, LibraryStats, MalodyImporter, MalodyOptions, assemble_pack, build_library};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let importer = MalodyImporter::new(MalodyOptions {
        verify: args.verify,
        keymode_filter: args.keymode,
    });

    info!("Importing Malody library: '{}'...", args.input.display());
    let (library, imported) = build_library(&args.input, args.limit, &importer)?;
    debug!("{:?}", imported);

    let built = library.build();
    for failure in &built.failures {
        warn!("Song '{}' cannot be converted: {}", failure.name, failure.error);
    }

    let stats = LibraryStats::of(&built.songs);
    println!("{}", stats);

    if args.verbose {
        for song in &built.songs {
            let charts = song
                .charts()
                .iter()
                .map(|chart| format!("{} ({}k)", chart.label, chart.num_columns))
                .collect::<Vec<_>>()
                .join(", ");
            println!("{} - {}: {}", song.artist, song.title, charts);
        }
    }

    if args.dry_run {
        info!("Dry run, not writing '{}'..!", args.output.display());
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_handler = Arc::clone(&stop);

    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, stopping after the current song..!");
        stop_for_handler.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler..!")?;

    let summary = assemble_pack(&built.songs, &args.output, &stop)?;
    println!(
        "Wrote {} songs ({} failed, {} charts skipped){}",
        summary.written,
        summary.failed + built.failures.len(),
        summary.skipped_charts,
        if summary.interrupted { ", interrupted" } else { "" }
    );

    info!("Conversion finished, exiting..!");
    Ok(())
}
