use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "CHART_WELL",
    about = "Convert a Malody song library into a StepMania song pack!"
)]
pub struct Args {
    /// Malody song library, laid out as `<song>/<chart>/<file>.mc`.
    pub input: PathBuf,

    /// Directory the song pack is written into.
    pub output: PathBuf,

    /// Import at most N chart files.
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only convert charts with this many columns.
    #[arg(short, long)]
    pub keymode: Option<usize>,

    /// Fail on chart fields the importer does not recognise instead of ignoring them.
    #[arg(long, default_value_t = false)]
    pub verify: bool,

    /// Dry run (import the library and print statistics without writing anything).
    #[arg(short, long, default_value_t = false)]
    pub dry_run: bool,

    /// Prints extra information to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}
