use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "nfhedm developers",
    version,
    about = "nfhedm CLI - Near-field diffraction orientation indexing: simulate an image stack, then score every candidate orientation at every search voxel.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index the synthetic gold-cubes experiment against an instrument description.
    Run(RunArgs),
}

/// How the grand loop tolerates small projection errors.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    /// Dilate the image stack once, then look up single pixels.
    Dilated,
    /// Search the raw image stack around every predicted pixel.
    Neighbourhood,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the instrument description in TOML format (e.g., retiga.toml).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub instrument: PathBuf,

    /// Path to an optional run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Engine Overrides ---
    /// Number of worker threads for the grand loop.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Number of search voxels scored per chunk.
    #[arg(long, value_name = "INT")]
    pub chunk_size: Option<usize>,

    /// Score at most this many search voxels.
    #[arg(long, value_name = "INT")]
    pub limit: Option<usize>,

    /// Tolerance strategy used when scoring.
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub strategy: Option<StrategyArg>,

    // --- Persistence ---
    /// Image stack cache; read if present, written after simulating otherwise.
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Save every produced array to this reference archive.
    #[arg(long, value_name = "PATH")]
    pub generate: Option<PathBuf>,

    /// Compare produced arrays against this reference archive.
    /// Takes precedence over --generate.
    #[arg(long, value_name = "PATH")]
    pub check: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S grid.points=21
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
