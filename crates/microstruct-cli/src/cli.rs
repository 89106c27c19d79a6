use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "microstruct CLI - spatial correlation functions and periodic display meshes for atomistic microstructures.",
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

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the spatial correlation function between two particle properties.
    Correlate(CorrelateArgs),
    /// Smooth a periodic partition mesh and convert it into a finite triangle mesh.
    Mesh(MeshArgs),
}

/// Arguments for the `correlate` subcommand.
#[derive(Args, Debug)]
pub struct CorrelateArgs {
    // --- Core Arguments ---
    /// Path to the input particle file in extended XYZ format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output prefix; writes PREFIX.real.csv, PREFIX.short.csv and PREFIX.reciprocal.csv.
    #[arg(short, long, required = true, value_name = "PREFIX")]
    pub output: PathBuf,

    /// Path to a job configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Property Overrides ---
    /// First property, as NAME or NAME.COMPONENT (e.g. 'Velocity.X').
    #[arg(long, value_name = "PROPERTY")]
    pub property1: Option<String>,

    /// Second property; defaults to the first one (auto-correlation).
    #[arg(long, value_name = "PROPERTY")]
    pub property2: Option<String>,

    // --- Numerical Overrides ---
    /// Override the FFT grid spacing.
    #[arg(long, value_name = "FLOAT")]
    pub fft_grid_spacing: Option<f64>,

    /// Override the cutoff of the short-ranged direct summation.
    #[arg(long, value_name = "FLOAT")]
    pub short_ranged_cutoff: Option<f64>,

    /// Override the number of bins of every curve.
    #[arg(long = "bins", value_name = "INT")]
    pub number_of_bins: Option<usize>,

    /// Skip the short-ranged direct summation.
    #[arg(long)]
    pub no_short_ranged: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S correlation.number-of-bins=80
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `mesh` subcommand.
#[derive(Args, Debug)]
pub struct MeshArgs {
    /// Path to the input partition mesh (legacy ASCII VTK with a 'material' cell scalar).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output triangle mesh (legacy ASCII VTK).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a job configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Take the simulation cell from an extended XYZ file instead of the config file.
    #[arg(long, value_name = "PATH")]
    pub cell_from: Option<PathBuf>,

    /// Override the number of smoothing iterations (0 disables smoothing).
    #[arg(short = 'n', long, value_name = "INT")]
    pub iterations: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S mesh.smoothing.lambda=0.6
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
