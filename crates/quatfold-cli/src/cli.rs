use clap::{Args, Parser, Subcommand};
use quatfold::engine::minimizer::MinimizerStrategy;
use quatfold::engine::state::SamplerKind;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "QuatFold CLI - backbone structure prediction by quaternion-guided sampling and energy minimization.",
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
    /// Predict a backbone structure for an amino-acid sequence.
    Predict(PredictArgs),
    /// Validate a configuration file and show the priors it resolves for a sequence.
    Check(CheckArgs),
}

/// Arguments for the `predict` subcommand.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// One-letter amino-acid sequence (e.g., MKTAYIAKQR).
    #[arg(required = true, value_name = "SEQUENCE")]
    pub sequence: String,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the run summary as TOML to this path instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the best structure in the parsed-structure TOML view.
    #[arg(long, value_name = "PATH")]
    pub structure_output: Option<PathBuf>,

    /// Reference structure (parsed-structure TOML view) for CA RMSD reporting.
    #[arg(short, long, value_name = "PATH")]
    pub reference: Option<PathBuf>,

    // --- Overrides ---
    /// Override the base random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the minimizer strategy (gentle, lbfgs, annealing, hybrid).
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<MinimizerStrategy>,

    /// Override the sample count of every enabled sampler.
    #[arg(long, value_name = "INT")]
    pub samples: Option<usize>,

    /// Override the minimizer iteration budget.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Disable a sampler (quaternion, monte-carlo, fragment, basin). Can be repeated.
    #[arg(long, value_name = "SAMPLER")]
    pub disable: Vec<SamplerKind>,

    /// External secondary-structure string (DSSP letters), one per residue.
    #[arg(long, value_name = "STATES")]
    pub secondary_structure: Option<String>,

    /// Disable the built-in Chou-Fasman secondary-structure prior.
    #[arg(long)]
    pub no_chou_fasman: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sampling.basins.samples=16
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Optional sequence whose resolved priors are printed.
    #[arg(value_name = "SEQUENCE")]
    pub sequence: Option<String>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
