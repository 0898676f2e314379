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
    author = "DeepDriveMD Developers",
    version,
    about = "DeepDrive CLI - Adaptive molecular sampling driven by learned latent spaces: simulate, learn, detect outliers, reseed.",
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

    /// Set the number of tasks a stage may run concurrently.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the simulate, preprocess, learn and detect loop described by a run file.
    Run(RunArgs),
    /// Select the best model of a round, search for outliers and write the next round's seeds.
    Outlier(OutlierArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the run file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the experiment directory from the run file.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub experiment_dir: Option<PathBuf>,

    /// Override the number of rounds.
    #[arg(short = 'n', long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Print the generated stages as JSON instead of executing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Set a specific configuration value, overriding the run file.
    /// Can be used multiple times. Example: -S resource.cpus=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `outlier` subcommand. Flag names match the task descriptors emitted by the
/// detect stage.
#[derive(Args, Debug)]
pub struct OutlierArgs {
    /// Simulation directory of the round, holding `output-{sim}.pdb` trajectories.
    #[arg(long = "sim_path", value_name = "PATH")]
    pub sim_path: PathBuf,

    /// Learning directory of the round, holding losses, weights and embeddings.
    #[arg(long = "cvae_path", value_name = "PATH")]
    pub cvae_path: PathBuf,

    /// Seed directory of the next round.
    #[arg(long = "shared_path", value_name = "PATH")]
    pub shared_path: PathBuf,

    /// Run-wide epsilon record.
    #[arg(long = "eps_path", value_name = "PATH")]
    pub eps_path: PathBuf,

    /// Directory for the outlier report of this round.
    #[arg(long = "out_path", value_name = "PATH")]
    pub out_path: Option<PathBuf>,

    /// Largest acceptable number of outliers.
    #[arg(long, value_name = "INT", default_value_t = 150)]
    pub bound: usize,

    /// Radius increment between clustering attempts.
    #[arg(long, value_name = "FLOAT", default_value_t = 0.05)]
    pub step: f64,

    /// Starting radius for a model without a recorded value.
    #[arg(long, value_name = "FLOAT", default_value_t = 0.2)]
    pub eps: f64,

    /// Neighbours (itself included) a frame needs to be a core point.
    #[arg(long = "min_samples", value_name = "INT", default_value_t = 10)]
    pub min_samples: usize,

    /// Clustering attempts before the search gives up.
    #[arg(long = "max_attempts", value_name = "INT", default_value_t = 100)]
    pub max_attempts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn outlier_arguments_accept_detect_task_flags() {
        let cli = Cli::try_parse_from([
            "deepdrive",
            "outlier",
            "--sim_path",
            "/exp/md/pipeline-0",
            "--cvae_path",
            "/exp/ml/pipeline-0",
            "--shared_path",
            "/exp/shared/pipeline-1/pdb",
            "--eps_path",
            "/exp/outlier/eps-record.json",
            "--out_path",
            "/exp/outlier/pipeline-0",
            "--bound",
            "150",
            "--step",
            "0.05",
            "--eps",
            "0.2",
            "--min_samples",
            "10",
            "--max_attempts",
            "100",
        ])
        .unwrap();

        let Commands::Outlier(args) = cli.command else {
            panic!("expected the outlier subcommand");
        };
        assert_eq!(args.sim_path, PathBuf::from("/exp/md/pipeline-0"));
        assert_eq!(args.min_samples, 10);
        assert_eq!(args.max_attempts, 100);
    }

    #[test]
    fn run_arguments_collect_repeated_set_values() {
        let cli = Cli::try_parse_from([
            "deepdrive",
            "-vv",
            "run",
            "-c",
            "run.toml",
            "--dry-run",
            "-S",
            "resource.cpus=8",
            "-S",
            "max-iterations=2",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert!(args.dry_run);
        assert_eq!(args.set_values, vec!["resource.cpus=8", "max-iterations=2"]);
    }
}
