use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covrec::cli::{self, LoadOptions};

/// Reconcile, merge, diff and filter code coverage reports.
#[derive(Parser)]
#[command(name = "covrec", version, about)]
struct Cli {
    /// Override format detection for every report (cobertura, gocover, lcov).
    #[arg(long, global = true)]
    format: Option<String>,

    /// Project root; report paths are normalized against the files under it.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Glob of files to drop; prefix with `!` to re-include. Repeatable.
    #[arg(long, global = true)]
    exclude: Vec<String>,

    /// Log debug diagnostics to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show totals for one or more reports merged together.
    Summary {
        /// Coverage files to read.
        #[arg(required = true)]
        reports: Vec<PathBuf>,
    },

    /// List per-file coverage.
    Files {
        /// Coverage files to read.
        #[arg(required = true)]
        reports: Vec<PathBuf>,

        /// Sort by coverage rate ascending (show worst files first).
        #[arg(long)]
        sort_by_coverage: bool,
    },

    /// Show line-level coverage for a source file.
    Lines {
        /// Coverage file to read.
        report: PathBuf,

        /// The source file; any unambiguous path suffix works.
        source_file: String,
    },

    /// Merge reports and write the combined tree as JSON to stdout.
    Merge {
        /// Coverage files to read.
        #[arg(required = true)]
        reports: Vec<PathBuf>,

        /// Drop raw blocks and keep only per-file totals.
        #[arg(long)]
        strip_blocks: bool,
    },

    /// Compare current coverage against a baseline.
    Diff {
        /// Current coverage file.
        current: PathBuf,

        /// Baseline coverage file.
        baseline: PathBuf,

        /// Emit the comparison as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "covrec=debug" } else { "covrec=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let opts = LoadOptions {
        format: cli.format,
        root: cli.root,
        exclude: cli.exclude,
    };

    let output = match cli.command {
        Commands::Summary { reports } => cli::cmd_summary(&cli::load_merged(&reports, &opts)?)?,
        Commands::Files {
            reports,
            sort_by_coverage,
        } => cli::cmd_files(&cli::load_merged(&reports, &opts)?, sort_by_coverage)?,
        Commands::Lines {
            report,
            source_file,
        } => cli::cmd_lines(&cli::load_merged(&[report], &opts)?, &source_file)?,
        Commands::Merge {
            reports,
            strip_blocks,
        } => cli::cmd_merge(&cli::load_merged(&reports, &opts)?, strip_blocks)?,
        Commands::Diff {
            current,
            baseline,
            json,
        } => {
            let current = cli::load_merged(&[current], &opts)?;
            let baseline = cli::load_merged(&[baseline], &opts)?;
            cli::cmd_diff(&current, &baseline, json)?
        }
    };

    print!("{}", output);
    Ok(())
}
