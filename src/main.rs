use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mergebook::backfill::BackfillConfig;
use mergebook::headers::{LocatorConfig, MatcherConfig};
use mergebook::pipeline::{self, RunConfig, SourcePolicy};
use mergebook::progress::ProgressSink;
use mergebook::{MergeError, Result};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Merge(args) => execute_merge(args),
        Command::Collections(args) => execute_collections(args),
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|error| MergeError::Logging(error.to_string()))
}

fn execute_merge(args: MergeArgs) -> Result<()> {
    if !args.requests_dir.exists() {
        return Err(MergeError::MissingInput(args.requests_dir));
    }
    if !args.template.exists() {
        return Err(MergeError::MissingInput(args.template));
    }
    let sources = args.requests_dir.join(&args.collection);
    if !sources.exists() {
        return Err(MergeError::MissingInput(sources));
    }

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.requests_dir.clone());
    let config = RunConfig {
        template: args.template,
        reference: args.reference,
        alias_map: args.alias_map,
        output_dir,
        label: args.collection,
        matcher: MatcherConfig {
            similarity_threshold: args.similarity,
        },
        locator: LocatorConfig {
            scan_window: args.scan_window,
            min_matches: args.min_matches,
        },
        backfill: BackfillConfig {
            key_column: args.key_column,
            target_columns: args.fill_columns,
        },
        address_column: args.address_column,
        on_error: args.on_error.into(),
    };

    let mut sink = LogSink;
    let report = pipeline::execute(&sources, &config, &mut sink)?;
    for (file, reason) in &report.skipped {
        warn!(file = %file.display(), %reason, "skipped source file");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.message);
        for artifact in &report.artifacts {
            println!("  {}", artifact.display());
        }
    }
    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}

fn execute_collections(args: CollectionsArgs) -> Result<()> {
    if !args.requests_dir.exists() {
        return Err(MergeError::MissingInput(args.requests_dir));
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&args.requests_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_uppercase());
        }
    }
    names.sort();
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// Progress sink surfacing completion percentages through the log.
struct LogSink;

impl ProgressSink for LogSink {
    fn update(&mut self, fraction: f64) {
        info!(percent = (fraction * 100.0).round() as u32, "progress");
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Merge heterogeneous request workbooks against a canonical template."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge one collection of request workbooks.
    Merge(MergeArgs),
    /// List the collections available under the requests root.
    Collections(CollectionsArgs),
}

#[derive(clap::Args)]
struct MergeArgs {
    /// Root directory holding one sub-folder of request workbooks per
    /// collection.
    #[arg(long)]
    requests_dir: PathBuf,

    /// Collection (sub-folder) to merge.
    #[arg(long)]
    collection: String,

    /// Template workbook defining the canonical column order.
    #[arg(long)]
    template: PathBuf,

    /// JSON reference table used to backfill missing values.
    #[arg(long)]
    reference: PathBuf,

    /// Optional JSON alias map applied to headers before matching.
    #[arg(long)]
    alias_map: Option<PathBuf>,

    /// Directory receiving the output workbooks. Defaults to the requests
    /// root.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Column projected into the address extract.
    #[arg(long, default_value = "ADDRESS")]
    address_column: String,

    /// Column whose value keys the reference lookup.
    #[arg(long, default_value = "CAMPAIGN")]
    key_column: String,

    /// Columns backfilled from the reference table when empty.
    #[arg(long = "fill-column", default_values_t = ["BANK".to_string(), "PLACEMENT".to_string()])]
    fill_columns: Vec<String>,

    /// Optional header similarity floor in [0, 1]; matching stays strict
    /// when absent.
    #[arg(long)]
    similarity: Option<f64>,

    /// Rows scanned when locating a sheet's header row.
    #[arg(long, default_value_t = 10)]
    scan_window: usize,

    /// Template hits a row needs to qualify as the header row.
    #[arg(long, default_value_t = 1)]
    min_matches: usize,

    /// What to do when one source file cannot be ingested.
    #[arg(long, value_enum, default_value_t = OnError::Skip)]
    on_error: OnError,

    /// Print the run report as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct CollectionsArgs {
    /// Root directory holding one sub-folder per collection.
    #[arg(long)]
    requests_dir: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OnError {
    Skip,
    Abort,
}

impl From<OnError> for SourcePolicy {
    fn from(policy: OnError) -> Self {
        match policy {
            OnError::Skip => SourcePolicy::Skip,
            OnError::Abort => SourcePolicy::Abort,
        }
    }
}
