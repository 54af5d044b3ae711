use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ontology_index::app::{App, ProgressSink};
use ontology_index::cache::HttpCache;
use ontology_index::config::{ConfigLoader, ResolvedConfig};
use ontology_index::domain::ExtractorKind;
use ontology_index::error::IndexError;
use ontology_index::output::{ConsoleOutput, JsonOutput, OutputMode};
use ontology_index::rdf::RdfLoader;
use ontology_index::store::MetadataStore;

#[derive(Parser)]
#[command(name = "ontology-index")]
#[command(about = "Harvests ontology metadata from public registries into one de-duplicated index")]
#[command(version, author)]
struct Cli {
    /// Config file (default: ontology-index.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the extractors, merge manual metadata and export the index")]
    Harvest(HarvestArgs),
    #[command(about = "Merge manual metadata into the store and export the index")]
    Merge(OutputArgs),
    #[command(about = "Export the stored index to CSV and JSONL")]
    Export(OutputArgs),
    #[command(about = "Print the stored entry of one ontology")]
    Lookup(LookupArgs),
}

#[derive(Args)]
struct HarvestArgs {
    /// Run only these extractors, in the given order
    #[arg(long, value_enum)]
    only: Vec<ExtractorKind>,

    /// Delete the previous database before harvesting
    #[arg(long)]
    fresh: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct OutputArgs {
    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct LookupArgs {
    iri: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<IndexError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IndexError) -> u8 {
    match error {
        IndexError::Validation(_) | IndexError::InvalidUrl { .. } | IndexError::NotFound(_) => 2,
        IndexError::Http(_)
        | IndexError::HttpStatus { .. }
        | IndexError::Timeout(_)
        | IndexError::MissingTool(_) => 3,
        IndexError::Storage(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Harvest(args) => {
            if let Some(dir) = args.output.output_dir {
                config.output_dir = dir;
            }
            let kinds = if args.only.is_empty() {
                config.extractors.clone()
            } else {
                args.only
            };
            let mut app = build_app(&config, args.fresh)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let report = app.harvest(&kinds, &JsonOutput)?;
                    JsonOutput::print_harvest(&report).into_diagnostic()?;
                }
                OutputMode::Interactive => {
                    let report = app.harvest(&kinds, &ConsoleOutput)?;
                    ConsoleOutput::print_harvest(&report);
                }
            }
            Ok(())
        }
        Commands::Merge(args) => {
            if let Some(dir) = args.output_dir {
                config.output_dir = dir;
            }
            let mut app = build_app(&config, false)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let report = app.merge(&JsonOutput)?;
                    JsonOutput::print_merge(&report).into_diagnostic()?;
                }
                OutputMode::Interactive => {
                    let report = app.merge(&ConsoleOutput)?;
                    ConsoleOutput::print_export(&report.export);
                }
            }
            Ok(())
        }
        Commands::Export(args) => {
            if let Some(dir) = args.output_dir {
                config.output_dir = dir;
            }
            let app = build_app(&config, false)?;
            let sink: &dyn ProgressSink = match output_mode {
                OutputMode::NonInteractive => &JsonOutput,
                OutputMode::Interactive => &ConsoleOutput,
            };
            let report = app.export(sink)?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_export(&report).into_diagnostic()?,
                OutputMode::Interactive => ConsoleOutput::print_export(&report),
            }
            Ok(())
        }
        Commands::Lookup(args) => {
            let app = build_app(&config, false)?;
            let entry = app.lookup(&args.iri)?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_lookup(&entry).into_diagnostic()?,
                OutputMode::Interactive => ConsoleOutput::print_lookup(&entry).into_diagnostic()?,
            }
            Ok(())
        }
    }
}

fn build_app(config: &ResolvedConfig, fresh: bool) -> Result<App<HttpCache>, IndexError> {
    fs::create_dir_all(config.var_dir.as_std_path())
        .map_err(|err| IndexError::Filesystem(format!("create {}: {err}", config.var_dir)))?;

    let database = config.database_path();
    let store = if fresh {
        info!(path = %database, "starting with a fresh database");
        MetadataStore::open_fresh(&database)?
    } else {
        MetadataStore::open(&database)?
    };
    let fetcher = HttpCache::new(&config.var_dir, &config.http)?;
    let rdf = RdfLoader::detect(config.rapper.as_deref(), config.max_triples);
    Ok(App::new(store, fetcher, rdf, config.app_settings()))
}
