use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use graph_datasets::archive;
use graph_datasets::cache::{FileCache, ResourceRequest};
use graph_datasets::config::ConfigLoader;
use graph_datasets::dataset::DatasetLoader;
use graph_datasets::domain::{ArchiveFormat, ResourceName};
use graph_datasets::error::DatasetError;
use graph_datasets::fetch::HttpFetcher;
use graph_datasets::output::{ExtractResult, FetchResult, JsonOutput, LoadResult};

#[derive(Parser)]
#[command(name = "graph-datasets")]
#[command(about = "Download, cache and load graph-learning datasets")]
#[command(version, author)]
struct Cli {
    /// Config file (defaults to graph-datasets.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Cache root (defaults to ./.cache)
    #[arg(long, global = true)]
    cache_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download a resource into the cache and print its local path")]
    Fetch(FetchArgs),
    #[command(about = "Extract a local archive")]
    Extract(ExtractArgs),
    #[command(about = "Fetch a dataset and print a summary of its graph and labels")]
    Load(LoadArgs),
}

#[derive(Args)]
struct FetchArgs {
    name: ResourceName,
    url: String,

    #[arg(long)]
    extract: bool,

    #[arg(long, value_enum, default_value_t = ArchiveFormat::Zip)]
    format: ArchiveFormat,

    #[arg(long)]
    cache_subdir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ExtractArgs {
    archive: Utf8PathBuf,
    destination: Utf8PathBuf,

    #[arg(long, value_enum, default_value_t = ArchiveFormat::Auto)]
    format: ArchiveFormat,
}

#[derive(Args)]
struct LoadArgs {
    #[arg(default_value = "blogcatalog")]
    dataset: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DatasetError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DatasetError) -> u8 {
    match error {
        DatasetError::UnknownDataset(_)
        | DatasetError::ConfigRead(_)
        | DatasetError::ConfigParse(_) => 2,
        DatasetError::Http(_) | DatasetError::HttpStatus { .. } => 3,
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
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch(args) => {
            let mut cache_config = config.cache_config(cli.cache_dir)?;
            if let Some(subdir) = args.cache_subdir {
                cache_config = cache_config.with_subdir(subdir);
            }
            let cache = FileCache::new(cache_config, HttpFetcher::new()?);
            let mut request = ResourceRequest::new(args.name, args.url);
            if args.extract {
                request = request.extracted(args.format);
            }
            let path = cache.resolve(&request)?;
            JsonOutput::print_fetch(&FetchResult {
                name: request.name.to_string(),
                path: path.to_string(),
            })
            .into_diagnostic()
        }
        Commands::Extract(args) => {
            let extracted = archive::extract_archive(
                args.archive.as_std_path(),
                args.destination.as_std_path(),
                Some(args.format),
            )?;
            JsonOutput::print_extract(&ExtractResult {
                archive: args.archive.to_string(),
                destination: args.destination.to_string(),
                extracted,
            })
            .into_diagnostic()
        }
        Commands::Load(args) => {
            let spec = config.dataset(&args.dataset)?;
            let cache = FileCache::new(config.cache_config(cli.cache_dir)?, HttpFetcher::new()?);
            let loader = DatasetLoader::new(cache, spec);
            let (graph, labels) = loader.load_graph()?;
            JsonOutput::print_load(&LoadResult::summarize(
                loader.spec().name.as_str(),
                &graph,
                &labels,
            ))
            .into_diagnostic()
        }
    }
}
