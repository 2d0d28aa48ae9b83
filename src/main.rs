use clap::{Args, Parser, Subcommand};
use gif_describer::catalog::{find_sources, Catalog, ManifestCatalog, TsvCatalog};
use gif_describer::config::Configuration;
use gif_describer::coordinator::WorkCoordinator;
use gif_describer::error::AppError;
use gif_describer::inference::{DescriptionClient, GeminiModel};
use gif_describer::locator::SourceLocator;
use gif_describer::output::{load_skip_set, OpenMode, OutputSink, SkipSet};
use gif_describer::pipeline::{describe_pipeline, ProcessingPipeline};
use gif_describer::progress::{RunCounters, RunSummary};
use gif_describer::sampler::{SamplerTable, SamplingSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(
    name = "gif-describer",
    version,
    about = "Describe animated GIFs and short videos with a multimodal model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Maximum number of items to describe (0 = all)
    #[arg(long)]
    limit: Option<usize>,

    /// Concurrent workers, overrides the configuration
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a TGIF-style `url<TAB>caption` file
    Tgif {
        /// Path to the TSV file
        #[arg(long)]
        tsv: PathBuf,

        /// Output JSONL file
        #[arg(long, default_value = "gif_descriptions.jsonl")]
        output: PathBuf,

        /// Append to the output and skip what it already holds
        #[arg(long)]
        resume: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Describe downloaded items from every sources/<name>/manifest.json
    Sources {
        /// Directory holding one sub-directory per source
        #[arg(long, default_value = "sources")]
        sources_dir: PathBuf,

        /// Process only this source (directory name)
        #[arg(long)]
        source: Option<String>,

        /// Re-describe every downloaded item, truncating previous output
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        run: RunArgs,
    },
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Cancel the token on Ctrl-C so the coordinator stops admitting work
fn spawn_shutdown_listener(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight items");
            cancel_token.cancel();
        }
    });
}

fn build_pipeline(configuration: &Configuration) -> Result<ProcessingPipeline, AppError> {
    let api_key = configuration.load_api_key()?;
    let model = GeminiModel::from_configuration(configuration, api_key)?;
    let locator = SourceLocator::from_configuration(configuration)?;

    Ok(describe_pipeline(
        Arc::new(locator),
        SamplerTable::standard(configuration),
        SamplingSettings::from(configuration),
        DescriptionClient::from_configuration(Arc::new(model), configuration),
    ))
}

fn build_coordinator(
    configuration: &Configuration,
    run: &RunArgs,
    force: bool,
    cancel_token: CancellationToken,
) -> Result<WorkCoordinator, AppError> {
    let mut builder = WorkCoordinator::builder(configuration.clone())
        .limit(run.limit)
        .force(force)
        .cancel_token(cancel_token)
        .pipeline(build_pipeline(configuration)?);
    if let Some(workers) = run.workers {
        builder = builder.workers(workers);
    }
    builder.build()
}

/// One catalog, one output file: skip-set, run, flush, persist
async fn describe_catalog(
    coordinator: &WorkCoordinator,
    catalog: &mut dyn Catalog,
    output: &Path,
    mode: OpenMode,
) -> Result<RunSummary, AppError> {
    let skip = match mode {
        OpenMode::Append => load_skip_set(output).await?,
        OpenMode::Truncate => SkipSet::new(),
    };

    let mut sink = OutputSink::open(output, mode).await?;
    let summary = coordinator.run(catalog, &skip, &mut sink).await;
    sink.close().await.map_err(|source| AppError::Output {
        path: output.to_path_buf(),
        source,
    })?;

    catalog.persist()?;
    summary.log();
    Ok(summary)
}

async fn describe_tgif(
    configuration: &Configuration,
    tsv: &Path,
    output: &Path,
    resume: bool,
    run: &RunArgs,
    cancel_token: CancellationToken,
) -> Result<(), AppError> {
    if !tsv.is_file() {
        return Err(AppError::NoInput(format!("{} does not exist", tsv.display())));
    }
    info!("Loading GIFs from {}", tsv.display());
    let mut catalog = TsvCatalog::load(tsv, &configuration.legacy_domains)?;
    if catalog.is_empty() {
        return Err(AppError::NoInput(format!("{} has no entries", tsv.display())));
    }
    info!("Loaded {} GIFs", catalog.len());

    let coordinator = build_coordinator(configuration, run, false, cancel_token)?;
    let mode = if resume {
        OpenMode::Append
    } else {
        OpenMode::Truncate
    };
    describe_catalog(&coordinator, &mut catalog, output, mode).await?;
    Ok(())
}

async fn describe_sources(
    configuration: &Configuration,
    sources_dir: &Path,
    source: Option<&str>,
    force: bool,
    run: &RunArgs,
    cancel_token: CancellationToken,
) -> Result<(), AppError> {
    let sources = find_sources(sources_dir, source)?;
    if sources.is_empty() {
        return Err(AppError::NoInput(format!(
            "no sources with a manifest under {}",
            sources_dir.display()
        )));
    }
    let names: Vec<_> = sources
        .iter()
        .filter_map(|dir| dir.file_name())
        .map(|name| name.to_string_lossy())
        .collect();
    info!("Found {} source(s): {}", sources.len(), names.join(", "));

    let coordinator = build_coordinator(configuration, run, force, cancel_token.clone())?;
    let mode = if force {
        OpenMode::Truncate
    } else {
        OpenMode::Append
    };

    let mut totals = RunCounters::default();
    for dir in &sources {
        if cancel_token.is_cancelled() {
            warn!("Shutdown requested, skipping remaining sources");
            break;
        }
        let mut catalog = ManifestCatalog::load(dir)?;
        catalog.log_stats();
        let output = catalog.descriptions_path();
        let summary = describe_catalog(&coordinator, &mut catalog, &output, mode).await?;
        totals.merge(&summary.counters);
    }

    info!(
        "Described {} items total across {} source(s) ({} removed, {} failed)",
        totals.succeeded,
        sources.len(),
        totals.removed,
        totals.failed
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { Level::DEBUG } else { Level::INFO });

    let configuration = Configuration::load(cli.config.as_deref())?;
    let cancel_token = CancellationToken::new();
    spawn_shutdown_listener(cancel_token.clone());

    match cli.command {
        Commands::Tgif {
            tsv,
            output,
            resume,
            run,
        } => describe_tgif(&configuration, &tsv, &output, resume, &run, cancel_token).await,
        Commands::Sources {
            sources_dir,
            source,
            force,
            run,
        } => {
            describe_sources(
                &configuration,
                &sources_dir,
                source.as_deref(),
                force,
                &run,
                cancel_token,
            )
            .await
        }
    }
}
