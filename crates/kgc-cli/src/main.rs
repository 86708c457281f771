//! KGC CLI - Command-line interface
//!
//! Usage:
//!   kgc extract <records.jsonl> <output-dir> [--domain legal] [--provider ollama]
//!   kgc export <json-dir> <graph-dir> [--format graphml]
//!   kgc domains

mod export;
mod loader;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use kgc_client::create_client;
use kgc_core::{AppConfig, Triple};
use kgc_domain::{Domain, DomainRegistry};
use kgc_extract::Pipeline;

#[derive(Parser)]
#[command(name = "kgc")]
#[command(about = "Connectivity-aware knowledge graph extraction")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file; environment variables apply otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract knowledge graphs from a JSONL file of records
    Extract(ExtractArgs),
    /// Convert extracted triple files into serialized graph formats
    Export {
        /// Directory of per-record triple JSON files
        input: PathBuf,
        /// Directory to write graph files into
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Graphml)]
        format: ExportFormat,
    },
    /// List available domains
    Domains {
        /// Root directory of on-disk domain bundles
        #[arg(long)]
        domains_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// JSONL input file ({"id": ..., "text": ...} per line)
    input: PathBuf,

    /// Output directory for per-record triples and metadata
    output: PathBuf,

    /// Domain bundle to extract with
    #[arg(long)]
    domain: Option<String>,

    /// Extraction mode: open or constrained
    #[arg(long)]
    mode: Option<String>,

    /// LM provider: openai or ollama
    #[arg(long)]
    provider: Option<String>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Stop refining once the graph has at most this many components
    #[arg(long)]
    max_disconnected: Option<usize>,

    /// Refinement iteration budget; 0 disables refinement
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Process at most this many records
    #[arg(long)]
    limit: Option<usize>,

    /// Override the extraction prompt with a file
    #[arg(long)]
    prompt: Option<PathBuf>,

    /// Override the bridging prompt with a file
    #[arg(long)]
    bridging_prompt: Option<PathBuf>,

    /// Root directory of on-disk domain bundles
    #[arg(long)]
    domains_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Graphml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    match cli.command {
        Commands::Extract(args) => run_extract(config, args).await,
        Commands::Export {
            input,
            output,
            format,
        } => run_export(&input, &output, format),
        Commands::Domains { domains_dir } => {
            let registry = DomainRegistry::new(domains_dir.or(config.domains_dir));
            for name in registry.list() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn run_extract(mut config: AppConfig, args: ExtractArgs) -> Result<()> {
    if let Some(provider) = &args.provider {
        config.client.provider = provider.parse()?;
    }
    if let Some(model) = args.model {
        config.client.model = model;
    }
    if let Some(domain) = args.domain {
        config.extraction.domain = domain;
    }
    if let Some(mode) = &args.mode {
        config.extraction.mode = mode.parse()?;
    }
    if let Some(max) = args.max_disconnected {
        config.extraction.max_disconnected = max;
    }
    if let Some(max) = args.max_iterations {
        config.extraction.max_iterations = max;
    }
    if let Some(temperature) = args.temperature {
        config.extraction.temperature = temperature;
    }
    if args.domains_dir.is_some() {
        config.domains_dir = args.domains_dir;
    }

    let registry = DomainRegistry::new(config.domains_dir.clone());
    let domain = resolve_domain(&registry, &config, &args.prompt, &args.bridging_prompt)?;
    let client: Arc<dyn kgc_core::LmClient> = Arc::from(create_client(&config.client)?);

    tracing::info!(
        model = client.model_name(),
        domain = domain.name(),
        mode = %config.extraction.mode,
        "starting extraction"
    );

    let mut records = loader::load_records(&args.input)?;
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create output dir {}", args.output.display()))?;

    let pipeline = Pipeline::new(client, domain, config.extraction.clone());
    let mut processed = 0usize;
    let mut failed = 0usize;

    for record in &records {
        match pipeline.process_record(record, None).await {
            Ok(result) => {
                let triples_path = args.output.join(format!("{}.json", record.id));
                let metadata_path = args.output.join(format!("{}.metadata.json", record.id));
                std::fs::write(
                    &triples_path,
                    serde_json::to_string_pretty(&result.triples)?,
                )?;
                std::fs::write(
                    &metadata_path,
                    serde_json::to_string_pretty(&result.metadata)?,
                )?;
                tracing::info!(
                    record_id = %record.id,
                    triples = result.triples.len(),
                    output = %triples_path.display(),
                    "record complete"
                );
                processed += 1;
            }
            Err(e) => {
                // one bad record must not sink the batch
                tracing::error!(record_id = %record.id, error = %e, "record failed");
                failed += 1;
            }
        }
    }

    tracing::info!(processed, failed, "extraction finished");
    Ok(())
}

fn resolve_domain(
    registry: &DomainRegistry,
    config: &AppConfig,
    prompt_override: &Option<PathBuf>,
    bridging_override: &Option<PathBuf>,
) -> Result<Arc<Domain>> {
    let domain = registry.get(&config.extraction.domain)?;
    if prompt_override.is_none() && bridging_override.is_none() {
        return Ok(domain);
    }

    let mut domain = (*domain).clone();
    if let Some(path) = prompt_override {
        domain.override_extraction_prompt(path)?;
    }
    if let Some(path) = bridging_override {
        domain.override_bridging_prompt(path)?;
    }
    Ok(Arc::new(domain))
}

fn run_export(input: &PathBuf, output: &PathBuf, format: ExportFormat) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create output dir {}", output.display()))?;

    let mut written = 0usize;
    for entry in std::fs::read_dir(input)
        .with_context(|| format!("failed to read input dir {}", input.display()))?
    {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".json") || name.ends_with(".metadata.json") {
            continue;
        }

        let content = std::fs::read_to_string(&path)?;
        let triples: Vec<Triple> = serde_json::from_str(&content)
            .with_context(|| format!("invalid triple file {}", path.display()))?;

        let stem = name.trim_end_matches(".json");
        let out_path = match format {
            ExportFormat::Graphml => {
                let out = output.join(format!("{stem}.graphml"));
                std::fs::write(&out, export::to_graphml(&triples))?;
                out
            }
            ExportFormat::Json => {
                let out = output.join(format!("{stem}.graph.json"));
                std::fs::write(
                    &out,
                    serde_json::to_string_pretty(&export::to_node_link_json(&triples))?,
                )?;
                out
            }
        };
        tracing::info!(output = %out_path.display(), triples = triples.len(), "exported graph");
        written += 1;
    }

    tracing::info!(written, "export finished");
    Ok(())
}
