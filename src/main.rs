use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use nyaya_drishti::config::{self, AppConfig, LedgerMode};
use nyaya_drishti::ollama::OllamaClient;
use nyaya_drishti::pipeline::evaluation::{evaluate, load_golden_cases};
use nyaya_drishti::pipeline::retrieval::{ingest, IngestOutcome};
use nyaya_drishti::pipeline::trust::{hash, ContentFingerprint};
use nyaya_drishti::pipeline::types::Document;
use nyaya_drishti::services::{build_embedder, build_ledger, ServiceRegistry};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the statute index from the corpus (skipped if one exists)
    Ingest {
        /// Statute corpus JSON
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Index output path
        #[arg(long)]
        index: Option<PathBuf>,
        /// Rebuild even if an index for another model exists
        #[arg(long)]
        force: bool,
    },
    /// Analyze an incident report against witness statements
    Analyze {
        /// Incident report scan (image or PDF)
        #[arg(long)]
        incident: PathBuf,
        /// Witness statement scans, in order
        #[arg(long = "witness", required = true)]
        witnesses: Vec<PathBuf>,
    },
    /// Check whether a document's fingerprint is anchored on the live ledger.
    /// The mock ledger only remembers anchors made by the same process, so in
    /// mock mode every lookup reports not found.
    Verify {
        /// Document to hash and look up
        #[arg(long, conflicts_with = "fingerprint", required_unless_present = "fingerprint")]
        file: Option<PathBuf>,
        /// Hex SHA-256 fingerprint
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Score the contradiction engine on golden cases
    Evaluate {
        /// Golden cases JSON
        #[arg(long)]
        cases: PathBuf,
        /// Print the summary as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    nyaya_drishti::init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match cli.command {
        Commands::Ingest { corpus, index, force } => run_ingest(config, corpus, index, force),
        Commands::Analyze { incident, witnesses } => run_analyze(config, incident, witnesses),
        Commands::Verify { file, fingerprint } => run_verify(config, file, fingerprint),
        Commands::Evaluate { cases, json } => run_evaluate(config, cases, json),
    }
}

fn run_ingest(
    config: AppConfig,
    corpus: Option<PathBuf>,
    index: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let corpus = corpus.unwrap_or_else(|| config.corpus_path.clone());
    let index = index.unwrap_or_else(|| config.index_path.clone());
    let client = Arc::new(OllamaClient::new(
        &config.ollama_url,
        config.reasoning_timeout.as_secs(),
    ));
    let embedder = build_embedder(&config, client).context("embedding model unavailable")?;

    match ingest(&corpus, &index, embedder.as_ref(), force)? {
        IngestOutcome::Built { sections } => {
            println!("Indexed {sections} sections into {}", index.display())
        }
        IngestOutcome::Skipped { sections } => {
            println!("Index already present at {} ({sections} sections), skipped", index.display())
        }
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((filename, bytes))
}

fn run_analyze(config: AppConfig, incident: PathBuf, witnesses: Vec<PathBuf>) -> Result<()> {
    let (name, bytes) = read_document(&incident)?;
    let incident = Document::incident(name, bytes);
    let witnesses = witnesses
        .iter()
        .enumerate()
        .map(|(i, path)| {
            read_document(path).map(|(name, bytes)| Document::witness(i + 1, name, bytes))
        })
        .collect::<Result<Vec<_>>>()?;

    // Blocking HTTP clients are built and dropped outside the runtime
    let registry = ServiceRegistry::from_config(config);
    let pipeline = registry.pipeline();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    let report = runtime.block_on(pipeline.run(incident, witnesses))?;
    println!("{}", report.to_json_pretty()?);

    // An abandoned anchor may still be blocking on the ledger
    runtime.shutdown_background();
    Ok(())
}

fn run_verify(config: AppConfig, file: Option<PathBuf>, fingerprint: Option<String>) -> Result<()> {
    let fingerprint = match (file, fingerprint) {
        (Some(path), _) => hash(&read_document(&path)?.1),
        (None, Some(hex)) => ContentFingerprint::from_hex(&hex)?,
        (None, None) => bail!("either --file or --fingerprint is required"),
    };

    let ledger = build_ledger(&config.ledger);
    if ledger.mode() == LedgerMode::Mock {
        tracing::warn!("Mock ledger keeps anchors per process only; set NYAYA_LEDGER_MODE=live");
    }
    let record = ledger.verify(&fingerprint);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn run_evaluate(config: AppConfig, cases: PathBuf, json: bool) -> Result<()> {
    let cases = load_golden_cases(&cases)?;
    let registry = ServiceRegistry::from_config(config);
    let summary = evaluate(
        &registry.engine,
        registry.retriever.as_deref(),
        registry.config.top_k,
        &cases,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render_table());
    }
    Ok(())
}
