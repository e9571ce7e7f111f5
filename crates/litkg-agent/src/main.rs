//! litkg: Biomedical literature triple extraction.
//! Entry point for the worker binary.
//!
//! Usage:
//!   litkg partition --from 2020-01-01 --to 2020-12-31 [--shards N] [--replace] [--benchmark]
//!   litkg plan --total 120000
//!   litkg extract --index 3        (or LITKG_SHARD_INDEX=3 litkg extract)

mod config;

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use litkg_db::{DocumentSelection, DocumentStore, DryRunSink, PgStore, RowSink};
use litkg_ingestion::{plan_shard_count, BatchPipeline, PaperPartitioner, ShardStore};
use litkg_ner::{AnnotationGateway, CoreNlpService, HttpEntityLinker, SystemMemoryProbe};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "litkg")]
#[command(about = "Extract concept-anchored triples from biomedical abstracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split the matching documents into one shard file per worker
    Partition {
        /// First publication date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last publication date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Number of shards. Planned from the document count when omitted.
        #[arg(long)]
        shards: Option<usize>,
        /// Include documents that already have triples
        #[arg(long)]
        replace: bool,
        /// Give every shard the same leading documents
        #[arg(long)]
        benchmark: bool,
    },
    /// Print how many shards a document count needs
    Plan {
        #[arg(long)]
        total: usize,
    },
    /// Run extraction over one shard
    Extract {
        #[arg(long, env = "LITKG_SHARD_INDEX")]
        index: usize,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("litkg=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Partition { from, to, shards, replace, benchmark } => {
            partition(&Config::load()?, from, to, shards, replace, benchmark)
        }
        Commands::Plan { total } => {
            let config = Config::load_or_default()?;
            let shards = plan_shard_count(
                total,
                config.partition.max_per_shard,
                config.partition.available_nodes,
            )?;
            info!(
                total,
                max_per_shard = config.partition.max_per_shard,
                available_nodes = config.partition.available_nodes,
                shards,
                "Shard plan"
            );
            println!("{shards}");
            Ok(())
        }
        Commands::Extract { index } => extract(&Config::load()?, index),
    }
}

fn connect(config: &Config) -> anyhow::Result<Arc<PgStore>> {
    let store = PgStore::connect(config.database_url()?, config.database.max_connections)
        .context("Could not connect to the document store")?;
    Ok(Arc::new(store))
}

fn partition(
    config: &Config,
    from: NaiveDate,
    to: NaiveDate,
    shards: Option<usize>,
    replace: bool,
    benchmark: bool,
) -> anyhow::Result<()> {
    if from > to {
        anyhow::bail!("--from {from} is after --to {to}");
    }
    let store = connect(config)?;
    let ids = store.list_document_ids(&DocumentSelection {
        published_from: from,
        published_to: to,
        include_processed: replace,
    })?;
    info!(%from, %to, documents = ids.len(), replace, "Documents selected");

    let shard_count = match shards {
        Some(n) => n,
        None => plan_shard_count(
            ids.len(),
            config.partition.max_per_shard,
            config.partition.available_nodes,
        )?,
    };
    let mut partitioner = PaperPartitioner::new(shard_count)?;
    if benchmark {
        partitioner = partitioner.benchmark(config.partition.benchmark_size);
    }

    let shard_store = ShardStore::new(&config.extraction.shard_directory);
    shard_store.write_all(&partitioner.partition(&ids))?;
    println!("{shard_count}");
    Ok(())
}

fn extract(config: &Config, index: usize) -> anyhow::Result<()> {
    let shard = ShardStore::new(&config.extraction.shard_directory)
        .load(index)
        .with_context(|| format!("Could not load shard {index}"))?;
    if shard.is_empty() {
        warn!(index, "Shard is empty; nothing to extract");
        return Ok(());
    }

    let store = connect(config)?;
    let sink: Arc<dyn RowSink> = if config.extraction.db_insert {
        store.clone() as Arc<dyn RowSink>
    } else {
        warn!("Database insertion disabled; rows will not be written");
        Arc::new(DryRunSink)
    };

    let service = CoreNlpService::new(config.annotator.service_config())?;
    let gateway = Arc::new(AnnotationGateway::new(
        service,
        SystemMemoryProbe::new(),
        config.annotator.gateway_config(),
    ));
    let linker = HttpEntityLinker::new(
        config.linker.endpoints.clone(),
        std::time::Duration::from_millis(config.linker.timeout_ms),
    )?;

    let pipeline = BatchPipeline::new(
        store,
        sink,
        gateway.clone(),
        Arc::new(linker),
        config.pipeline_config(),
    );
    let result = pipeline.run_shard(&shard);

    if let Err(e) = gateway.shutdown() {
        warn!(error = %e, "Annotation service did not shut down cleanly");
    }

    let summary = result.with_context(|| format!("Extraction of shard {index} failed"))?;
    info!(
        index,
        run_id = %summary.run_id,
        succeeded = summary.succeeded,
        rows_written = summary.rows_written,
        "Shard complete"
    );
    Ok(())
}
