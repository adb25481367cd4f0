use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_rag::config::{ChunkArgs, IdStrategyArg, LogArgs, OpenAiArgs, PineconeArgs};
use pdf_rag::{telemetry, IngestConfig, IngestionPipeline, IngestionReport, Metric};

#[derive(Parser, Debug)]
#[command(
    name = "pdf-rag-ingest",
    about = "Chunk, embed and upload a folder of PDF documents into the vector index"
)]
struct IngestCli {
    /// Folder containing the source documents (.pdf, .txt, .md)
    #[arg(long, env = "PDF_RAG_SOURCE_DIR", default_value = "PDFs")]
    source: PathBuf,

    /// Records sent per upsert request (max 100)
    #[arg(long, env = "PDF_RAG_UPSERT_BATCH", default_value_t = 100)]
    batch_size: usize,

    /// Number of concurrent embedding workers
    #[arg(long, env = "PDF_RAG_EMBED_WORKERS", default_value_t = 1)]
    workers: usize,

    /// How chunk ids are derived
    #[arg(long, value_enum, default_value_t = IdStrategyArg::Sequential)]
    ids: IdStrategyArg,

    /// Retry failed upsert batches once before reporting them
    #[arg(long, default_value_t = false)]
    retry_failed: bool,

    /// Optional JSON report output path
    #[arg(long)]
    report_json: Option<PathBuf>,

    #[command(flatten)]
    chunks: ChunkArgs,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    pinecone: PineconeArgs,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = IngestCli::parse();
    telemetry::init(cli.log.verbose);

    let config = IngestConfig {
        chunking: cli.chunks.chunk_config()?,
        dimension: cli.openai.index_dimension(),
        metric: Metric::Cosine,
        batch_size: cli.batch_size,
        workers: cli.workers,
        id_strategy: cli.ids.into(),
    };
    let embedder = cli.openai.embedder()?;
    let store = cli.pinecone.store()?;
    let pipeline = IngestionPipeline::new(embedder, store, config)?;

    println!("=== Document ingestion into '{}' ===", cli.pinecone.index);
    let mut report = pipeline
        .ingest(&cli.source)
        .with_context(|| format!("ingestion of {:?} failed", cli.source))?;

    if cli.retry_failed && !report.failed_batches.is_empty() {
        println!(
            "Retrying {} failed batch(es)...",
            report.failed_batches.len()
        );
        let failed = std::mem::take(&mut report.failed_batches);
        let retried = pipeline.retry_failed(failed);
        report.upserted += retried.upserted;
        report.failed_batches = retried.failures;
    }

    print_report(&report);
    if let Some(path) = &cli.report_json {
        let file =
            File::create(path).with_context(|| format!("failed to create report {:?}", path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .context("failed to write JSON report")?;
        println!("Report written to {}", path.display());
    }
    if !report.is_complete() {
        eprintln!("ingestion finished with dropped chunks or failed batches; see report above.");
    }
    Ok(())
}

fn print_report(report: &IngestionReport) {
    println!();
    println!("Documents loaded:     {}", report.documents_loaded);
    for failure in &report.documents_failed {
        println!("  skipped: {failure}");
    }
    println!("Chunks created:       {}", report.chunks_created);
    println!(
        "Embeddings:           {}/{} succeeded",
        report.embeddings_succeeded, report.embeddings_attempted
    );
    for failure in &report.embedding_failures {
        println!("  dropped chunk {}: {}", failure.chunk_id, failure.error);
    }
    println!("Vectors upserted:     {}", report.upserted);
    for failure in &report.failed_batches {
        let ids = failure.record_ids();
        println!(
            "  batch {} failed ({} records, ids {}..{}): {}",
            failure.batch_index,
            ids.len(),
            ids.first().copied().unwrap_or("-"),
            ids.last().copied().unwrap_or("-"),
            failure.error
        );
    }
    if report.is_complete() {
        println!("\nThe documents are now indexed and ready to query.");
    }
}
