//! Newsmatch entrypoint: one processing run over the configured feeds.
//!
//! `newsmatch` processes the configured article feeds and prints progress events as JSON lines.
//! `newsmatch --recent [N]` prints the N most recently stored articles with their matches.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use mimalloc::MiMalloc;
use tokio::signal;

use newsmatch::config::Config;
use newsmatch::embedding::OllamaEmbedder;
use newsmatch::events::EventEmitter;
use newsmatch::interest::{FileInterestSource, InterestStore};
use newsmatch::llm::GenaiLlm;
use newsmatch::pipeline::{CancellationSignal, MatchPipeline, PipelineError};
use newsmatch::prefilter::EmbeddingPrefilter;
use newsmatch::sources::{ArticleSource, JsonLinesSource, collect_batch};
use newsmatch::storage::{MatchStore, PersistenceGateway, SqliteStore};
use newsmatch::verifier::LlmVerifier;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_RECENT_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    let store: Arc<dyn MatchStore> = Arc::new(SqliteStore::open(&config.db_path)?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--recent") {
        let limit = match args.get(pos + 1) {
            Some(n) => n.parse()?,
            None => DEFAULT_RECENT_LIMIT,
        };
        return print_recent(store.as_ref(), limit).await;
    }

    tracing::info!(
        db_path = %config.db_path.display(),
        embed_model = %config.embed_model,
        llm_model = %config.llm_model,
        "Newsmatch starting"
    );

    let interests = InterestStore::new(Box::new(FileInterestSource::new(
        config.questions_path.clone(),
        config.topics_path.clone(),
    )));
    let snapshot = interests.reload().await?;

    let sources: Vec<Arc<dyn ArticleSource>> = config
        .articles_paths
        .iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Arc::new(JsonLinesSource::new(name, path)) as Arc<dyn ArticleSource>
        })
        .collect();
    let batch = collect_batch(&sources, config.max_articles_per_source, Utc::now()).await;
    tracing::info!(
        articles = batch.articles.len(),
        malformed = batch.malformed,
        duplicates = batch.duplicates,
        "Fetched article batch"
    );

    let retry = config.retry_policy();
    let embedder = Arc::new(OllamaEmbedder::new(config.ollama_config())?);
    let llm = Arc::new(GenaiLlm::new(config.llm_model.clone()));
    let events = Arc::new(EventEmitter::new(config.event_capacity));

    let pipeline = MatchPipeline::new(
        Arc::new(
            EmbeddingPrefilter::new(embedder, retry.clone())
                .with_max_input_chars(config.max_embed_chars),
        ),
        Arc::new(LlmVerifier::new(llm, retry.clone()).with_excerpt_chars(config.excerpt_chars)),
        PersistenceGateway::new(store, retry),
        Arc::clone(&events),
        config.pipeline_config(),
    )?;

    let subscriber = events.subscribe();
    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        if let Err(e) = subscriber.write_json_lines(&mut stdout).await {
            tracing::warn!(error = %e, "Stdout closed, no further events will be printed");
        }
    });

    let cancel = CancellationSignal::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, finishing in-flight work");
            on_signal.cancel();
        }
    });

    let result = pipeline.run(batch.articles, snapshot, &cancel).await;

    // Dropping the last emitter handle ends the subscriber stream.
    drop(pipeline);
    drop(events);
    let _ = printer.await;

    match result {
        Ok(summary) => {
            tracing::info!(
                run_id = %summary.run_id,
                matched = summary.stats.matched,
                committed = summary.stats.committed,
                cancelled = summary.cancelled,
                "Newsmatch run finished"
            );
            Ok(())
        }
        Err(PipelineError::DependencyLost {
            dependency,
            committed,
            ..
        }) => Err(anyhow::anyhow!(
            "{} unavailable; run aborted after {} articles were committed",
            dependency,
            committed
        )),
        Err(e) => Err(e.into()),
    }
}

async fn print_recent(store: &dyn MatchStore, limit: usize) -> anyhow::Result<()> {
    let recent = store.recent_articles(limit).await?;
    let mut stdout = std::io::stdout().lock();
    for stored in recent {
        writeln!(stdout, "{}", serde_json::to_string(&stored)?)?;
    }
    Ok(())
}
