//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;

use newsmatch::article::{Article, RawArticle};
use newsmatch::embedding::MockEmbedder;
use newsmatch::events::{ArticleProgress, EventEmitter, EventKind, EventSubscriber};
use newsmatch::interest::{Interest, InterestKind, InterestSnapshot};
use newsmatch::llm::MockLlm;
use newsmatch::pipeline::{MatchPipeline, PipelineConfig};
use newsmatch::prefilter::EmbeddingPrefilter;
use newsmatch::retry::RetryPolicy;
use newsmatch::storage::{MatchStore, PersistenceGateway};
use newsmatch::verifier::LlmVerifier;

pub const AI_REGULATION_BODY: &str = "The European Parliament approved the final text of the AI Act, \
     the first comprehensive law regulating artificial intelligence systems by risk level.";
pub const AI_REGULATION_INTEREST: &str = "new AI regulation";
pub const FOOTBALL_BODY: &str = "The home side scored twice in stoppage time to win the derby.";
pub const FOOTBALL_INTEREST: &str = "football transfer news";

/// Embedder with fixed vectors for the fixture texts.
///
/// The AI regulation article scores 0.82 against its interest and about 0.57 against the
/// football interest; the football article scores 1.0 against football and 0 against AI.
pub fn fixture_embedder() -> MockEmbedder {
    MockEmbedder::new()
        .with_vector(AI_REGULATION_INTEREST, vec![1.0, 0.0])
        .with_vector(FOOTBALL_INTEREST, vec![0.0, 1.0])
        .with_vector(AI_REGULATION_BODY, vec![0.82, 0.5724])
        .with_vector(FOOTBALL_BODY, vec![0.0, 1.0])
}

pub fn article(slug: &str, title: &str, body: &str) -> Article {
    Article::from_raw(
        RawArticle {
            url: Some(format!("https://news.example.com/{}", slug)),
            title: title.to_string(),
            body: body.to_string(),
            ..Default::default()
        },
        "fixture",
        Utc::now(),
    )
}

pub fn ai_regulation_article() -> Article {
    article("eu-ai-act", "EU passes AI Act", AI_REGULATION_BODY)
}

pub fn football_article() -> Article {
    article("derby", "Late winner settles derby", FOOTBALL_BODY)
}

pub fn question(id: &str, text: &str) -> Interest {
    Interest::new(id, InterestKind::Question, text).unwrap()
}

pub fn snapshot(interests: Vec<Interest>) -> Arc<InterestSnapshot> {
    Arc::new(InterestSnapshot::new(1, interests))
}

pub fn default_snapshot() -> Arc<InterestSnapshot> {
    snapshot(vec![
        question("q1", AI_REGULATION_INTEREST),
        question("q2", FOOTBALL_INTEREST),
    ])
}

/// Pipeline wired to mocks, with fast retries and a 0.5 prefilter threshold.
pub struct TestPipeline {
    pub pipeline: MatchPipeline,
    pub events: Arc<EventEmitter>,
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        similarity_threshold: 0.5,
        ..Default::default()
    }
}

pub fn build_pipeline(
    store: Arc<dyn MatchStore>,
    embedder: Arc<MockEmbedder>,
    llm: Arc<MockLlm>,
    config: PipelineConfig,
) -> TestPipeline {
    let retry = RetryPolicy::immediate(2);
    let events = Arc::new(EventEmitter::new(128));
    let pipeline = MatchPipeline::new(
        Arc::new(EmbeddingPrefilter::new(embedder, retry.clone())),
        Arc::new(LlmVerifier::new(llm, retry.clone())),
        PersistenceGateway::new(store, retry),
        Arc::clone(&events),
        config,
    )
    .expect("valid pipeline config");
    TestPipeline { pipeline, events }
}

/// Article events received so far, in emission order.
pub fn article_events(subscriber: &mut EventSubscriber) -> Vec<ArticleProgress> {
    subscriber
        .drain()
        .into_iter()
        .filter_map(|event| match event.kind {
            EventKind::ArticleCompleted(progress) => Some(progress),
            _ => None,
        })
        .collect()
}
