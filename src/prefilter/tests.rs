use super::*;
use crate::article::RawArticle;
use crate::embedding::MockEmbedder;
use crate::interest::InterestKind;
use chrono::Utc;

fn article(title: &str, body: &str) -> Arc<Article> {
    Arc::new(Article::from_raw(
        RawArticle {
            title: title.to_string(),
            body: body.to_string(),
            ..Default::default()
        },
        "test",
        Utc::now(),
    ))
}

fn interest(id: &str, text: &str) -> Interest {
    Interest::new(id, InterestKind::Question, text).unwrap()
}

fn prefilter(embedder: Arc<MockEmbedder>) -> EmbeddingPrefilter {
    EmbeddingPrefilter::new(embedder, RetryPolicy::immediate(3))
}

#[tokio::test]
async fn test_candidates_above_threshold_sorted_by_score() {
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_vector("ai regulation news", vec![1.0, 0.0])
            .with_vector("close", vec![0.9, 0.43589])
            .with_vector("closer", vec![0.98, 0.19899])
            .with_vector("far", vec![0.0, 1.0]),
    );
    let snapshot = InterestSnapshot::new(
        1,
        vec![
            interest("q-close", "close"),
            interest("q-far", "far"),
            interest("q-closer", "closer"),
        ],
    );

    let candidates = prefilter(embedder)
        .filter_candidates(&article("t", "ai regulation news"), &snapshot, 0.5, None)
        .await
        .unwrap();

    let ids: Vec<_> = candidates.iter().map(|c| c.interest.id.as_str()).collect();
    assert_eq!(ids, vec!["q-closer", "q-close"]);
    assert!(candidates[0].similarity > candidates[1].similarity);
}

#[tokio::test]
async fn test_score_equal_to_threshold_is_kept() {
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_vector("body", vec![1.0, 0.0])
            .with_vector("same", vec![1.0, 0.0]),
    );
    let snapshot = InterestSnapshot::new(1, vec![interest("q1", "same")]);

    let candidates = prefilter(embedder)
        .filter_candidates(&article("t", "body"), &snapshot, 1.0, None)
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn test_interest_vectors_are_cached_across_articles() {
    let embedder = Arc::new(MockEmbedder::new());
    let prefilter = prefilter(embedder.clone());
    let snapshot = InterestSnapshot::new(
        1,
        vec![interest("q1", "AI regulation"), interest("q2", "fusion power")],
    );

    assert_eq!(prefilter.warm(&snapshot).await, 2);
    assert_eq!(embedder.call_count(), 2);

    prefilter
        .filter_candidates(&article("a", "AI regulation in Europe"), &snapshot, 0.1, None)
        .await
        .unwrap();
    prefilter
        .filter_candidates(&article("b", "Fusion power plant"), &snapshot, 0.1, None)
        .await
        .unwrap();

    // One call per article, none for interests.
    assert_eq!(embedder.call_count(), 4);
    assert_eq!(prefilter.cached_interests(), 2);
}

#[tokio::test]
async fn test_warm_evicts_interests_no_longer_listed() {
    let embedder = Arc::new(MockEmbedder::new());
    let prefilter = prefilter(embedder);

    let v1 = InterestSnapshot::new(1, vec![interest("q1", "alpha"), interest("q2", "beta")]);
    prefilter.warm(&v1).await;
    assert_eq!(prefilter.cached_interests(), 2);

    let v2 = InterestSnapshot::new(2, vec![interest("q1", "alpha changed")]);
    prefilter.warm(&v2).await;
    assert_eq!(prefilter.cached_interests(), 1);
}

#[tokio::test]
async fn test_precomputed_interest_embedding_skips_model() {
    let embedder = Arc::new(MockEmbedder::new().with_vector("body", vec![0.0, 1.0]));
    let snapshot = InterestSnapshot::new(
        1,
        vec![interest("q1", "anything").with_embedding(vec![0.0, 1.0])],
    );

    let candidates = prefilter(embedder.clone())
        .filter_candidates(&article("t", "body"), &snapshot, 0.9, None)
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(embedder.call_count(), 1);
}

#[tokio::test]
async fn test_blank_body_falls_back_to_title() {
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_vector("Only a title", vec![1.0, 0.0])
            .with_vector("match", vec![1.0, 0.0]),
    );
    let snapshot = InterestSnapshot::new(1, vec![interest("q1", "match")]);

    let candidates = prefilter(embedder)
        .filter_candidates(&article("Only a title", "   "), &snapshot, 0.9, None)
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn test_empty_article_is_permanent_error() {
    let embedder = Arc::new(MockEmbedder::new());
    let snapshot = InterestSnapshot::new(1, vec![interest("q1", "x")]);

    let err = prefilter(embedder)
        .filter_candidates(&article(" ", ""), &snapshot, 0.5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PrefilterError::EmptyArticle { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_long_body_is_truncated_before_embedding() {
    let body = "word ".repeat(100);
    let expected = crate::article::truncate_chars(body.trim(), 12).to_string();
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_vector(&expected, vec![1.0, 0.0])
            .with_vector("target", vec![1.0, 0.0]),
    );
    let snapshot = InterestSnapshot::new(1, vec![interest("q1", "target")]);

    let candidates = prefilter(embedder)
        .with_max_input_chars(12)
        .filter_candidates(&article("t", &body), &snapshot, 0.99, None)
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let embedder = Arc::new(MockEmbedder::new());
    embedder.fail_next(2);
    let snapshot = InterestSnapshot::new(1, vec![interest("q1", "AI regulation")]);

    let result = prefilter(embedder.clone())
        .filter_candidates(&article("t", "AI regulation"), &snapshot, 0.5, None)
        .await;
    assert_eq!(result.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unavailable_service_is_transient_error() {
    let embedder = Arc::new(MockEmbedder::new());
    embedder.set_unavailable(true);
    let snapshot = InterestSnapshot::new(1, vec![interest("q1", "AI regulation")]);

    let err = prefilter(embedder.clone())
        .filter_candidates(&article("t", "AI regulation"), &snapshot, 0.5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PrefilterError::ArticleEmbedding { .. }));
    assert!(err.is_transient());
    assert_eq!(embedder.call_count(), 3);
}

#[tokio::test]
async fn test_interest_with_mismatched_dimension_is_skipped() {
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_vector("body", vec![1.0, 0.0, 0.0])
            .with_vector("good", vec![1.0, 0.0, 0.0]),
    );
    let snapshot = InterestSnapshot::new(
        1,
        vec![
            interest("q-stale", "x").with_embedding(vec![1.0, 0.0]),
            interest("q-good", "good"),
        ],
    );

    let candidates = prefilter(embedder)
        .filter_candidates(&article("t", "body"), &snapshot, 0.5, None)
        .await
        .unwrap();

    let ids: Vec<_> = candidates.iter().map(|c| c.interest.id.as_str()).collect();
    assert_eq!(ids, vec!["q-good"]);
}

#[tokio::test]
async fn test_interest_rejected_by_model_is_skipped() {
    let embedder = Arc::new(
        MockEmbedder::new()
            .with_vector("body", vec![1.0, 0.0])
            .with_vector("good", vec![1.0, 0.0])
            .rejecting("unembeddable"),
    );
    let snapshot = InterestSnapshot::new(
        1,
        vec![
            interest("q-bad", "unembeddable interest"),
            interest("q-good", "good"),
        ],
    );

    let candidates = prefilter(embedder)
        .filter_candidates(&article("t", "body"), &snapshot, 0.5, None)
        .await
        .unwrap();

    let ids: Vec<_> = candidates.iter().map(|c| c.interest.id.as_str()).collect();
    assert_eq!(ids, vec!["q-good"]);
}

/// Embeds everything except one text, which always fails transiently.
struct DownFor(&'static str);

#[async_trait::async_trait]
impl EmbeddingService for DownFor {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::embedding::EmbeddingError> {
        if text == self.0 {
            return Err(crate::embedding::EmbeddingError::Unavailable {
                reason: "connection refused".to_string(),
            });
        }
        Ok(vec![1.0, 0.0])
    }

    fn model_name(&self) -> &str {
        "down-for"
    }
}

#[tokio::test]
async fn test_transient_interest_failure_fails_the_article() {
    let snapshot = InterestSnapshot::new(
        1,
        vec![interest("q1", "reachable"), interest("q2", "flaky")],
    );

    let err = EmbeddingPrefilter::new(Arc::new(DownFor("flaky")), RetryPolicy::immediate(2))
        .filter_candidates(&article("t", "body"), &snapshot, 0.5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PrefilterError::InterestEmbedding { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_candidates_capped_at_max_keeping_the_best() {
    let mut embedder = MockEmbedder::new().with_vector("body", vec![1.0, 0.0]);
    let mut interests = Vec::new();
    for i in 0..6 {
        let y = 0.1 * i as f32;
        embedder = embedder.with_vector(&format!("interest-{i}"), vec![1.0, y]);
        interests.push(interest(&format!("q{i}"), &format!("interest-{i}")));
    }
    let snapshot = InterestSnapshot::new(1, interests);
    let prefilter = prefilter(Arc::new(embedder));

    let uncapped = prefilter
        .filter_candidates(&article("t", "body"), &snapshot, 0.55, None)
        .await
        .unwrap();
    assert_eq!(uncapped.len(), 6);

    let capped = prefilter
        .filter_candidates(&article("t", "body"), &snapshot, 0.55, Some(5))
        .await
        .unwrap();
    let ids: Vec<_> = capped.iter().map(|c| c.interest.id.as_str()).collect();
    assert_eq!(ids, vec!["q0", "q1", "q2", "q3", "q4"]);
}

#[tokio::test]
async fn test_empty_snapshot_makes_no_calls() {
    let embedder = Arc::new(MockEmbedder::new());
    let candidates = prefilter(embedder.clone())
        .filter_candidates(&article("t", "body"), &InterestSnapshot::empty(), 0.5, None)
        .await
        .unwrap();
    assert!(candidates.is_empty());
    assert_eq!(embedder.call_count(), 0);
}
