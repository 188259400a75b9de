//! Match pipeline / orchestrator.
//!
//! Drives a batch of articles through dedup, the embedding prefilter, LLM verification and
//! the atomic per-article commit, publishing one event per resolved article.
//!
//! # Failure handling
//!
//! Nothing that goes wrong with a single article stops the run. An article whose embedding
//! fails, whose verifier calls fail for any candidate, or whose commit fails, ends up `errored`
//! and is not stored, so a later run picks it up again. A run aborts only when one dependency keeps failing past its retry budget for
//! `failure_budget` consecutive calls; the error reports how many articles were committed.

mod cancel;
mod error;
mod health;
mod state;
mod types;


pub use cancel::CancellationSignal;
pub use error::PipelineError;
pub use state::{ArticleState, ArticleTracker};
pub use types::{
    ArticleFailure, ArticleOutcome, Dependency, FailureKind, PipelineConfig, RunStats, RunSummary,
};

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::article::Article;
use crate::events::{ArticleProgress, ArticleStatus, EventEmitter, EventKind, MatchSummary};
use crate::interest::InterestSnapshot;
use crate::prefilter::{CandidatePair, EmbeddingPrefilter};
use crate::retry::Retryable;
use crate::storage::{MatchRecord, PersistenceGateway, Reservation};
use crate::verifier::{LlmVerifier, Verdict};
use health::DependencyHealth;

/// State shared by every article of one run.
struct RunContext {
    run_id: Uuid,
    snapshot: Arc<InterestSnapshot>,
    cancel: CancellationSignal,
    health: DependencyHealth,
}

impl RunContext {
    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.health.is_lost()
    }
}

enum PairOutcome {
    Confirmed(MatchRecord),
    Rejected,
    Unverified,
    Errored,
    /// Skipped because the run was stopping.
    NotStarted,
}

pub struct MatchPipeline {
    prefilter: Arc<EmbeddingPrefilter>,
    verifier: Arc<LlmVerifier>,
    gateway: PersistenceGateway,
    events: Arc<EventEmitter>,
    config: PipelineConfig,
    /// Bounds verifier calls across all articles.
    verifier_permits: Arc<Semaphore>,
}

impl std::fmt::Debug for MatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MatchPipeline {
    pub fn new(
        prefilter: Arc<EmbeddingPrefilter>,
        verifier: Arc<LlmVerifier>,
        gateway: PersistenceGateway,
        events: Arc<EventEmitter>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        Ok(Self {
            verifier_permits: Arc::new(Semaphore::new(config.verifier_concurrency)),
            prefilter,
            verifier,
            gateway,
            events,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Processes `articles` against `snapshot` until every article is resolved.
    ///
    /// Returns the summary, or [`PipelineError::DependencyLost`] (carrying the summary) when a
    /// dependency was lost. A cancelled run still returns `Ok` with `cancelled` set.
    pub async fn run(
        &self,
        articles: Vec<Article>,
        snapshot: Arc<InterestSnapshot>,
        cancel: &CancellationSignal,
    ) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let fetched = articles.len();

        info!(
            %run_id,
            articles = fetched,
            interests = snapshot.len(),
            interest_version = snapshot.version(),
            "Processing run started"
        );
        self.events.emit(
            run_id,
            EventKind::RunStarted {
                articles: fetched,
                interests: snapshot.len(),
                interest_version: snapshot.version(),
            },
        );

        if fetched > 0 && !snapshot.is_empty() {
            self.prefilter.warm(&snapshot).await;
        }

        let ctx = RunContext {
            run_id,
            snapshot: Arc::clone(&snapshot),
            cancel: cancel.clone(),
            health: DependencyHealth::new(self.config.failure_budget),
        };

        let outcomes: Vec<ArticleOutcome> = stream::iter(articles)
            .map(|article| self.process_article(&ctx, Arc::new(article)))
            .buffer_unordered(self.config.article_concurrency)
            .collect()
            .await;

        let mut stats = RunStats {
            fetched,
            ..Default::default()
        };
        for outcome in &outcomes {
            stats.record(outcome);
        }

        let summary = RunSummary {
            run_id,
            interest_version: snapshot.version(),
            started_at,
            finished_at: Utc::now(),
            cancelled: cancel.is_cancelled(),
            stats,
            outcomes,
        };

        if let Some((dependency, failures)) = ctx.health.lost() {
            self.events.emit(
                run_id,
                EventKind::RunAborted {
                    reason: format!("{} unavailable", dependency),
                    committed: stats.committed,
                },
            );
            return Err(PipelineError::DependencyLost {
                dependency,
                failures,
                committed: stats.committed,
                summary: Box::new(summary),
            });
        }

        if summary.cancelled {
            warn!(%run_id, committed = stats.committed, cancelled = stats.cancelled, "Processing run cancelled");
            self.events.emit(
                run_id,
                EventKind::RunAborted {
                    reason: "cancelled".to_string(),
                    committed: stats.committed,
                },
            );
        } else {
            info!(
                %run_id,
                matched = stats.matched,
                rejected = stats.rejected,
                skipped = stats.skipped,
                errored = stats.errored,
                match_records = stats.match_records,
                "Processing run completed"
            );
            self.events
                .emit(run_id, EventKind::RunCompleted { stats });
        }

        Ok(summary)
    }

    #[instrument(skip_all, fields(run_id = %ctx.run_id, article_id = %article.id))]
    async fn process_article(&self, ctx: &RunContext, article: Arc<Article>) -> ArticleOutcome {
        let mut tracker = ArticleTracker::new(article.id.clone());
        let mut outcome = ArticleOutcome::new(
            article.id.clone(),
            article.title.clone(),
            ArticleStatus::Cancelled,
        );

        if ctx.should_stop() {
            tracker.advance(ArticleState::Cancelled);
            return self.finish(ctx, &tracker, outcome);
        }

        // Dedup happens before any model call.
        let guard = match self.gateway.reserve(&article.id).await {
            Ok(Reservation::Acquired(guard)) => {
                ctx.health.success(Dependency::Storage);
                guard
            }
            Ok(Reservation::AlreadyStored) => {
                ctx.health.success(Dependency::Storage);
                tracker.advance(ArticleState::Skipped);
                return self.finish(ctx, &tracker, outcome);
            }
            Ok(Reservation::InFlight) => {
                tracker.advance(ArticleState::Skipped);
                return self.finish(ctx, &tracker, outcome);
            }
            Err(e) => {
                if e.is_transient() {
                    ctx.health.failure(Dependency::Storage);
                }
                tracker.advance(ArticleState::Errored);
                outcome.failure = Some(ArticleFailure {
                    kind: FailureKind::Storage,
                    message: e.to_string(),
                });
                return self.finish(ctx, &tracker, outcome);
            }
        };

        let candidates = match self
            .prefilter
            .filter_candidates(
                &article,
                &ctx.snapshot,
                self.config.similarity_threshold,
                self.config.max_candidates,
            )
            .await
        {
            Ok(candidates) => {
                ctx.health.success(Dependency::Embedding);
                candidates
            }
            Err(e) => {
                let kind = if e.is_transient() {
                    ctx.health.failure(Dependency::Embedding);
                    FailureKind::TransientService
                } else {
                    FailureKind::PermanentInput
                };
                tracker.advance(ArticleState::Errored);
                outcome.failure = Some(ArticleFailure {
                    kind,
                    message: e.to_string(),
                });
                return self.finish(ctx, &tracker, outcome);
            }
        };
        tracker.advance(ArticleState::EmbeddingFiltered);
        outcome.prefiltered = true;
        outcome.candidates = candidates.len();

        if !candidates.is_empty() {
            tracker.advance(ArticleState::Verifying);

            let mut not_started = 0usize;
            for pair in self.verify_candidates(ctx, &candidates).await {
                match pair {
                    PairOutcome::Confirmed(record) => {
                        outcome.verified_pairs += 1;
                        outcome.matches.push(record);
                    }
                    PairOutcome::Rejected => outcome.verified_pairs += 1,
                    PairOutcome::Unverified => outcome.unverified_pairs += 1,
                    PairOutcome::Errored => outcome.errored_pairs += 1,
                    PairOutcome::NotStarted => not_started += 1,
                }
            }

            if not_started > 0 {
                // Partially verified: leave it for a later run rather than commit a partial view.
                debug!(not_started, "Run stopping, article not committed");
                tracker.advance(ArticleState::Cancelled);
                return self.finish(ctx, &tracker, outcome);
            }

            if outcome.errored_pairs > 0 {
                // An article is stored only once every candidate pair has a verdict.
                for record in &outcome.matches {
                    warn!(
                        interest_id = %record.interest_id,
                        confidence = record.confidence,
                        explanation = %record.explanation,
                        "Verified match held back until every pair of the article is verified"
                    );
                }
                tracker.advance(ArticleState::Errored);
                outcome.failure = Some(ArticleFailure {
                    kind: FailureKind::TransientService,
                    message: format!(
                        "{} of {} verifier calls failed",
                        outcome.errored_pairs, outcome.candidates
                    ),
                });
                return self.finish(ctx, &tracker, outcome);
            }
        }

        match self
            .gateway
            .commit(&guard, &article, &outcome.matches)
            .await
        {
            Ok(receipt) => {
                ctx.health.success(Dependency::Storage);
                outcome.committed = true;
                debug!(
                    article_inserted = receipt.article_inserted,
                    matches_inserted = receipt.matches_inserted,
                    matches_existing = receipt.matches_existing,
                    "Article committed"
                );
                tracker.advance(if outcome.matches.is_empty() {
                    ArticleState::Rejected
                } else {
                    ArticleState::Matched
                });
            }
            Err(e) => {
                if e.is_transient() {
                    ctx.health.failure(Dependency::Storage);
                }
                for record in &outcome.matches {
                    error!(
                        interest_id = %record.interest_id,
                        confidence = record.confidence,
                        explanation = %record.explanation,
                        error = %e,
                        "Verified match could not be persisted"
                    );
                }
                tracker.advance(ArticleState::Errored);
                outcome.failure = Some(ArticleFailure {
                    kind: FailureKind::Storage,
                    message: e.to_string(),
                });
            }
        }
        drop(guard);

        self.finish(ctx, &tracker, outcome)
    }

    async fn verify_candidates(
        &self,
        ctx: &RunContext,
        candidates: &[CandidatePair],
    ) -> Vec<PairOutcome> {
        stream::iter(candidates)
            .map(|candidate| self.verify_pair(ctx, candidate))
            .buffer_unordered(self.config.verifier_concurrency)
            .collect()
            .await
    }

    async fn verify_pair(&self, ctx: &RunContext, candidate: &CandidatePair) -> PairOutcome {
        let Ok(_permit) = self.verifier_permits.acquire().await else {
            return PairOutcome::NotStarted;
        };
        if ctx.should_stop() {
            return PairOutcome::NotStarted;
        }

        match self
            .verifier
            .verify(&candidate.article, &candidate.interest)
            .await
        {
            Ok(response) => {
                ctx.health.success(Dependency::Llm);
                match response.verdict(self.config.confidence_threshold) {
                    Verdict::Confirmed(result) => PairOutcome::Confirmed(MatchRecord {
                        article_id: candidate.article.id.clone(),
                        interest_id: candidate.interest.id.clone(),
                        interest_kind: candidate.interest.kind,
                        interest_text: candidate.interest.text.clone(),
                        verified: true,
                        confidence: result.confidence,
                        explanation: result.explanation,
                        similarity: candidate.similarity,
                        decided_at: Utc::now(),
                    }),
                    Verdict::Rejected(_) => PairOutcome::Rejected,
                    Verdict::Unverified { .. } => PairOutcome::Unverified,
                }
            }
            Err(e) => {
                if e.is_transient() {
                    ctx.health.failure(Dependency::Llm);
                }
                warn!(
                    interest_id = %candidate.interest.id,
                    error = %e,
                    "Verification failed, pair errored"
                );
                PairOutcome::Errored
            }
        }
    }

    /// Stamps the final status, reports the article and returns its outcome.
    fn finish(
        &self,
        ctx: &RunContext,
        tracker: &ArticleTracker,
        mut outcome: ArticleOutcome,
    ) -> ArticleOutcome {
        outcome.status = tracker.state().status().unwrap_or(ArticleStatus::Errored);

        match outcome.status {
            ArticleStatus::Errored => warn!(
                status = %outcome.status,
                error = outcome.failure.as_ref().map(|f| f.message.as_str()),
                "Article errored"
            ),
            _ => info!(
                status = %outcome.status,
                candidates = outcome.candidates,
                matches = outcome.matches.len(),
                "Article resolved"
            ),
        }

        self.events.emit(
            ctx.run_id,
            EventKind::ArticleCompleted(ArticleProgress {
                article_id: outcome.article_id.clone(),
                title: outcome.title.clone(),
                status: outcome.status,
                candidates: outcome.candidates,
                matches: outcome
                    .matches
                    .iter()
                    .map(|m| MatchSummary {
                        interest_id: m.interest_id.clone(),
                        confidence: m.confidence,
                        explanation: m.explanation.clone(),
                    })
                    .collect(),
                errored_pairs: outcome.errored_pairs,
                error: outcome.failure.as_ref().map(|f| f.message.clone()),
            }),
        );
        outcome
    }
}
