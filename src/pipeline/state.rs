use tracing::{trace, warn};

use crate::article::ArticleId;
use crate::events::ArticleStatus;

/// Per-article processing state.
///
/// `Fetched -> EmbeddingFiltered -> Verifying -> {Matched | Rejected | Errored}`, with
/// `Skipped` reachable only from `Fetched` and `Cancelled` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleState {
    Fetched,
    EmbeddingFiltered,
    Verifying,
    Matched,
    Rejected,
    Errored,
    Skipped,
    Cancelled,
}

impl ArticleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArticleState::Matched
                | ArticleState::Rejected
                | ArticleState::Errored
                | ArticleState::Skipped
                | ArticleState::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: ArticleState) -> bool {
        use ArticleState::*;

        match (self, next) {
            (Fetched, EmbeddingFiltered | Skipped | Errored | Cancelled) => true,
            // No candidates: rejected without verification.
            (EmbeddingFiltered, Verifying | Rejected | Errored | Cancelled) => true,
            (Verifying, Matched | Rejected | Errored | Cancelled) => true,
            _ => false,
        }
    }

    /// Status reported for a terminal state.
    pub fn status(&self) -> Option<ArticleStatus> {
        match self {
            ArticleState::Matched => Some(ArticleStatus::Matched),
            ArticleState::Rejected => Some(ArticleStatus::Rejected),
            ArticleState::Errored => Some(ArticleStatus::Errored),
            ArticleState::Skipped => Some(ArticleStatus::Skipped),
            ArticleState::Cancelled => Some(ArticleStatus::Cancelled),
            _ => None,
        }
    }
}

/// Tracks one article through [`ArticleState`], logging every transition.
#[derive(Debug)]
pub struct ArticleTracker {
    id: ArticleId,
    state: ArticleState,
}

impl ArticleTracker {
    pub fn new(id: ArticleId) -> Self {
        Self {
            id,
            state: ArticleState::Fetched,
        }
    }

    pub fn state(&self) -> ArticleState {
        self.state
    }

    /// Moves to `next`. Invalid transitions are refused and logged.
    pub fn advance(&mut self, next: ArticleState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                article_id = %self.id,
                from = ?self.state,
                to = ?next,
                "Refusing invalid article state transition"
            );
            return false;
        }
        trace!(article_id = %self.id, from = ?self.state, to = ?next, "Article state change");
        self.state = next;
        true
    }
}
