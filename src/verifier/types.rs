use serde::{Deserialize, Serialize};

/// Structured judgment returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub matched: bool,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub explanation: String,
}

/// What came back from one verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationResponse {
    Parsed(VerificationResult),
    /// The reply could not be read as a judgment; the pair counts as unverified.
    Unparsable { raw_text: String },
}

/// A response after the confidence threshold has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// `matched` and confidence at or above the threshold: becomes a match record.
    Confirmed(VerificationResult),
    /// Not matched, or matched below the threshold.
    Rejected(VerificationResult),
    Unverified { raw_text: String },
}

impl VerificationResponse {
    pub fn verdict(self, confidence_threshold: f32) -> Verdict {
        match self {
            VerificationResponse::Parsed(result)
                if result.matched && result.confidence >= confidence_threshold =>
            {
                Verdict::Confirmed(result)
            }
            VerificationResponse::Parsed(result) => Verdict::Rejected(result),
            VerificationResponse::Unparsable { raw_text } => Verdict::Unverified { raw_text },
        }
    }
}

impl Verdict {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Verdict::Confirmed(_))
    }
}
