use std::time::Duration;

use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("LLM request rejected: {reason}")]
    Rejected { reason: String },
}

impl Retryable for LlmError {
    fn is_transient(&self) -> bool {
        matches!(self, LlmError::Unavailable { .. } | LlmError::Timeout { .. })
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        LlmError::Timeout {
            operation: operation.to_string(),
            after,
        }
    }
}

impl From<genai::Error> for LlmError {
    fn from(err: genai::Error) -> Self {
        let reason = err.to_string();
        match err {
            genai::Error::WebModelCall { webc_error, .. }
            | genai::Error::WebAdapterCall { webc_error, .. } => match webc_error {
                genai::webc::Error::ResponseFailedStatus { status, .. } => {
                    classify_status(status.as_u16(), reason)
                }
                _ => LlmError::Unavailable { reason },
            },
            genai::Error::RequiresApiKey { .. }
            | genai::Error::NoAuthResolver { .. }
            | genai::Error::NoAuthData { .. }
            | genai::Error::ChatReqHasNoMessages { .. }
            | genai::Error::MessageRoleNotSupported { .. }
            | genai::Error::AdapterNotSupported { .. } => LlmError::Rejected { reason },
            _ => LlmError::Unavailable { reason },
        }
    }
}

/// 429 and 5xx are worth retrying; any other HTTP failure is a bad request or bad credentials.
pub(crate) fn classify_status(status: u16, reason: String) -> LlmError {
    if status == 429 || status >= 500 {
        LlmError::Unavailable { reason }
    } else {
        LlmError::Rejected { reason }
    }
}
