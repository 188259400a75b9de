use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::mock::judgment_json;
use super::*;
use crate::retry::Retryable;

#[test]
fn test_judgment_json_shape() {
    let value: serde_json::Value =
        serde_json::from_str(&judgment_json(true, 0.5, "On topic.")).unwrap();
    assert_eq!(value["match"], true);
    assert_eq!(value["confidence"], 0.5);
    assert_eq!(value["explanation"], "On topic.");
}

#[test]
fn test_error_classification() {
    assert!(
        LlmError::Unavailable {
            reason: "refused".to_string()
        }
        .is_transient()
    );
    assert!(LlmError::timed_out("complete", Duration::from_secs(1)).is_transient());
    assert!(
        !LlmError::Rejected {
            reason: "prompt too long".to_string()
        }
        .is_transient()
    );
}

#[test]
fn test_http_status_classification() {
    use super::error::classify_status;

    assert!(classify_status(503, "overloaded".to_string()).is_transient());
    assert!(classify_status(429, "slow down".to_string()).is_transient());
    assert!(matches!(
        classify_status(401, "bad key".to_string()),
        LlmError::Rejected { .. }
    ));
    assert!(matches!(
        classify_status(404, "model not found".to_string()),
        LlmError::Rejected { .. }
    ));
}

#[test]
fn test_genai_internal_error_is_transient() {
    let err = LlmError::from(genai::Error::Internal("stream reset".to_string()));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_mock_records_prompts_and_peak_concurrency() {
    let llm = Arc::new(MockLlm::always("ok").with_delay(Duration::from_millis(20)));

    let replies = join_all((0..3).map(|i| {
        let llm = Arc::clone(&llm);
        async move { llm.complete(&format!("prompt {i}")).await }
    }))
    .await;

    assert!(replies.iter().all(|r| matches!(r.as_deref(), Ok("ok"))));
    assert_eq!(llm.call_count(), 3);
    assert_eq!(llm.calls_containing("prompt 1"), 1);
    assert_eq!(llm.peak_concurrency(), 3);
}

#[tokio::test]
async fn test_mock_responder_sees_prompt() {
    let llm = MockLlm::new(|prompt| {
        if prompt.contains("fail") {
            Err(LlmError::Rejected {
                reason: "no".to_string(),
            })
        } else {
            Ok(prompt.to_uppercase())
        }
    });

    assert_eq!(llm.complete("hello").await.unwrap(), "HELLO");
    assert!(llm.complete("please fail").await.is_err());
    assert_eq!(llm.prompts(), vec!["hello", "please fail"]);
}
