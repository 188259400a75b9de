//! Lenient reader for model judgments.
//!
//! Models wrap JSON in code fences, add prose, rename keys and quote booleans. Everything
//! that still carries an unambiguous judgment is accepted; everything else is `Unparsable`.

use serde_json::{Map, Value};

use super::types::{VerificationResponse, VerificationResult};

const MATCH_KEYS: &[&str] = &["match", "matched", "relevant", "is_relevant"];
const EXPLANATION_KEYS: &[&str] = &["explanation", "reason"];

/// Parses a raw completion into a tagged response. Never fails.
pub fn parse_response(raw: &str) -> VerificationResponse {
    match parse_judgment(raw) {
        Some(result) => VerificationResponse::Parsed(result),
        None => VerificationResponse::Unparsable {
            raw_text: raw.to_string(),
        },
    }
}

fn parse_judgment(raw: &str) -> Option<VerificationResult> {
    let object = extract_object(raw)?;

    let matched = MATCH_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(as_bool)?;

    let confidence = object.get("confidence").and_then(as_confidence)?;

    let explanation = EXPLANATION_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    Some(VerificationResult {
        matched,
        confidence,
        explanation,
    })
}

/// Finds the outermost `{ ... }` in `raw` and reads it as a JSON object.
fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str::<Value>(&raw[start..=end]).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_confidence(value: &Value) -> Option<f32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && (0.0..=1.0).contains(&number)).then_some(number as f32)
}
