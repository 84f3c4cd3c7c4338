//! Decoding backend output into decisions
//!
//! Backend text arrives in one of three shapes:
//! 1. A CLI envelope `{"result": <string or object>}`
//! 2. The extraction object itself, `{"decisions": [...], ...}`
//! 3. Either of the above inside a markdown code fence or surrounded by prose
//!
//! Each decision record is decoded on its own. A malformed record is dropped
//! with a warning and its siblings survive.

use super::types::Decision;
use serde_json::Value;

/// Decisions and participant names recovered from one backend response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub decisions: Vec<Decision>,
    pub participants_detected: Vec<String>,
    /// Records that failed to decode
    pub dropped: usize,
}

/// Extract a JSON object from free-form response text.
///
/// Tries, in order: direct parse, a ```json fenced block, a bare ```
/// fenced block, then the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };

    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}

/// Unwrap a `{"result": ...}` envelope if present.
fn unwrap_envelope(value: Value) -> Option<Value> {
    match value.get("result") {
        Some(Value::String(inner)) => extract_json(inner),
        Some(Value::Object(_)) => value.get("result").cloned(),
        _ => Some(value),
    }
}

/// Decode raw decision records, dropping the ones that do not fit.
///
/// Returns the decoded decisions and the number dropped.
pub fn decode_decisions(raw: &[Value]) -> (Vec<Decision>, usize) {
    let mut decisions = Vec::with_capacity(raw.len());
    let mut dropped = 0;

    for (index, record) in raw.iter().enumerate() {
        match serde_json::from_value::<Decision>(record.clone()) {
            Ok(decision) => decisions.push(decision),
            Err(e) => {
                dropped += 1;
                tracing::warn!(index, error = %e, "Failed to parse decision, dropping it");
            }
        }
    }

    (decisions, dropped)
}

/// Parse a complete backend response.
///
/// Text that contains no JSON object yields an empty result; the caller
/// decides whether that is an error.
pub fn parse_response(text: &str) -> ParsedResponse {
    let Some(payload) = extract_json(text).and_then(unwrap_envelope) else {
        let preview: String = text.chars().take(200).collect();
        tracing::error!(preview = %preview, "Failed to parse JSON response");
        return ParsedResponse::default();
    };

    let raw = payload
        .get("decisions")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let (decisions, dropped) = decode_decisions(&raw);

    let participants_detected = payload
        .get("participants_detected")
        .and_then(|v| v.as_array())
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str())
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();

    ParsedResponse {
        decisions,
        participants_detected,
        dropped,
    }
}

/// Parse a participant-detection response: `{"participants": [{"name": ..}]}`.
///
/// Accepts bare strings as well as objects. Unparseable text yields no names.
pub fn parse_participants(text: &str) -> Vec<String> {
    let Some(payload) = extract_json(text).and_then(unwrap_envelope) else {
        tracing::warn!("Failed to parse participant detection response");
        return Vec::new();
    };

    let names: Vec<String> = payload
        .get("participants")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.as_str()),
                    other => other.get("name").and_then(|n| n.as_str()),
                })
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if let Some(reasoning) = payload.get("reasoning").and_then(|v| v.as_str()) {
        tracing::debug!(reasoning, "Participant detection reasoning");
    }

    names
}
