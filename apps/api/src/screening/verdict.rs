//! Verdict parsing — an explicit parse-and-validate step over the raw LLM
//! response text.
//!
//! Every field's coercion rule is total: malformed or missing values map to
//! a defined output, never a panic. Only a top-level response that is not
//! valid JSON after fence unwrapping is a hard failure.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::llm_client::strip_json_fences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Advance,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreeningVerdict {
    pub application_id: i64,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    pub summary: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub rationale: String,
}

/// Parsed verdicts plus the submitted ids the model omitted. Partial
/// results are valid — missing ids are a warning, not a failure.
#[derive(Debug, Serialize)]
pub struct ScreeningOutcome {
    pub verdicts: Vec<ScreeningVerdict>,
    pub missing: Vec<i64>,
}

/// Top-level response was not valid JSON. Carries the raw text for
/// diagnostics.
#[derive(Debug, Error)]
#[error("screening response parse failed: {reason}")]
pub struct VerdictParseError {
    pub reason: String,
    pub raw: String,
}

/// Parses the raw response text into verdicts. Accepts a single object or
/// an array; entries without a usable application id are dropped (logged).
pub fn parse_verdicts(raw: &str, submitted: &[i64]) -> Result<ScreeningOutcome, VerdictParseError> {
    let unwrapped = strip_json_fences(raw);
    let value: Value = serde_json::from_str(unwrapped).map_err(|e| VerdictParseError {
        reason: e.to_string(),
        raw: raw.to_string(),
    })?;

    let entries: Vec<Value> = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(VerdictParseError {
                reason: format!("expected object or array, got {}", type_name(&other)),
                raw: raw.to_string(),
            })
        }
    };

    let mut verdicts = Vec::with_capacity(entries.len());
    for entry in &entries {
        match coerce_verdict(entry) {
            Some(verdict) => verdicts.push(verdict),
            None => warn!("Dropping verdict entry without application_id: {entry}"),
        }
    }

    let missing: Vec<i64> = submitted
        .iter()
        .copied()
        .filter(|id| !verdicts.iter().any(|v| v.application_id == *id))
        .collect();
    if !missing.is_empty() {
        warn!("Screening response omitted {} candidate(s): {missing:?}", missing.len());
    }

    Ok(ScreeningOutcome { verdicts, missing })
}

/// Total coercion of one verdict object. Returns None only when the entry
/// carries no usable application id.
fn coerce_verdict(entry: &Value) -> Option<ScreeningVerdict> {
    let application_id = coerce_id(entry.get("application_id")?)?;

    let raw_recommendation = string_field(entry, "recommendation");
    let recommendation = match raw_recommendation.trim().to_lowercase().as_str() {
        "advance" => Recommendation::Advance,
        "reject" => Recommendation::Reject,
        other => {
            // Unrecognized values coerce to the safe side rather than
            // passing through uninterpreted.
            warn!("Unrecognized recommendation {other:?} for application {application_id}; treating as reject");
            return Some(ScreeningVerdict {
                application_id,
                recommendation: Recommendation::Reject,
                confidence: Confidence::Low,
                summary: string_field(entry, "summary"),
                strengths: string_array_field(entry, "strengths"),
                concerns: string_array_field(entry, "concerns"),
                rationale: string_field(entry, "rationale"),
            });
        }
    };

    let confidence = match string_field(entry, "confidence").trim().to_lowercase().as_str() {
        "high" => Confidence::High,
        "medium" => Confidence::Medium,
        _ => Confidence::Low,
    };

    Some(ScreeningVerdict {
        application_id,
        recommendation,
        confidence,
        summary: string_field(entry, "summary"),
        strengths: string_array_field(entry, "strengths"),
        concerns: string_array_field(entry, "concerns"),
        rationale: string_field(entry, "rationale"),
    })
}

pub(crate) fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(entry: &Value, key: &str) -> String {
    entry
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn string_array_field(entry: &Value, key: &str) -> Vec<String> {
    entry
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_array() {
        let raw = r#"[
            {"application_id": 1, "recommendation": "advance", "confidence": "high",
             "summary": "Strong", "strengths": ["Rust"], "concerns": [], "rationale": "Fits"},
            {"application_id": 2, "recommendation": "REJECT", "confidence": "Medium",
             "summary": "Weak", "strengths": [], "concerns": ["No backend work"], "rationale": ""}
        ]"#;
        let outcome = parse_verdicts(raw, &[1, 2]).unwrap();
        assert_eq!(outcome.verdicts.len(), 2);
        assert!(outcome.missing.is_empty());
        assert_eq!(outcome.verdicts[0].recommendation, Recommendation::Advance);
        // Case-folded values parse
        assert_eq!(outcome.verdicts[1].recommendation, Recommendation::Reject);
        assert_eq!(outcome.verdicts[1].confidence, Confidence::Medium);
    }

    #[test]
    fn test_missing_verdicts_reported_not_raised() {
        // 10 submitted, model answers for 8
        let entries: Vec<String> = (1..=8)
            .map(|id| format!(r#"{{"application_id": {id}, "recommendation": "advance"}}"#))
            .collect();
        let raw = format!("[{}]", entries.join(","));
        let submitted: Vec<i64> = (1..=10).collect();

        let outcome = parse_verdicts(&raw, &submitted).unwrap();
        assert_eq!(outcome.verdicts.len(), 8);
        assert_eq!(outcome.missing, vec![9, 10]);
    }

    #[test]
    fn test_single_object_accepted() {
        let raw = r#"{"application_id": 5, "recommendation": "advance", "confidence": "low"}"#;
        let outcome = parse_verdicts(raw, &[5]).unwrap();
        assert_eq!(outcome.verdicts.len(), 1);
        assert!(outcome.missing.is_empty());
    }

    #[test]
    fn test_fenced_response_unwrapped() {
        let raw = "```json\n[{\"application_id\": 3, \"recommendation\": \"reject\"}]\n```";
        let outcome = parse_verdicts(raw, &[3]).unwrap();
        assert_eq!(outcome.verdicts[0].recommendation, Recommendation::Reject);
    }

    #[test]
    fn test_unrecognized_recommendation_coerces_to_reject_low() {
        let raw = r#"[{"application_id": 7, "recommendation": "maybe", "confidence": "high"}]"#;
        let outcome = parse_verdicts(raw, &[7]).unwrap();
        assert_eq!(outcome.verdicts[0].recommendation, Recommendation::Reject);
        assert_eq!(outcome.verdicts[0].confidence, Confidence::Low);
    }

    #[test]
    fn test_missing_fields_become_empty_defaults() {
        let raw = r#"[{"application_id": "11", "recommendation": "advance"}]"#;
        let outcome = parse_verdicts(raw, &[11]).unwrap();
        let v = &outcome.verdicts[0];
        assert_eq!(v.application_id, 11); // string id coerced
        assert_eq!(v.confidence, Confidence::Low);
        assert_eq!(v.summary, "");
        assert!(v.strengths.is_empty());
        assert!(v.concerns.is_empty());
    }

    #[test]
    fn test_entry_without_id_is_dropped() {
        let raw = r#"[
            {"recommendation": "advance"},
            {"application_id": 2, "recommendation": "advance"}
        ]"#;
        let outcome = parse_verdicts(raw, &[2]).unwrap();
        assert_eq!(outcome.verdicts.len(), 1);
        assert_eq!(outcome.verdicts[0].application_id, 2);
    }

    #[test]
    fn test_malformed_json_is_hard_failure() {
        let err = parse_verdicts("not json at all", &[1]).unwrap_err();
        assert!(err.raw.contains("not json"));

        let err = parse_verdicts("\"just a string\"", &[1]).unwrap_err();
        assert!(err.reason.contains("string"));
    }
}
