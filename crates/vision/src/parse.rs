//! Noise-tolerant parsing of the model's structured reply.

use serde_json::Value;
use tracing::warn;
use vigil_core_types::{BoundingBox, ChangeRegion, Intent, Severity};

/// Parsed reply; `raw_response` is populated only when structured
/// parsing failed and the caller degraded to pixel-only evidence.
#[derive(Debug, Clone)]
pub struct ParsedReply {
    pub changes: Vec<ChangeRegion>,
    pub overall_confidence: f64,
    pub summary: String,
    pub raw_response: Option<String>,
}

/// Parse the reply text. Never errors: a reply that cannot be parsed
/// yields an empty change list, zero confidence and the raw text.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let candidate = match extract_json_object(raw) {
        Some(text) => text,
        None => return degraded(raw),
    };

    let value: Value = match serde_json::from_str(&candidate) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "vision reply is not valid JSON, degrading");
            return degraded(raw);
        }
    };

    let changes = value
        .get("changes")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(parse_change).collect())
        .unwrap_or_default();

    ParsedReply {
        changes,
        overall_confidence: value
            .get("overall_confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        summary: value
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        raw_response: None,
    }
}

fn degraded(raw: &str) -> ParsedReply {
    ParsedReply {
        changes: Vec::new(),
        overall_confidence: 0.0,
        summary: "Failed to parse structured response".to_string(),
        raw_response: Some(raw.to_string()),
    }
}

fn parse_change(entry: &Value) -> ChangeRegion {
    ChangeRegion {
        bbox: entry.get("bbox").and_then(parse_bbox),
        description: entry
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        confidence: entry
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0),
        intent: match entry.get("intended") {
            Some(Value::Bool(true)) => Intent::Intended,
            Some(Value::Bool(false)) => Intent::Unintended,
            _ => Intent::Unknown,
        },
        severity: entry
            .get("severity")
            .and_then(Value::as_str)
            .and_then(parse_severity),
    }
}

fn parse_severity(text: &str) -> Option<Severity> {
    match text.to_ascii_lowercase().as_str() {
        "critical" => Some(Severity::Critical),
        "major" => Some(Severity::Major),
        "minor" => Some(Severity::Minor),
        _ => None,
    }
}

fn parse_bbox(value: &Value) -> Option<BoundingBox> {
    let parts = value.as_array()?;
    if parts.len() != 4 {
        return None;
    }
    let mut fields = [0u32; 4];
    for (slot, part) in fields.iter_mut().zip(parts) {
        // Models occasionally emit floats or small negatives
        *slot = part.as_f64()?.max(0.0).round() as u32;
    }
    Some(BoundingBox::new(fields[0], fields[1], fields[2], fields[3]))
}

/// Pull a JSON object out of text that may wrap it in code fences or
/// stray prose.
pub fn extract_json_object(raw: &str) -> Option<String> {
    if raw.trim_start().starts_with('{') {
        return Some(trim_symmetric(raw));
    }

    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = after_lang.find(fence) {
            let block = &after_lang[..end];
            if block.contains('{') {
                return Some(trim_symmetric(block));
            }
        }
    }

    raw.split('{').nth(1).and_then(|rest| {
        let mut depth = 1i32;
        for (idx, ch) in rest.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let mut candidate = String::from("{");
                        candidate.push_str(&rest[..=idx]);
                        return Some(trim_symmetric(&candidate));
                    }
                }
                _ => {}
            }
        }
        None
    })
}

fn trim_symmetric(value: &str) -> String {
    value.trim().trim_matches('`').trim().to_string()
}
