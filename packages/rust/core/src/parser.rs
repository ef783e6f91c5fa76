//! Recover dialogue records from a model's text response.
//!
//! Models usually wrap the JSON payload in a ```` ```json ```` fence and may
//! add prose around it. The first fenced JSON block wins; without one the
//! whole response is treated as the payload.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use dialoguegen_shared::{DialogueGenError, DialogueRecord, Result, Utterance};

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\r?\n(.*?)\r?\n```").expect("valid regex"));

/// Parse and validate `raw` into dialogue records.
///
/// Never returns a defaulted result: anything that is not a well-formed
/// array of records fails with `ResponseFormat` carrying `raw`.
pub fn parse(raw: &str) -> Result<Vec<DialogueRecord>> {
    let payload = extract_payload(raw);

    let value: Value = serde_json::from_str(payload.trim()).map_err(|e| {
        DialogueGenError::response_format(format!("payload is not valid JSON: {e}"), raw)
    })?;

    let Value::Array(items) = value else {
        return Err(DialogueGenError::response_format(
            format!("expected a JSON array, got {}", kind(&value)),
            raw,
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            parse_record(item).map_err(|reason| {
                DialogueGenError::response_format(format!("record {index}: {reason}"), raw)
            })
        })
        .collect()
}

/// Inner payload of the first ```` ```json ```` block, or all of `raw`.
pub fn extract_payload(raw: &str) -> &str {
    JSON_FENCE_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str())
}

fn parse_record(item: &Value) -> std::result::Result<DialogueRecord, String> {
    let Value::Object(obj) = item else {
        return Err(format!("expected an object, got {}", kind(item)));
    };

    let topic = match obj.get("topic") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(format!("`topic` must be a string, got {}", kind(other))),
        None => return Err("missing `topic`".into()),
    };

    let lines = match obj.get("dialogue") {
        Some(Value::Array(lines)) => lines,
        Some(other) => return Err(format!("`dialogue` must be an array, got {}", kind(other))),
        None => return Err("missing `dialogue`".into()),
    };

    let dialogue = lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_utterance(line).map_err(|r| format!("dialogue line {i}: {r}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(DialogueRecord { topic, dialogue })
}

fn parse_utterance(line: &Value) -> std::result::Result<Utterance, String> {
    let Value::Object(map) = line else {
        return Err(format!("expected a speaker→utterance object, got {}", kind(line)));
    };
    if map.len() != 1 {
        return Err(format!("expected exactly one speaker key, found {}", map.len()));
    }
    let Some((speaker, Value::String(text))) = map.iter().next() else {
        return Err("utterance must be a string".into());
    };
    Ok(Utterance::new(speaker.clone(), text.clone()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
