//! The JSON step protocol spoken by the model.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Plan,
    Think,
    Validate,
    Observe,
    Action,
    Output,
    Result,
    /// A step name outside the protocol, kept verbatim
    Other(String),
}

impl StepKind {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "plan" => StepKind::Plan,
            "think" | "analyse" | "analyze" => StepKind::Think,
            "validate" => StepKind::Validate,
            "observe" => StepKind::Observe,
            "action" => StepKind::Action,
            "output" => StepKind::Output,
            "result" => StepKind::Result,
            _ => StepKind::Other(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StepKind::Plan => "plan",
            StepKind::Think => "think",
            StepKind::Validate => "validate",
            StepKind::Observe => "observe",
            StepKind::Action => "action",
            StepKind::Output => "output",
            StepKind::Result => "result",
            StepKind::Other(name) => name,
        }
    }

    /// Whether this step answers the user and ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepKind::Output | StepKind::Result)
    }
}

/// One parsed model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: StepKind,
    pub content: String,
    /// Tool name, present on action steps
    pub function: Option<String>,
    pub input: Option<Value>,
    /// The reply re-serialized, as stored in the conversation
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("Reply is not a JSON object: {0}")]
    Malformed(String),

    #[error("Reply is missing required field '{0}'")]
    MissingField(&'static str),
}

/// Drop a surrounding markdown code fence, with or without a language tag.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.rfind("```").map_or(body, |end| &body[..end]).trim()
}

fn text_field(map: &Map<String, Value>, key: &'static str) -> Result<String, StepError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(StepError::MissingField(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

/// Parse a model reply into a step.
///
/// # Errors
///
/// `StepError::Malformed` when the reply is not a JSON object, and
/// `StepError::MissingField` when `step`, `content`, or an action's
/// `function` is absent.
pub fn parse_step(reply: &str) -> Result<StepRecord, StepError> {
    let body = strip_code_fences(reply);
    let map = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => return Err(StepError::Malformed(format!("expected an object, got {}", other))),
        Err(e) => return Err(StepError::Malformed(e.to_string())),
    };

    let step = match map.get("step") {
        Some(Value::String(name)) if !name.trim().is_empty() => StepKind::parse(name),
        _ => return Err(StepError::MissingField("step")),
    };
    let content = text_field(&map, "content")?;
    let function = match step {
        StepKind::Action => Some(text_field(&map, "function")?),
        _ => map.get("function").and_then(Value::as_str).map(str::to_string),
    };
    let input = map.get("input").cloned();
    let raw = Value::Object(map).to_string();

    Ok(StepRecord {
        step,
        content,
        function,
        input,
        raw,
    })
}

#[derive(Serialize)]
struct Observation<'a> {
    step: &'static str,
    output: &'a Value,
}

/// The text appended to the conversation after a tool runs.
pub fn observation_envelope(output: &Value) -> String {
    let observation = Observation {
        step: "observe",
        output,
    };
    serde_json::to_string(&observation)
        .unwrap_or_else(|_| format!(r#"{{"step":"observe","output":{}}}"#, output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_action_step() {
        let record = parse_step(
            r#"{"step": "action", "content": "Reading", "function": "read_file", "input": "a.txt"}"#,
        )
        .unwrap();
        assert_eq!(record.step, StepKind::Action);
        assert_eq!(record.function.as_deref(), Some("read_file"));
        assert_eq!(record.input, Some(json!("a.txt")));
    }

    #[test]
    fn step_names_are_case_insensitive_and_analyse_is_think() {
        assert_eq!(parse_step(r#"{"step":"PLAN","content":"x"}"#).unwrap().step, StepKind::Plan);
        assert_eq!(parse_step(r#"{"step":"analyse","content":"x"}"#).unwrap().step, StepKind::Think);
        assert_eq!(
            parse_step(r#"{"step":"dance","content":"x"}"#).unwrap().step,
            StepKind::Other("dance".into())
        );
    }

    #[test]
    fn malformed_and_missing_fields_are_distinct() {
        assert!(matches!(parse_step("I think we should"), Err(StepError::Malformed(_))));
        assert!(matches!(parse_step("[1, 2]"), Err(StepError::Malformed(_))));
        assert_eq!(
            parse_step(r#"{"content":"x"}"#),
            Err(StepError::MissingField("step"))
        );
        assert_eq!(
            parse_step(r#"{"step":"plan"}"#),
            Err(StepError::MissingField("content"))
        );
        assert_eq!(
            parse_step(r#"{"step":"action","content":"go"}"#),
            Err(StepError::MissingField("function"))
        );
    }

    #[test]
    fn fenced_replies_are_accepted() {
        let record = parse_step("```json\n{\"step\":\"output\",\"content\":\"done\"}\n```").unwrap();
        assert_eq!(record.step, StepKind::Output);
        assert_eq!(record.raw, r#"{"step":"output","content":"done"}"#);
    }

    #[test]
    fn envelope_puts_step_first() {
        assert_eq!(
            observation_envelope(&json!({"z": 1, "a": 2})),
            r#"{"step":"observe","output":{"z":1,"a":2}}"#
        );
        assert_eq!(
            observation_envelope(&json!("[ERROR] Unknown tool: x")),
            r#"{"step":"observe","output":"[ERROR] Unknown tool: x"}"#
        );
    }
}
