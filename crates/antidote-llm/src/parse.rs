//! Pull structured answers out of free-form model output.
//!
//! Models wrap JSON in prose or code fences often enough that the parser
//! looks for the outermost `{...}` span instead of expecting a clean body.

use std::collections::BTreeMap;

use antidote_core::{CollaboratorError, Confirmations, FileId, Proposal};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawProposal {
    description: String,
    #[serde(alias = "expression", alias = "filter")]
    predicate: String,
}

/// Outermost JSON object in `text`, if any.
pub fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn proposal(text: &str) -> Result<Proposal, CollaboratorError> {
    let raw = json_object(text).ok_or_else(|| malformed("no JSON object in proposal", text))?;
    let parsed: RawProposal =
        serde_json::from_str(raw).map_err(|e| malformed(&format!("bad proposal: {e}"), text))?;
    let predicate = strip_backticks(parsed.predicate.trim());
    if predicate.is_empty() {
        return Err(malformed("empty predicate", text));
    }
    Ok(Proposal::new(parsed.description.trim(), predicate))
}

/// Verdicts keyed by file name. Accepts a flat `{name: bool}` map or the
/// same map nested under `"verdicts"`. Names outside `asked` are dropped.
pub fn verdicts(text: &str, asked: &[String]) -> Result<Confirmations, CollaboratorError> {
    let raw = json_object(text).ok_or_else(|| malformed("no JSON object in verdicts", text))?;
    let mut value: Value =
        serde_json::from_str(raw).map_err(|e| malformed(&format!("bad verdicts: {e}"), text))?;
    if let Some(inner) = value.get_mut("verdicts") {
        value = inner.take();
    }
    let map: BTreeMap<String, Value> = serde_json::from_value(value)
        .map_err(|e| malformed(&format!("verdicts must be an object: {e}"), text))?;

    let confirmations: Confirmations = map
        .into_iter()
        .filter(|(name, _)| asked.iter().any(|a| a == name))
        .filter_map(|(name, v)| verdict(&v).map(|b| (FileId::new(name), b)))
        .collect();
    if confirmations.is_empty() && !asked.is_empty() {
        return Err(malformed("no verdict for any requested file", text));
    }
    Ok(confirmations)
}

fn verdict(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "bad" | "poisoned" => Some(true),
            "false" | "no" | "clean" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn strip_backticks(s: &str) -> &str {
    s.strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(s)
}

fn malformed(what: &str, text: &str) -> CollaboratorError {
    let mut snippet: String = text.chars().take(200).collect();
    if text.chars().count() > 200 {
        snippet.push_str("...");
    }
    CollaboratorError::MalformedResponse(format!("{what}: {snippet}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_inside_prose_and_fences() {
        let text = "Sure!\n```json\n{\"description\": \"empty files\", \"predicate\": \"`len(content) == 0`\"}\n```";
        let p = proposal(text).unwrap();
        assert_eq!(p.description, "empty files");
        assert_eq!(p.predicate_source, "len(content) == 0");
    }

    #[test]
    fn proposal_accepts_expression_alias() {
        let p = proposal(r#"{"description": "d", "expression": "'x' in name"}"#).unwrap();
        assert_eq!(p.predicate_source, "'x' in name");
    }

    #[test]
    fn proposal_without_json_is_malformed() {
        assert!(matches!(
            proposal("files with even numbers"),
            Err(CollaboratorError::MalformedResponse(_))
        ));
        assert!(matches!(
            proposal(r#"{"description": "d", "predicate": "  "}"#),
            Err(CollaboratorError::MalformedResponse(_))
        ));
    }

    #[test]
    fn verdicts_flat_and_nested() {
        let asked = vec!["1.txt".to_string(), "2.txt".to_string()];
        let flat = verdicts(r#"{"1.txt": true, "2.txt": "clean", "9.txt": true}"#, &asked).unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[&FileId::new("1.txt")], true);
        assert_eq!(flat[&FileId::new("2.txt")], false);

        let nested = verdicts(r#"Here: {"verdicts": {"2.txt": true}}"#, &asked).unwrap();
        assert_eq!(nested.len(), 1);
    }

    #[test]
    fn verdicts_for_nothing_asked_are_malformed() {
        let asked = vec!["1.txt".to_string()];
        assert!(verdicts(r#"{"other.txt": true}"#, &asked).is_err());
        assert!(verdicts("[true, false]", &asked).is_err());
    }
}
