//! Answer synthesis: prompt the language model with retrieved context and
//! parse its reply into [`ExtractedEntity`] records.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::document::{ExtractedEntity, ScoredNode};
use crate::error::{RagError, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompt::build_prompt;
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Sampling parameters forwarded to the language model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self { temperature: crate::config::DEFAULT_TEMPERATURE, top_p: crate::config::DEFAULT_TOP_P }
    }
}

/// The outcome of a synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    /// The model returned a well-formed entity list.
    Entities(Vec<ExtractedEntity>),
    /// The model's reply could not be parsed; `raw` is what it said.
    Malformed { raw: String },
}

impl Synthesis {
    /// The parsed entities; empty when the output was malformed.
    pub fn entities(&self) -> &[ExtractedEntity] {
        match self {
            Synthesis::Entities(entities) => entities,
            Synthesis::Malformed { .. } => &[],
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Synthesis::Malformed { .. })
    }

    /// Convert a malformed reply into [`RagError::MalformedModelOutput`].
    pub fn into_result(self) -> Result<Vec<ExtractedEntity>> {
        match self {
            Synthesis::Entities(entities) => Ok(entities),
            Synthesis::Malformed { raw } => Err(RagError::MalformedModelOutput { raw }),
        }
    }
}

/// Prompts a [`LanguageModel`] with retrieved context and parses the reply.
pub struct Synthesizer {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model, retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ask the model to answer `query` from `retrieved` and parse the reply.
    ///
    /// Transient model failures are retried per the retry policy. A reply
    /// that is not an entity list is returned as [`Synthesis::Malformed`],
    /// never retried.
    ///
    /// # Errors
    ///
    /// Returns the model's error once retries are exhausted (or immediately
    /// for permanent failures), or [`RagError::Cancelled`].
    pub async fn synthesize(
        &self,
        query: &str,
        retrieved: &[ScoredNode],
        params: SamplingParams,
        cancel: &CancellationToken,
    ) -> Result<Synthesis> {
        let request = CompletionRequest {
            prompt: build_prompt(query, retrieved),
            temperature: params.temperature,
            top_p: params.top_p,
        };
        debug!(
            model = self.model.name(),
            context_chunks = retrieved.len(),
            prompt_len = request.prompt.len(),
            "requesting synthesis"
        );

        let raw = retry_with_backoff(&self.retry, cancel, "synthesis", || {
            self.model.complete(&request)
        })
        .await?;

        let synthesis = parse_entities(&raw);
        match &synthesis {
            Synthesis::Entities(entities) => {
                info!(model = self.model.name(), entity_count = entities.len(), "synthesis completed");
            }
            Synthesis::Malformed { raw } => {
                warn!(model = self.model.name(), raw_len = raw.len(), "model output is not an entity list");
            }
        }
        Ok(synthesis)
    }
}

/// Parse a model reply into entities.
///
/// Accepts a JSON array of objects, optionally inside a Markdown code fence
/// or surrounded by prose, or an object with an array-valued field that holds
/// the entities. Keys match case-insensitively; missing or `null` fields
/// become empty strings and other scalars are stringified.
pub fn parse_entities(raw: &str) -> Synthesis {
    match candidate_values(raw).into_iter().find_map(entity_array) {
        Some(entities) => Synthesis::Entities(entities),
        None => Synthesis::Malformed { raw: raw.to_string() },
    }
}

fn candidate_values(raw: &str) -> Vec<Value> {
    let mut texts = vec![raw.trim()];
    if let Some(fenced) = fenced_block(raw) {
        texts.push(fenced);
    }
    if let (Some(open), Some(close)) = (raw.find('['), raw.rfind(']')) {
        if open < close {
            texts.push(&raw[open..=close]);
        }
    }
    texts.into_iter().filter_map(|text| serde_json::from_str(text).ok()).collect()
}

fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    // skip an optional language tag on the opening fence line
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn entity_array(value: Value) -> Option<Vec<ExtractedEntity>> {
    match value {
        Value::Array(items) => entities_from(items),
        // serde_json maps iterate in key order, so try every array-valued field
        Value::Object(map) => map.into_iter().find_map(|(_, v)| match v {
            Value::Array(items) => entities_from(items),
            _ => None,
        }),
        _ => None,
    }
}

fn entities_from(items: Vec<Value>) -> Option<Vec<ExtractedEntity>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(fields) => Some(entity_from_fields(&fields)),
            _ => None,
        })
        .collect()
}

fn entity_from_fields(fields: &Map<String, Value>) -> ExtractedEntity {
    ExtractedEntity {
        name: field(fields, "name"),
        description: field(fields, "description"),
        personality: field(fields, "personality"),
    }
}

fn field(fields: &Map<String, Value>, key: &str) -> String {
    let value = fields
        .get(key)
        .or_else(|| fields.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v));
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array_in_order() {
        let raw = r#"[
            {"name": "Ahab", "description": "Captain of the Pequod", "personality": "Obsessive"},
            {"name": "Ishmael", "description": "Narrator", "personality": "Reflective"},
            {"name": "Queequeg", "description": "Harpooneer", "personality": "Loyal"}
        ]"#;
        let Synthesis::Entities(entities) = parse_entities(raw) else {
            panic!("expected entities");
        };
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Ahab", "Ishmael", "Queequeg"]);
        assert_eq!(entities[0].personality, "Obsessive");
    }

    #[test]
    fn prose_is_malformed() {
        let raw = "The main characters are Ahab and Ishmael.";
        let synthesis = parse_entities(raw);
        assert_eq!(synthesis, Synthesis::Malformed { raw: raw.to_string() });
        assert!(synthesis.entities().is_empty());
    }

    #[test]
    fn accepts_code_fence() {
        let raw = "```json\n[{\"name\": \"Starbuck\"}]\n```";
        assert_eq!(
            parse_entities(raw).entities(),
            &[ExtractedEntity::new("Starbuck", "", "")]
        );
    }

    #[test]
    fn accepts_array_inside_prose() {
        let raw = "Here you go: [{\"name\": \"Stubb\", \"personality\": \"Jovial\"}] Enjoy!";
        assert_eq!(parse_entities(raw).entities(), &[ExtractedEntity::new("Stubb", "", "Jovial")]);
    }

    #[test]
    fn accepts_wrapping_object() {
        let raw = r#"{"characters": [{"Name": "Pip", "Description": "Cabin boy", "Personality": null}]}"#;
        assert_eq!(parse_entities(raw).entities(), &[ExtractedEntity::new("Pip", "Cabin boy", "")]);
    }

    #[test]
    fn wrapping_object_skips_arrays_that_are_not_entities() {
        let raw = r#"{"people": [{"name": "Ahab", "description": "Captain", "personality": "Driven"}], "notes": ["only one"]}"#;
        assert_eq!(
            parse_entities(raw).entities(),
            &[ExtractedEntity::new("Ahab", "Captain", "Driven")]
        );
    }

    #[test]
    fn stringifies_non_string_scalars() {
        let raw = r#"[{"name": 42, "description": true}]"#;
        assert_eq!(parse_entities(raw).entities(), &[ExtractedEntity::new("42", "true", "")]);
    }

    #[test]
    fn empty_array_is_zero_entities() {
        assert_eq!(parse_entities("[]"), Synthesis::Entities(Vec::new()));
    }

    #[test]
    fn non_object_elements_are_malformed() {
        assert!(parse_entities(r#"["Ahab", "Ishmael"]"#).is_malformed());
    }

    #[test]
    fn malformed_converts_to_error() {
        let err = parse_entities("no idea").into_result().unwrap_err();
        assert!(matches!(err, RagError::MalformedModelOutput { raw } if raw == "no idea"));
    }
}
