//! Template selection
//!
//! The model only narrows a discrete choice between registered templates.
//! Its reply is untrusted: anything that is not a JSON object naming a
//! registered template resolves to the registry default.

use crate::error::Result;
use crate::llm::{parse_json_object, CompletionClient};
use crate::templates::TemplateRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

pub const SYSTEM_PICK: &str = "You are a strict JSON classifier. Output ONLY valid JSON.";
pub const PICK_MAX_TOKENS: u32 = 200;

/// Outcome of a selection: confidently parsed or defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Parsed { name: String },
    Fallback { name: String, reason: String },
}

impl Selection {
    pub fn name(&self) -> &str {
        match self {
            Selection::Parsed { name } | Selection::Fallback { name, .. } => name,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Selection::Fallback { .. })
    }
}

pub struct TemplateSelector {
    llm: Arc<dyn CompletionClient>,
    registry: Arc<TemplateRegistry>,
}

impl TemplateSelector {
    pub fn new(llm: Arc<dyn CompletionClient>, registry: Arc<TemplateRegistry>) -> Self {
        Self { llm, registry }
    }

    /// Ask the model for a template. Completion transport errors propagate;
    /// reply parsing never fails.
    pub async fn select(&self, question: &str) -> Result<Selection> {
        let prompt = build_pick_prompt(question, &self.registry);
        let raw = self
            .llm
            .complete(SYSTEM_PICK, &prompt, PICK_MAX_TOKENS)
            .await?;

        let selection = parse_selection(&raw, &self.registry);
        match &selection {
            Selection::Parsed { name } => info!("Selected template: {}", name),
            Selection::Fallback { name, reason } => {
                warn!("Template selection fell back to {}: {}", name, reason)
            }
        }
        Ok(selection)
    }
}

pub fn build_pick_prompt(question: &str, registry: &TemplateRegistry) -> String {
    let names = serde_json::to_string(&registry.names()).unwrap_or_else(|_| "[]".to_string());
    let catalogue: Vec<String> = registry
        .descriptions()
        .into_iter()
        .map(|(name, description)| format!("- {}: {}", name, description))
        .collect();

    format!(
        r#"Return ONLY valid JSON with key: {{"template": one_of_names}}

where one_of_names ∈ {names}

Templates:
{catalogue}

Question: {question}

Guidance:
- avg p1 by segment -> "avg_p1_by_segment"
- avg p1 by member rating -> "avg_p1_by_member_rating"
- counts per rating / how many per rating -> "count_by_member_rating"
- top / max purchase_frequency -> "top_purchase_frequency_by_segment"

Return: {{"template": "<name>"}}"#,
        names = names,
        catalogue = catalogue.join("\n"),
        question = question,
    )
}

/// Interpret a raw model reply against the registry. Never fails.
pub fn parse_selection(raw: &str, registry: &TemplateRegistry) -> Selection {
    let fallback = |reason: String| Selection::Fallback {
        name: registry.default_name().to_string(),
        reason,
    };

    let Some(payload) = parse_json_object(raw) else {
        return fallback("reply is not a JSON object".to_string());
    };

    match payload.get("template") {
        Some(serde_json::Value::String(name)) => {
            let name = name.trim();
            if registry.contains(name) {
                Selection::Parsed {
                    name: name.to_string(),
                }
            } else {
                fallback(format!("unknown template '{}'", name))
            }
        }
        Some(_) => fallback("'template' is not a string".to_string()),
        None => fallback("missing 'template' key".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::DEFAULT_TEMPLATE;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::reference().unwrap()
    }

    #[test]
    fn test_parses_registered_name() {
        let selection = parse_selection(r#"{"template": "count_by_member_rating"}"#, &registry());
        assert_eq!(
            selection,
            Selection::Parsed {
                name: "count_by_member_rating".to_string()
            }
        );
    }

    #[test]
    fn test_parses_fenced_reply() {
        let raw = "```json\n{\"template\": \"avg_p1_by_member_rating\"}\n```";
        let selection = parse_selection(raw, &registry());
        assert!(!selection.is_fallback());
        assert_eq!(selection.name(), "avg_p1_by_member_rating");
    }

    #[test]
    fn test_malformed_replies_fall_back_to_default() {
        let registry = registry();
        let replies = [
            "",
            "   ",
            "not json",
            "{\"template\": ",
            "[\"avg_p1_by_segment\"]",
            "{\"tmpl\": \"count_by_member_rating\"}",
            "{\"template\": 3}",
            "{\"template\": null}",
            "{\"template\": \"SELECT * FROM customer_features\"}",
            "{\"template\": \"drop_tables\"}",
        ];
        for raw in replies {
            let selection = parse_selection(raw, &registry);
            assert!(selection.is_fallback(), "expected fallback for {:?}", raw);
            assert_eq!(selection.name(), DEFAULT_TEMPLATE);
            assert!(registry.contains(selection.name()));
        }
    }

    #[test]
    fn test_prompt_lists_every_template() {
        let registry = registry();
        let prompt = build_pick_prompt("How many users per member rating?", &registry);
        for name in registry.names() {
            assert!(prompt.contains(name));
        }
        assert!(prompt.contains("How many users per member rating?"));
    }
}
