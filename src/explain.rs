use crate::db::store::Row;
use crate::error::Result;
use crate::llm::CompletionClient;
use crate::params::ParamBundle;
use std::sync::Arc;

pub const SYSTEM_EXPLAIN: &str = "You are a concise executive analyst. Output plain text only.";
pub const EXPLAIN_MAX_TOKENS: u32 = 300;

/// Everything the narrative is allowed to talk about.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationRequest<'a> {
    pub question: &'a str,
    pub template: &'a str,
    pub params: &'a ParamBundle,
    pub rows: &'a [Row],
}

pub struct Explainer {
    llm: Arc<dyn CompletionClient>,
}

impl Explainer {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    pub async fn explain(&self, request: &ExplanationRequest<'_>) -> Result<String> {
        let prompt = build_explain_prompt(request)?;
        let narrative = self
            .llm
            .complete(SYSTEM_EXPLAIN, &prompt, EXPLAIN_MAX_TOKENS)
            .await?;
        Ok(narrative.trim().to_string())
    }
}

pub fn build_explain_prompt(request: &ExplanationRequest<'_>) -> Result<String> {
    Ok(format!(
        "Explain the BI result in <= 4 sentences for executives. Question: {}\nTemplate: {}\nParams: {}\nData (JSON rows): {}",
        request.question,
        request.template,
        serde_json::to_string(request.params)?,
        serde_json::to_string(request.rows)?,
    ))
}
