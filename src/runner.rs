//! BI runner: question -> template -> rows -> narrative
//!
//! Each call to [`BiRunner::resolve`] makes two completion calls (selection,
//! explanation) and one store query, strictly in sequence. The runner holds
//! only shared read-only state, so overlapping calls do not interact.
//!
//! Explanation failures do not fail the pipeline: the narrative is left
//! empty and a warning is logged. Selection failures do, since no template
//! can be trusted without it.

use crate::config::BiConfig;
use crate::db::store::{AnalyticStore, Row, SqliteStore};
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::explain::{Explainer, ExplanationRequest};
use crate::llm::{AnthropicClient, CompletionClient};
use crate::params::{extract_params, validate_params, ParamBundle, RawParams};
use crate::selector::{Selection, TemplateSelector};
use crate::templates::TemplateRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub question: String,
    pub template: String,
    pub params: ParamBundle,
    pub latency_seconds: f64,
    pub rows: Vec<Row>,
    pub explanation: String,
    /// True when the selector could not use the model's reply.
    pub selection_fallback: bool,
}

pub struct BiRunner {
    registry: Arc<TemplateRegistry>,
    selector: TemplateSelector,
    executor: QueryExecutor,
    explainer: Explainer,
}

impl BiRunner {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        store: Arc<dyn AnalyticStore>,
        registry: Arc<TemplateRegistry>,
    ) -> Self {
        Self {
            selector: TemplateSelector::new(llm.clone(), registry.clone()),
            executor: QueryExecutor::new(store, registry.clone()),
            explainer: Explainer::new(llm),
            registry,
        }
    }

    /// Anthropic client, SQLite store and the shipped templates.
    pub fn from_config(config: &BiConfig) -> Result<Self> {
        let llm = Arc::new(AnthropicClient::from_config(config)?);
        let store = Arc::new(
            SqliteStore::from_url(&config.database_url)?.with_busy_timeout(config.busy_timeout),
        );
        let registry = Arc::new(TemplateRegistry::reference()?);
        Ok(Self::new(llm, store, registry))
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn selector(&self) -> &TemplateSelector {
        &self.selector
    }

    pub async fn resolve(&self, question: &str) -> Result<QueryResult> {
        let request_id = Uuid::new_v4();
        let span = info_span!("resolve", %request_id);
        self.resolve_inner(question).instrument(span).await
    }

    async fn resolve_inner(&self, question: &str) -> Result<QueryResult> {
        let started = Instant::now();
        info!("Question: {}", question);

        let selection: Selection = self.selector.select(question).await?;

        let params = validate_params(&RawParams::from(extract_params(question)));
        info!("Params: days={:?} segment_id={:?}", params.days, params.segment_id);

        let executed = self.executor.execute(selection.name(), &params).await?;

        let request = ExplanationRequest {
            question,
            template: &executed.template,
            params: &params,
            rows: &executed.rows,
        };
        let explanation = match self.explainer.explain(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Explanation unavailable: {}", e);
                String::new()
            }
        };

        let latency_seconds = round_millis(started.elapsed().as_secs_f64());
        info!("Resolved in {:.3}s", latency_seconds);

        Ok(QueryResult {
            question: question.to_string(),
            template: executed.template,
            params,
            latency_seconds,
            rows: executed.rows,
            explanation,
            selection_fallback: selection.is_fallback(),
        })
    }
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
