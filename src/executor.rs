//! Template execution
//!
//! Runs only registered statements and binds only the parameters a template
//! declares. The question text never reaches SQL.
//!
//! Store calls are synchronous (SQLite waits out its busy timeout), so they
//! run on tokio's blocking pool rather than on the caller's worker thread.

use crate::db::store::{AnalyticStore, Row};
use crate::error::{BiError, Result};
use crate::params::ParamBundle;
use crate::templates::TemplateRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedQuery {
    pub template: String,
    /// The parameters actually bound, by name.
    pub bound: Vec<(String, Option<i64>)>,
    pub rows: Vec<Row>,
}

pub struct QueryExecutor {
    store: Arc<dyn AnalyticStore>,
    registry: Arc<TemplateRegistry>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn AnalyticStore>, registry: Arc<TemplateRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn execute(&self, template_name: &str, params: &ParamBundle) -> Result<ExecutedQuery> {
        let template = self.registry.get(template_name).ok_or_else(|| {
            BiError::Configuration(format!("Unknown template: {}", template_name))
        })?;

        let bound: Vec<(String, Option<i64>)> = template
            .accepted_params
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| {
                        BiError::Configuration(format!(
                            "Template '{}' declares unsupported parameter '{}'",
                            template.name, name
                        ))
                    })
            })
            .collect::<Result<_>>()?;

        debug!("Executing {} with {:?}", template.name, bound);
        let store = self.store.clone();
        let sql = template.sql.clone();
        let args = bound.clone();
        let rows = tokio::task::spawn_blocking(move || store.query(&sql, &args))
            .await
            .map_err(|e| BiError::DataAccess(format!("Query task failed: {}", e)))??;
        info!("Template {} returned {} rows", template.name, rows.len());

        Ok(ExecutedQuery {
            template: template.name.clone(),
            bound,
            rows,
        })
    }
}
