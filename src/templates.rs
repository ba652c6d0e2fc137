//! Approved BI query templates
//!
//! The only SQL this crate ever runs. Every statement:
//! - is a single read-only `SELECT` over `customer_features`
//! - takes its inputs as named bound parameters (`:days`)
//! - keeps `(:days IS NULL OR recency_days <= :days)` so a null window
//!   disables the recency filter instead of matching nothing
//!
//! The registry is built once and handed to the selector and executor; it
//! is never mutated afterwards.

use crate::error::{BiError, Result};
use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;

pub const ANALYTIC_TABLE: &str = "customer_features";
pub const DEFAULT_TEMPLATE: &str = "avg_p1_by_segment";

/// Suggested bar chart for a template's rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub x: String,
    pub y: String,
    pub title: String,
}

impl ChartSpec {
    pub fn bar(x: &str, y: &str, title: &str) -> Self {
        Self {
            x: x.to_string(),
            y: y.to_string(),
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub sql: String,
    /// Parameter names the statement binds. Anything else is never bound.
    pub accepted_params: Vec<String>,
    pub chart: ChartSpec,
}

impl Template {
    pub fn accepts(&self, param: &str) -> bool {
        self.accepted_params.iter().any(|p| p == param)
    }
}

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
    default_name: String,
}

impl TemplateRegistry {
    /// Build a registry, vetting every statement.
    ///
    /// Fails with `BiError::Configuration` on duplicate names, an unregistered
    /// default, or any statement that is not exactly one `SELECT` query.
    pub fn new(templates: Vec<Template>, default_name: &str) -> Result<Self> {
        let mut seen = HashSet::new();
        for template in &templates {
            if !seen.insert(template.name.as_str()) {
                return Err(BiError::Configuration(format!(
                    "Duplicate template name: {}",
                    template.name
                )));
            }
            vet_statement(template)?;
        }

        if !seen.contains(default_name) {
            return Err(BiError::Configuration(format!(
                "Default template '{}' is not registered",
                default_name
            )));
        }

        Ok(Self {
            templates,
            default_name: default_name.to_string(),
        })
    }

    /// The four shipped templates.
    pub fn reference() -> Result<Self> {
        Self::new(reference_templates(), DEFAULT_TEMPLATE)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// `(name, description)` pairs in registration order.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.templates
            .iter()
            .map(|t| (t.name.as_str(), t.description.as_str()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }
}

fn vet_statement(template: &Template) -> Result<()> {
    let statements = Parser::parse_sql(&SQLiteDialect {}, &template.sql).map_err(|e| {
        BiError::Configuration(format!(
            "Template '{}' does not parse: {}",
            template.name, e
        ))
    })?;

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        _ => Err(BiError::Configuration(format!(
            "Template '{}' must be exactly one SELECT statement",
            template.name
        ))),
    }
}

fn template(name: &str, description: &str, sql: &str, chart: ChartSpec) -> Template {
    Template {
        name: name.to_string(),
        description: description.to_string(),
        sql: sql.to_string(),
        accepted_params: vec!["days".to_string()],
        chart,
    }
}

fn reference_templates() -> Vec<Template> {
    vec![
        template(
            "avg_p1_by_segment",
            "Average p1 by segment (optionally filter by recency_days <= days)",
            r#"
            SELECT
                COALESCE(segment, -1) AS segment,
                AVG(p1) AS avg_p1,
                COUNT(*) AS n
            FROM customer_features
            WHERE (:days IS NULL OR recency_days <= :days)
            GROUP BY segment
            ORDER BY avg_p1 DESC
            "#,
            ChartSpec::bar("segment", "avg_p1", "Average p1 by Segment"),
        ),
        template(
            "count_by_member_rating",
            "Row counts grouped by member_rating (optionally filter by days)",
            r#"
            SELECT
                member_rating,
                COUNT(*) AS n
            FROM customer_features
            WHERE (:days IS NULL OR recency_days <= :days)
            GROUP BY member_rating
            ORDER BY member_rating DESC
            "#,
            ChartSpec::bar("member_rating", "n", "Users per Member Rating"),
        ),
        template(
            "top_purchase_frequency_by_segment",
            "Top purchase_frequency by segment (optionally filter by days)",
            r#"
            SELECT
                COALESCE(segment, -1) AS segment,
                MAX(purchase_frequency) AS max_purchase_frequency,
                AVG(purchase_frequency) AS avg_purchase_frequency,
                COUNT(*) AS n
            FROM customer_features
            WHERE (:days IS NULL OR recency_days <= :days)
            GROUP BY segment
            ORDER BY max_purchase_frequency DESC
            "#,
            ChartSpec::bar(
                "segment",
                "max_purchase_frequency",
                "Top Purchase Frequency by Segment",
            ),
        ),
        template(
            "avg_p1_by_member_rating",
            "Average p1 grouped by member_rating (optionally filter by days)",
            r#"
            SELECT
                member_rating,
                AVG(p1) AS avg_p1,
                COUNT(*) AS n
            FROM customer_features
            WHERE (:days IS NULL OR recency_days <= :days)
            GROUP BY member_rating
            ORDER BY avg_p1 DESC
            "#,
            ChartSpec::bar("member_rating", "avg_p1", "Average p1 by Member Rating"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_registry() {
        let registry = TemplateRegistry::reference().unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "avg_p1_by_segment",
                "count_by_member_rating",
                "top_purchase_frequency_by_segment",
                "avg_p1_by_member_rating",
            ]
        );
        assert_eq!(registry.default_name(), DEFAULT_TEMPLATE);
        assert!(registry.get("drop_everything").is_none());

        for t in registry.iter() {
            assert!(t.sql.contains("(:days IS NULL OR recency_days <= :days)"), "{}", t.name);
            assert!(t.sql.contains(ANALYTIC_TABLE));
            assert!(t.accepts("days"));
            assert!(!t.accepts("segment_id"));
        }
    }

    #[test]
    fn test_rejects_non_select_statement() {
        let bad = template(
            "wipe",
            "not allowed",
            "DELETE FROM customer_features WHERE recency_days > :days",
            ChartSpec::bar("a", "b", "c"),
        );
        let err = TemplateRegistry::new(vec![bad], "wipe").unwrap_err();
        assert!(matches!(err, BiError::Configuration(_)));
    }

    #[test]
    fn test_rejects_stacked_statements() {
        let bad = template(
            "stacked",
            "two statements",
            "SELECT 1; DROP TABLE customer_features",
            ChartSpec::bar("a", "b", "c"),
        );
        assert!(TemplateRegistry::new(vec![bad], "stacked").is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_unknown_default() {
        let mut templates = reference_templates();
        templates.push(templates[0].clone());
        assert!(TemplateRegistry::new(templates, DEFAULT_TEMPLATE).is_err());

        assert!(TemplateRegistry::new(reference_templates(), "nope").is_err());
    }
}
