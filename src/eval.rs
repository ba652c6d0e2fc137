//! Golden-case evaluation of template selection
//!
//! Only the selector is exercised, so no store is needed; each case costs one
//! completion call.

use crate::error::Result;
use crate::selector::TemplateSelector;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenCase {
    pub question: String,
    pub expected: String,
}

impl GoldenCase {
    pub fn new(question: &str, expected: &str) -> Self {
        Self {
            question: question.to_string(),
            expected: expected.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub question: String,
    pub expected: String,
    pub chosen: String,
    pub ok: bool,
    pub fallback: bool,
    pub latency_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub accuracy: f64,
    pub mean_latency_seconds: f64,
    pub cases: Vec<CaseResult>,
}

pub fn golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase::new(
            "What's the average p1 by segment for the last 60 days?",
            "avg_p1_by_segment",
        ),
        GoldenCase::new("How many users per member rating?", "count_by_member_rating"),
        GoldenCase::new(
            "Show top purchase frequency by segment in the last 30 days",
            "top_purchase_frequency_by_segment",
        ),
        GoldenCase::new(
            "Average p1 by member rating over recent users",
            "avg_p1_by_member_rating",
        ),
    ]
}

pub async fn evaluate(selector: &TemplateSelector, cases: &[GoldenCase]) -> Result<EvalReport> {
    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        let started = Instant::now();
        let selection = selector.select(&case.question).await?;
        let latency = started.elapsed().as_secs_f64();

        results.push(CaseResult {
            question: case.question.clone(),
            expected: case.expected.clone(),
            chosen: selection.name().to_string(),
            ok: selection.name() == case.expected,
            fallback: selection.is_fallback(),
            latency_seconds: (latency * 1000.0).round() / 1000.0,
        });
    }

    let (accuracy, mean_latency_seconds) = if results.is_empty() {
        (0.0, 0.0)
    } else {
        let n = results.len() as f64;
        (
            results.iter().filter(|r| r.ok).count() as f64 / n,
            results.iter().map(|r| r.latency_seconds).sum::<f64>() / n,
        )
    };

    Ok(EvalReport {
        accuracy,
        mean_latency_seconds,
        cases: results,
    })
}
