//! Safe BI parameters
//!
//! Pulls the two recognised parameters (`days`, `segment_id`) out of a free
//! text question and canonicalises them. Nothing in here fails: values that
//! are missing, malformed or out of bound become `None`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound for the recency window (3 years).
pub const MAX_DAYS: i64 = 365 * 3;
pub const MIN_DAYS: i64 = 1;
pub const SEGMENT_MIN: i64 = -1;
pub const SEGMENT_MAX: i64 = 1000;

lazy_static! {
    static ref DAYS_PATTERN: Regex = Regex::new(r"(?i)last\s+(\d{1,4})\s*day").unwrap();
    static ref SEGMENT_PATTERN: Regex = Regex::new(r"(?i)segment\s+(-?\d+)").unwrap();
}

/// Validated parameter bundle. `days == None` disables the recency filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBundle {
    pub days: Option<u32>,
    pub segment_id: Option<i32>,
}

impl ParamBundle {
    /// Look a parameter up by the name templates declare it under.
    pub fn get(&self, name: &str) -> Option<Option<i64>> {
        match name {
            "days" => Some(self.days.map(i64::from)),
            "segment_id" => Some(self.segment_id.map(i64::from)),
            _ => None,
        }
    }
}

/// Unvalidated bundle, as it might arrive from a CLI flag, a form or JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParams {
    #[serde(default)]
    pub days: Value,
    #[serde(default)]
    pub segment_id: Value,
}

impl From<ParamBundle> for RawParams {
    fn from(bundle: ParamBundle) -> Self {
        Self {
            days: bundle.days.map(Value::from).unwrap_or(Value::Null),
            segment_id: bundle.segment_id.map(Value::from).unwrap_or(Value::Null),
        }
    }
}

/// `"last N day(s)"`, N in `[1, 1095]`. First match wins.
pub fn extract_days(question: &str) -> Option<u32> {
    let caps = DAYS_PATTERN.captures(question)?;
    let days = caps.get(1)?.as_str().parse::<i64>().ok()?;
    within(days, MIN_DAYS, MAX_DAYS).map(|d| d as u32)
}

/// `"segment N"`, N in `[-1, 1000]`. First match wins.
pub fn extract_segment(question: &str) -> Option<i32> {
    let caps = SEGMENT_PATTERN.captures(question)?;
    let segment = caps.get(1)?.as_str().parse::<i64>().ok()?;
    within(segment, SEGMENT_MIN, SEGMENT_MAX).map(|s| s as i32)
}

pub fn extract_params(question: &str) -> ParamBundle {
    ParamBundle {
        days: extract_days(question),
        segment_id: extract_segment(question),
    }
}

/// Canonicalise a raw bundle. Out-of-bound or non-numeric values become `None`.
pub fn validate_params(raw: &RawParams) -> ParamBundle {
    ParamBundle {
        days: as_integer(&raw.days)
            .and_then(|d| within(d, MIN_DAYS, MAX_DAYS))
            .map(|d| d as u32),
        segment_id: as_integer(&raw.segment_id)
            .and_then(|s| within(s, SEGMENT_MIN, SEGMENT_MAX))
            .map(|s| s as i32),
    }
}

fn within(value: i64, min: i64, max: i64) -> Option<i64> {
    (min..=max).contains(&value).then_some(value)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_days_phrases() {
        assert_eq!(extract_days("What's the average p1 by segment for the last 45 days?"), Some(45));
        assert_eq!(extract_days("LAST 1 DAY please"), Some(1));
        assert_eq!(extract_days("over the last 30days"), Some(30));
        assert_eq!(extract_days("last 1095 days"), Some(1095));
    }

    #[test]
    fn test_extract_days_rejects_out_of_bound_and_other_units() {
        assert_eq!(extract_days("last 9999 days"), None);
        assert_eq!(extract_days("last 0 days"), None);
        assert_eq!(extract_days("last 1096 days"), None);
        assert_eq!(extract_days("last 12345 days"), None);
        assert_eq!(extract_days("last 3 weeks"), None);
        assert_eq!(extract_days("recently"), None);
        assert_eq!(extract_days(""), None);
    }

    #[test]
    fn test_extract_days_first_match_wins() {
        assert_eq!(extract_days("last 7 days vs last 30 days"), Some(7));
        // An out-of-bound first match is not rescued by a later one
        assert_eq!(extract_days("last 5000 days or last 30 days"), None);
    }

    #[test]
    fn test_extract_segment() {
        assert_eq!(extract_segment("users in segment 3 only"), Some(3));
        assert_eq!(extract_segment("Segment -1"), Some(-1));
        assert_eq!(extract_segment("segment 5000"), None);
        assert_eq!(extract_segment("segment -2"), None);
        assert_eq!(extract_segment("segment 99999999999999999999999"), None);
        assert_eq!(extract_segment("segments"), None);
        assert_eq!(extract_segment("segment 2 and segment 4"), Some(2));
    }

    #[test]
    fn test_extract_params_reads_both_in_any_order() {
        assert_eq!(
            extract_params("segment 3 last 9 days"),
            ParamBundle { days: Some(9), segment_id: Some(3) }
        );
        assert_eq!(
            extract_params("last 2000 days for segment 1001"),
            ParamBundle::default()
        );
        assert_eq!(
            extract_params("How many users per member rating?"),
            ParamBundle::default()
        );

        // Extraction output is already canonical
        let bundle = extract_params("Top purchase frequency for segment 2 in the last 100 days");
        assert_eq!(validate_params(&RawParams::from(bundle)), bundle);
    }

    #[test]
    fn test_validate_coerces_instead_of_failing() {
        let raw = RawParams {
            days: json!("90"),
            segment_id: json!(5000),
        };
        assert_eq!(
            validate_params(&raw),
            ParamBundle { days: Some(90), segment_id: None }
        );

        let raw = RawParams {
            days: json!("ninety"),
            segment_id: json!(true),
        };
        assert_eq!(validate_params(&raw), ParamBundle::default());

        let raw = RawParams {
            days: json!(30.0),
            segment_id: json!(2.5),
        };
        assert_eq!(
            validate_params(&raw),
            ParamBundle { days: Some(30), segment_id: None }
        );

        let raw = RawParams {
            days: json!([1, 2]),
            segment_id: json!(-1),
        };
        assert_eq!(
            validate_params(&raw),
            ParamBundle { days: None, segment_id: Some(-1) }
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let inputs = vec![
            RawParams::default(),
            RawParams { days: json!(0), segment_id: json!(1000) },
            RawParams { days: json!(" 45 "), segment_id: json!("-1") },
            RawParams { days: json!(1_000_000), segment_id: json!(null) },
            RawParams { days: json!({"a": 1}), segment_id: json!(1e300) },
        ];
        for raw in inputs {
            let once = validate_params(&raw);
            let twice = validate_params(&RawParams::from(once));
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_raw_params_from_json_object() {
        let raw: RawParams = serde_json::from_value(json!({"days": 14})).unwrap();
        assert_eq!(raw.segment_id, Value::Null);
        assert_eq!(validate_params(&raw).days, Some(14));
    }

    #[test]
    fn test_bundle_lookup_by_name() {
        let bundle = ParamBundle { days: Some(7), segment_id: None };
        assert_eq!(bundle.get("days"), Some(Some(7)));
        assert_eq!(bundle.get("segment_id"), Some(None));
        assert_eq!(bundle.get("limit"), None);
    }
}
