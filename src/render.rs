//! Terminal presentation of result rows: bar charts and CSV export.

use crate::db::store::Row;
use crate::error::{BiError, Result};
use crate::templates::ChartSpec;
use serde_json::Value;
use std::io::Write;

pub const BAR_WIDTH: usize = 40;

/// Resolve the chart axes against the actual columns.
///
/// Missing `x` falls back to the first column. Missing `y` falls back to the
/// first numeric column (preferring one other than `x`), then to the last
/// column. `None` only when there are no rows.
pub fn effective_chart(spec: &ChartSpec, rows: &[Row]) -> Option<ChartSpec> {
    let first = rows.first()?;
    let columns: Vec<&String> = first.keys().collect();

    let x = if first.contains_key(&spec.x) {
        spec.x.clone()
    } else {
        columns.first()?.to_string()
    };
    let y = if first.contains_key(&spec.y) {
        spec.y.clone()
    } else {
        let numeric: Vec<&String> = columns
            .iter()
            .copied()
            .filter(|c| first.get(c.as_str()).map_or(false, Value::is_number))
            .collect();
        numeric
            .iter()
            .find(|c| ***c != x)
            .or_else(|| numeric.first())
            .or_else(|| columns.last())?
            .to_string()
    };

    Some(ChartSpec {
        x,
        y,
        title: spec.title.clone(),
    })
}

/// Horizontal bar chart, one line per row, scaled to the largest value.
pub fn render_bar_chart(spec: &ChartSpec, rows: &[Row]) -> String {
    let Some(chart) = effective_chart(spec, rows) else {
        return format!("{}\n(no data)\n", spec.title);
    };

    let points: Vec<(String, f64)> = rows
        .iter()
        .map(|row| {
            let label = row.get(&chart.x).map(display_value).unwrap_or_default();
            let value = row.get(&chart.y).and_then(Value::as_f64).unwrap_or(0.0);
            (label, value)
        })
        .collect();

    let label_width = points.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    let max = points.iter().map(|(_, v)| v.abs()).fold(0.0_f64, f64::max);

    let mut out = format!("{}  ({} by {})\n", chart.title, chart.y, chart.x);
    for (label, value) in points {
        let len = if max > 0.0 {
            ((value.abs() / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "{:>width$} | {} {}\n",
            label,
            "█".repeat(len),
            format_number(value),
            width = label_width
        ));
    }
    out
}

/// Write rows as CSV with a header taken from the first row.
pub fn write_csv<W: Write>(rows: &[Row], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if let Some(first) = rows.first() {
        let header: Vec<&str> = first.keys().map(String::as_str).collect();
        csv.write_record(&header).map_err(csv_error)?;
        for row in rows {
            let record: Vec<String> = header
                .iter()
                .map(|column| row.get(*column).map(display_value).unwrap_or_default())
                .collect();
            csv.write_record(&record).map_err(csv_error)?;
        }
    }
    csv.flush()?;
    Ok(())
}

fn csv_error(err: csv::Error) -> BiError {
    BiError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}
