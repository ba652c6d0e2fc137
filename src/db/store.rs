//! Read-only analytic store
//!
//! One short-lived connection per query: open, query, close. Rows come back
//! as ordered JSON maps keyed by the column aliases of the statement.

use crate::error::{BiError, Result};
use rusqlite::types::{ToSql, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Column name to scalar, in SELECT order.
pub type Row = Map<String, Value>;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Parameterised read-only query execution.
pub trait AnalyticStore: Send + Sync {
    /// Run `sql` binding each `(name, value)` to the `:name` placeholder.
    fn query(&self, sql: &str, params: &[(String, Option<i64>)]) -> Result<Vec<Row>>;
}

/// Turn a `DATABASE_URL` into a filesystem path.
///
/// Accepts `sqlite:///relative.db`, `sqlite:////absolute.db`, `sqlite:path.db`
/// and bare paths. Other schemes are a configuration error.
pub fn resolve_sqlite_path(url: &str) -> Result<PathBuf> {
    let url = url.trim();
    if url.is_empty() {
        return Err(BiError::Configuration("DATABASE_URL is empty".to_string()));
    }

    if let Some(rest) = url.strip_prefix("sqlite:///") {
        return non_empty_path(rest, url);
    }
    if let Some(rest) = url.strip_prefix("sqlite://") {
        return non_empty_path(rest, url);
    }
    if let Some(rest) = url.strip_prefix("sqlite:") {
        return non_empty_path(rest, url);
    }
    if url.contains("://") {
        return Err(BiError::Configuration(format!(
            "Unsupported database URL (only sqlite is supported): {}",
            url
        )));
    }
    Ok(PathBuf::from(url))
}

fn non_empty_path(rest: &str, url: &str) -> Result<PathBuf> {
    if rest.is_empty() || rest == ":memory:" {
        return Err(BiError::Configuration(format!(
            "Database URL has no file path: {}",
            url
        )));
    }
    Ok(PathBuf::from(rest))
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(resolve_sqlite_path(url)?))
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            BiError::DataAccess(format!(
                "Failed to open database {}: {}",
                self.path.display(),
                e
            ))
        })?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl AnalyticStore for SqliteStore {
    fn query(&self, sql: &str, params: &[(String, Option<i64>)]) -> Result<Vec<Row>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(sql)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let placeholders: Vec<String> = params.iter().map(|(name, _)| format!(":{}", name)).collect();
        let named: Vec<(&str, &dyn ToSql)> = placeholders
            .iter()
            .zip(params.iter())
            .map(|(placeholder, (_, value))| (placeholder.as_str(), value as &dyn ToSql))
            .collect();

        let mut rows = stmt.query(named.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                record.insert(column.clone(), to_json(row.get_ref(idx)?));
            }
            out.push(record);
        }

        debug!("Query returned {} rows from {}", out.len(), self.path.display());
        Ok(out)
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}
