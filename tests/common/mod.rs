#![allow(dead_code)]

use async_trait::async_trait;
use bi_cobot::error::{BiError, Result};
use bi_cobot::explain::SYSTEM_EXPLAIN;
use bi_cobot::llm::CompletionClient;
use bi_cobot::selector::SYSTEM_PICK;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

type PickFn = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Completion client that answers from a script instead of the network.
///
/// The pick script sees the user prompt and returns the raw reply, or `None`
/// to simulate an upstream failure.
pub struct ScriptedLlm {
    pick: PickFn,
    explanation: Option<String>,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn replying(pick_reply: &str, explanation: Option<&str>) -> Self {
        let reply = pick_reply.to_string();
        Self::with_picker(move |_| Some(reply.clone()), explanation)
    }

    pub fn with_picker<F>(pick: F, explanation: Option<&str>) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            pick: Box::new(pick),
            explanation: explanation.map(String::from),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, system: &str, user: &str, _max_tokens: u32) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));

        if system == SYSTEM_PICK {
            (self.pick)(user).ok_or_else(|| BiError::Completion("429 rate limited".to_string()))
        } else if system == SYSTEM_EXPLAIN {
            self.explanation
                .clone()
                .ok_or_else(|| BiError::Completion("503 overloaded".to_string()))
        } else {
            Err(BiError::Completion(format!("unexpected system prompt: {}", system)))
        }
    }
}

/// (user_email, p1, member_rating, purchase_frequency, recency_days, segment)
pub type FeatureRow = (&'static str, f64, i64, i64, i64, Option<i64>);

pub const FEATURES: &[FeatureRow] = &[
    ("alice@example.com", 0.90, 5, 3, 10, Some(1)),
    ("bob@example.com", 0.50, 3, 1, 100, Some(1)),
    ("carla@example.com", 0.70, 4, 2, 30, Some(2)),
    ("daniel@example.com", 0.20, 2, 0, 365, None),
    ("eva@example.com", 0.80, 5, 5, 80, Some(2)),
];

pub struct FeatureDb {
    _dir: TempDir,
    pub path: PathBuf,
}

impl FeatureDb {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn feature_db() -> FeatureDb {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("features.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE customer_features (
             user_email TEXT PRIMARY KEY,
             p1 REAL,
             member_rating INTEGER,
             purchase_frequency INTEGER,
             recency_days INTEGER,
             segment INTEGER
         );",
    )
    .unwrap();
    for (email, p1, rating, freq, recency, segment) in FEATURES {
        conn.execute(
            "INSERT INTO customer_features VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![email, p1, rating, freq, recency, segment],
        )
        .unwrap();
    }
    FeatureDb { _dir: dir, path }
}
