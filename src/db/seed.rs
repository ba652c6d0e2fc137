//! Demo data seeding
//!
//! Writes the two source tables (`leads_scored`, `transactions`) and derives
//! the analytic table `customer_features` from them:
//! - `purchase_frequency`: number of transactions per user (0 when none)
//! - `recency_days`: whole days since the user's last transaction (365 when none)
//! - `segment`: p1 quartile bucket `0..=3`, NULL for users with no purchases
//!
//! Tables are dropped and recreated on every run.

use crate::db::store::resolve_sqlite_path;
use crate::error::{BiError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

pub const DEFAULT_RANDOM_SEED: u64 = 42;
pub const DEFAULT_LEADS: usize = 500;
pub const DEFAULT_TRANSACTIONS: usize = 2000;
/// Transactions are spread over roughly the last six months.
pub const DAYS_BACK: i64 = 180;
pub const NO_PURCHASE_RECENCY_DAYS: i64 = 365;

const FIRST_NAMES: &[&str] = &[
    "alex", "sam", "jordan", "chris", "taylor", "morgan", "casey", "jamie", "riley", "drew",
    "blake", "cameron", "avery", "nate", "max", "jules", "parker", "reese", "devon", "hayden",
];
const LAST_NAMES: &[&str] = &[
    "lee", "kim", "lopez", "garcia", "miller", "smith", "johnson", "anderson", "davis", "martin",
    "clark", "lewis", "robinson", "walker", "young", "allen", "king", "wright", "scott", "nguyen",
];
const DOMAINS: &[&str] = &["example.com", "sample.org", "mail.net", "demo.io"];
const RATING_WEIGHTS: [u32; 5] = [5, 10, 35, 30, 20];

#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    pub user_email: String,
    pub p1: f64,
    pub member_rating: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub user_email: String,
    pub product_id: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerFeatures {
    pub user_email: String,
    pub p1: f64,
    pub member_rating: i64,
    pub purchase_frequency: i64,
    pub recency_days: i64,
    pub segment: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum SeedMode {
    /// The fixed five-user classroom dataset.
    Demo,
    /// Deterministic synthetic dataset.
    Random {
        leads: usize,
        transactions: usize,
        seed: u64,
    },
}

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub mode: SeedMode,
    /// Reference instant for timestamps and recency.
    pub now: DateTime<Utc>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            mode: SeedMode::Random {
                leads: DEFAULT_LEADS,
                transactions: DEFAULT_TRANSACTIONS,
                seed: DEFAULT_RANDOM_SEED,
            },
            now: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub leads: usize,
    pub transactions: usize,
    pub features: usize,
}

/// Seed the database at `database_url`, creating the file if needed.
pub fn seed_demo(database_url: &str, options: &SeedOptions) -> Result<SeedSummary> {
    let path = resolve_sqlite_path(database_url)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (leads, purchases) = match &options.mode {
        SeedMode::Demo => demo_dataset(),
        SeedMode::Random {
            leads,
            transactions,
            seed,
        } => random_dataset(*leads, *transactions, *seed, options.now)?,
    };
    let features = build_features(&leads, &purchases, options.now);

    let mut conn = Connection::open(&path)
        .map_err(|e| BiError::DataAccess(format!("Failed to open {}: {}", path.display(), e)))?;
    let tx = conn.transaction()?;
    write_leads(&tx, &leads)?;
    write_purchases(&tx, &purchases)?;
    write_features(&tx, &features)?;
    tx.commit()?;

    info!(
        "Seeded {}: {} leads, {} transactions, {} feature rows",
        path.display(),
        leads.len(),
        purchases.len(),
        features.len()
    );

    Ok(SeedSummary {
        leads: leads.len(),
        transactions: purchases.len(),
        features: features.len(),
    })
}

/// Derive one feature row per lead, ordered by frequency desc then recency asc.
pub fn build_features(
    leads: &[Lead],
    purchases: &[Purchase],
    now: DateTime<Utc>,
) -> Vec<CustomerFeatures> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    let mut last_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for purchase in purchases {
        *counts.entry(purchase.user_email.as_str()).or_insert(0) += 1;
        last_seen
            .entry(purchase.user_email.as_str())
            .and_modify(|ts| {
                if purchase.ts > *ts {
                    *ts = purchase.ts;
                }
            })
            .or_insert(purchase.ts);
    }

    let mut features: Vec<CustomerFeatures> = leads
        .iter()
        .map(|lead| {
            let email = lead.user_email.as_str();
            let purchase_frequency = counts.get(email).copied().unwrap_or(0);
            let recency_days = last_seen
                .get(email)
                .map(|ts| (now - *ts).num_days().max(0))
                .unwrap_or(NO_PURCHASE_RECENCY_DAYS);
            let segment = (purchase_frequency > 0).then(|| p1_segment(lead.p1));

            CustomerFeatures {
                user_email: lead.user_email.clone(),
                p1: lead.p1,
                member_rating: lead.member_rating,
                purchase_frequency,
                recency_days,
                segment,
            }
        })
        .collect();

    features.sort_by(|a, b| {
        b.purchase_frequency
            .cmp(&a.purchase_frequency)
            .then(a.recency_days.cmp(&b.recency_days))
            .then(a.user_email.cmp(&b.user_email))
    });
    features
}

fn p1_segment(p1: f64) -> i64 {
    ((p1 * 4.0).floor() as i64).clamp(0, 3)
}

fn demo_dataset() -> (Vec<Lead>, Vec<Purchase>) {
    let lead = |email: &str, p1: f64, rating: i64| Lead {
        user_email: email.to_string(),
        p1,
        member_rating: rating,
    };
    let leads = vec![
        lead("alice@example.com", 0.85, 5),
        lead("bob@example.com", 0.62, 3),
        lead("carla@example.com", 0.73, 4),
        lead("daniel@example.com", 0.55, 2),
        lead("eva@example.com", 0.91, 5),
    ];

    let purchase = |email: &str, product: &str, ts: &str| Purchase {
        user_email: email.to_string(),
        product_id: product.to_string(),
        ts: DateTime::parse_from_rfc3339(ts)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
    };
    let purchases = vec![
        purchase("alice@example.com", "P001", "2024-09-01T10:30:00Z"),
        purchase("alice@example.com", "P002", "2024-09-15T14:00:00Z"),
        purchase("bob@example.com", "P003", "2024-06-21T09:00:00Z"),
        purchase("carla@example.com", "P004", "2024-07-01T16:00:00Z"),
        purchase("carla@example.com", "P005", "2024-08-11T11:15:00Z"),
        purchase("eva@example.com", "P006", "2024-09-10T08:45:00Z"),
        purchase("eva@example.com", "P007", "2024-09-20T13:30:00Z"),
        purchase("eva@example.com", "P008", "2024-09-28T19:00:00Z"),
    ];

    (leads, purchases)
}

fn random_dataset(
    n_leads: usize,
    n_transactions: usize,
    seed: u64,
    now: DateTime<Utc>,
) -> Result<(Vec<Lead>, Vec<Purchase>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ratings = WeightedIndex::new(RATING_WEIGHTS)
        .map_err(|e| BiError::Configuration(format!("Bad rating weights: {}", e)))?;

    let leads: Vec<Lead> = (0..n_leads)
        .map(|i| {
            let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
            let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
            let domain = DOMAINS[rng.gen_range(0..DOMAINS.len())];
            // Mean of two uniforms: mass in the middle, like a lead score
            let p1: f64 = (rng.gen::<f64>() + rng.gen::<f64>()) / 2.0;
            Lead {
                user_email: format!("{}.{}{}@{}", first, last, i + 1, domain),
                p1: (p1 * 10_000.0).round() / 10_000.0,
                member_rating: ratings.sample(&mut rng) as i64 + 1,
            }
        })
        .collect();

    if leads.is_empty() {
        return Ok((leads, Vec::new()));
    }

    // Higher p1 and rating buy a bit more often
    let weights: Vec<f64> = leads
        .iter()
        .map(|l| ((0.5 + 0.5 * l.p1) * (0.5 + 0.5 * l.member_rating as f64 / 5.0)).max(1e-3))
        .collect();
    let buyers = WeightedIndex::new(&weights)
        .map_err(|e| BiError::Configuration(format!("Bad buyer weights: {}", e)))?;

    let mut purchases: Vec<Purchase> = (0..n_transactions)
        .map(|_| {
            let buyer = &leads[buyers.sample(&mut rng)];
            let days_ago = rng.gen_range(0..DAYS_BACK);
            let secs = rng.gen_range(0..24 * 3600);
            Purchase {
                user_email: buyer.user_email.clone(),
                product_id: format!("SKU-{:03}", rng.gen_range(1..=50)),
                ts: now - Duration::days(days_ago) - Duration::seconds(secs),
            }
        })
        .collect();
    purchases.sort_by_key(|p| p.ts);

    Ok((leads, purchases))
}

fn write_leads(tx: &Transaction<'_>, leads: &[Lead]) -> Result<()> {
    tx.execute_batch(
        "DROP TABLE IF EXISTS leads_scored;
         CREATE TABLE leads_scored (
             user_email TEXT PRIMARY KEY,
             p1 REAL,
             member_rating INTEGER
         );",
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO leads_scored (user_email, p1, member_rating) VALUES (?1, ?2, ?3)",
    )?;
    for lead in leads {
        stmt.execute(params![lead.user_email, lead.p1, lead.member_rating])?;
    }
    Ok(())
}

fn write_purchases(tx: &Transaction<'_>, purchases: &[Purchase]) -> Result<()> {
    tx.execute_batch(
        "DROP TABLE IF EXISTS transactions;
         CREATE TABLE transactions (
             user_email TEXT,
             product_id TEXT,
             ts TEXT
         );",
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO transactions (user_email, product_id, ts) VALUES (?1, ?2, ?3)",
    )?;
    for purchase in purchases {
        stmt.execute(params![
            purchase.user_email,
            purchase.product_id,
            purchase.ts.to_rfc3339()
        ])?;
    }
    Ok(())
}

fn write_features(tx: &Transaction<'_>, features: &[CustomerFeatures]) -> Result<()> {
    tx.execute_batch(
        "DROP TABLE IF EXISTS customer_features;
         CREATE TABLE customer_features (
             user_email TEXT PRIMARY KEY,
             p1 REAL,
             member_rating INTEGER,
             purchase_frequency INTEGER NOT NULL,
             recency_days INTEGER NOT NULL,
             segment INTEGER
         );",
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO customer_features
             (user_email, p1, member_rating, purchase_frequency, recency_days, segment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for row in features {
        stmt.execute(params![
            row.user_email,
            row.p1,
            row.member_rating,
            row.purchase_frequency,
            row.recency_days,
            row.segment
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_build_features_from_demo_dataset() {
        let (leads, purchases) = demo_dataset();
        let features = build_features(&leads, &purchases, fixed_now());
        assert_eq!(features.len(), 5);

        // eva: 3 purchases, last on 2024-09-28T19:00 -> 2 whole days
        assert_eq!(features[0].user_email, "eva@example.com");
        assert_eq!(features[0].purchase_frequency, 3);
        assert_eq!(features[0].recency_days, 2);
        assert_eq!(features[0].segment, Some(3));

        let daniel = features.iter().find(|f| f.user_email == "daniel@example.com").unwrap();
        assert_eq!(daniel.purchase_frequency, 0);
        assert_eq!(daniel.recency_days, NO_PURCHASE_RECENCY_DAYS);
        assert_eq!(daniel.segment, None);
    }

    #[test]
    fn test_random_dataset_is_deterministic() {
        let a = random_dataset(50, 200, 7, fixed_now()).unwrap();
        let b = random_dataset(50, 200, 7, fixed_now()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 50);
        assert_eq!(a.1.len(), 200);
        assert!(a.0.iter().all(|l| (1..=5).contains(&l.member_rating)));
        assert!(a.0.iter().all(|l| (0.0..=1.0).contains(&l.p1)));
        assert!(a.1.iter().all(|p| (fixed_now() - p.ts).num_days() < DAYS_BACK + 1));
    }

    #[test]
    fn test_seed_writes_customer_features() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:///{}", dir.path().join("nested/bi.db").display());
        let options = SeedOptions {
            mode: SeedMode::Demo,
            now: fixed_now(),
        };

        let summary = seed_demo(&url, &options).unwrap();
        assert_eq!(summary.leads, 5);
        assert_eq!(summary.transactions, 8);
        assert_eq!(summary.features, 5);

        // Reseeding replaces rather than appends
        seed_demo(&url, &options).unwrap();
        let conn = Connection::open(resolve_sqlite_path(&url).unwrap()).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM customer_features", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 5);
    }
}
