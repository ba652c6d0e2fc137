//! Analytic store access and demo data seeding
//!
//! The store is read-only from the resolver's point of view; only the
//! seeder opens it for writing.

pub mod seed;
pub mod store;

pub use seed::{seed_demo, SeedOptions, SeedSummary};
pub use store::{resolve_sqlite_path, AnalyticStore, Row, SqliteStore};
