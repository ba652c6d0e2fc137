//! Template-gated BI co-bot.
//!
//! A natural-language question picks one of a fixed set of approved SQL
//! templates; the model never writes SQL. See [`runner::BiRunner::resolve`].

pub mod config;
pub mod db;
pub mod error;
pub mod eval;
pub mod executor;
pub mod explain;
pub mod llm;
pub mod params;
pub mod render;
pub mod runner;
pub mod selector;
pub mod templates;

pub use error::{BiError, Result};
pub use runner::{BiRunner, QueryResult};
