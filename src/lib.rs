//! entity-sync - inter-server sync of software/configuration/image entities
//! between two systems-management servers.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Server connection resolution
//! - [`db`] - Database access trait and Postgres/mock implementations
//! - [`schema`] - Catalog introspection and the table-filter overlay
//! - [`crawler`] - Foreign-key graph traversal
//! - [`substitution`] - Natural-key substitution engine
//! - [`emitter`] - SQL statement generation
//! - [`pipeline`] - Orchestration of export/import runs
//! - [`sync`] - Version manifests, blob trees, config resync
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod crawler;
pub mod db;
pub mod emitter;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod substitution;
pub mod sync;
pub mod value;

pub use error::{Error, Result};

/// Global dry-run flag for `--dry-run`.
///
/// When set, export/import commands report what they would do without
/// touching the database or filesystem.
pub static DRY_RUN: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if dry-run mode is active.
#[inline]
pub fn is_dry_run() -> bool {
    DRY_RUN.load(std::sync::atomic::Ordering::Relaxed)
}

/// Escape a string literal for embedding directly in generated SQL text.
///
/// Doubles single quotes, matching the quoting rules Postgres uses for
/// standard-conforming string literals.
#[must_use]
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
