//! Database access boundary.
//!
//! Everything above this module talks to [`Database`], never to `postgres`
//! directly. This is what lets the crawler, substitution engine and emitter
//! be exercised against [`MockDatabase`] in tests instead of a live server,
//! mirroring the `sqlmock`-backed harness the original tool's test suite used.

use crate::error::{Error, Result};
use postgres::{Client, NoTls};

/// A single row, with every cell already rendered as text (or `None` for
/// SQL NULL). Fetches cast every column to `::text` so callers never need
/// a `postgres` type feature per column type; declared types are tracked
/// separately and consulted only when formatting values for output.
#[derive(Debug, Clone, Default)]
pub struct TextRow {
    pub values: Vec<Option<String>>,
}

impl TextRow {
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }
}

/// Query execution boundary used by schema introspection, crawling,
/// substitution and statement emission.
pub trait Database {
    /// Run a query and return every row with columns cast to text.
    fn query_text(&mut self, sql: &str) -> Result<Vec<TextRow>>;

    /// Run a query returning no rows (e.g. an UPDATE during post-order
    /// backfill or an apply-time DDL probe).
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a whole script of semicolon-separated statements as a single
    /// simple-query batch, so statement boundaries are left to the server's
    /// own parser instead of a naive client-side `split(';')` that would
    /// break on a `;` inside a string literal.
    fn execute_batch(&mut self, sql: &str) -> Result<()>;
}

/// Live connection to a Postgres server.
pub struct PgDatabase {
    client: Client,
}

impl PgDatabase {
    /// Open a new connection using a `postgres`-crate connection string.
    pub fn connect(connection_string: &str) -> Result<Self> {
        let client = Client::connect(connection_string, NoTls)
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Database for PgDatabase {
    fn query_text(&mut self, sql: &str) -> Result<Vec<TextRow>> {
        let rows = self.client.query(sql, &[])?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                values.push(row.get::<_, Option<String>>(i));
            }
            out.push(TextRow { values });
        }
        Ok(out)
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        Ok(self.client.execute(sql, &[])?)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        Ok(self.client.batch_execute(sql)?)
    }
}

/// Scripted, in-order mock used by tests.
///
/// Callers queue expected `(sql-shape, response)` pairs with
/// [`MockDatabase::expect_query`]/[`MockDatabase::expect_execute`]; each
/// call to [`Database::query_text`]/[`Database::execute`] consumes the next
/// entry in order and panics (via an error) on a mismatch, the same
/// discipline `sqlmock.MatchExpectationsInOrder(true)` enforced in the
/// original Go test harness.
#[cfg(test)]
pub mod mock {
    use super::{Database, Result, TextRow};
    use crate::error::Error;
    use std::collections::VecDeque;

    enum Expectation {
        Query { rows: Vec<TextRow> },
        Execute { affected: u64 },
        Batch,
    }

    #[derive(Default)]
    pub struct MockDatabase {
        queue: VecDeque<Expectation>,
        pub executed: Vec<String>,
    }

    impl MockDatabase {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the response for the next `query_text` call.
        pub fn expect_query(&mut self, rows: Vec<Vec<Option<&str>>>) -> &mut Self {
            let rows = rows
                .into_iter()
                .map(|cells| TextRow {
                    values: cells.into_iter().map(|c| c.map(str::to_string)).collect(),
                })
                .collect();
            self.queue.push_back(Expectation::Query { rows });
            self
        }

        /// Queue the affected-row count for the next `execute` call.
        pub fn expect_execute(&mut self, affected: u64) -> &mut Self {
            self.queue.push_back(Expectation::Execute { affected });
            self
        }

        /// Queue a successful response for the next `execute_batch` call.
        pub fn expect_batch(&mut self) -> &mut Self {
            self.queue.push_back(Expectation::Batch);
            self
        }

        #[must_use]
        pub fn expectations_met(&self) -> bool {
            self.queue.is_empty()
        }
    }

    impl Database for MockDatabase {
        fn query_text(&mut self, sql: &str) -> Result<Vec<TextRow>> {
            self.executed.push(sql.to_string());
            match self.queue.pop_front() {
                Some(Expectation::Query { rows }) => Ok(rows),
                Some(Expectation::Execute { .. }) | None => Err(Error::Other(format!(
                    "unexpected query, no matching expectation queued: {sql}"
                ))),
            }
        }

        fn execute(&mut self, sql: &str) -> Result<u64> {
            self.executed.push(sql.to_string());
            match self.queue.pop_front() {
                Some(Expectation::Execute { affected }) => Ok(affected),
                Some(Expectation::Query { .. } | Expectation::Batch) | None => Err(Error::Other(format!(
                    "unexpected execute, no matching expectation queued: {sql}"
                ))),
            }
        }

        fn execute_batch(&mut self, sql: &str) -> Result<()> {
            self.executed.push(sql.to_string());
            match self.queue.pop_front() {
                Some(Expectation::Batch) => Ok(()),
                Some(Expectation::Query { .. } | Expectation::Execute { .. }) | None => Err(Error::Other(format!(
                    "unexpected execute_batch, no matching expectation queued: {sql}"
                ))),
            }
        }
    }
}
