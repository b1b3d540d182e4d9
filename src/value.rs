//! Row and cell representation shared by the substitution engine and the
//! statement emitter.
//!
//! A cell starts life as plain fetched text (or NULL). The substitution
//! engine may replace a cell's value with a raw SQL fragment — a
//! `nextval(...)` call or a natural-key `SELECT` subquery — without
//! changing how the rest of the pipeline treats the column; only the
//! emitter's final formatting step looks at `Cell` to decide whether to
//! quote, leave bare, or parenthesize.

use std::collections::HashMap;

/// One column's value within a row being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    /// Plain fetched text, to be quoted/escaped per the column's declared type.
    Text(String),
    /// A raw SQL fragment (a `nextval(...)` call or a rewritten FK subquery)
    /// to be embedded verbatim, parenthesized, in the emitted statement.
    Sql(String),
}

impl Cell {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    #[must_use]
    pub fn from_text(value: Option<&str>) -> Self {
        match value {
            Some(v) => Cell::Text(v.to_string()),
            None => Cell::Null,
        }
    }
}

/// A row being carried through substitution and emission: column name to
/// cell, plus declared ordering so emitted column lists are deterministic.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub columns: Vec<String>,
    pub cells: HashMap<String, Cell>,
}

impl Row {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn set(&mut self, column: &str, cell: Cell) {
        self.cells.insert(column.to_string(), cell);
    }

    /// Iterate cells in column-declaration order.
    pub fn ordered(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().filter_map(move |c| self.cells.get(c).map(|v| (c.as_str(), v)))
    }
}

/// Render a plain fetched text value as a SQL literal, based on the
/// column's declared catalog type.
///
/// `NUMERIC` values are embedded unquoted (they already come back as plain
/// digit text from the `::text` cast and quoting them would just add a
/// harmless but noisy cast on the other end); everything else is quoted and
/// escaped. Timestamp columns get no special casing here because the
/// `::text` cast already yields a format Postgres parses back unambiguously.
#[must_use]
pub fn literal_for_type(data_type: &str, text: &str) -> String {
    if is_numeric_type(data_type) {
        text.to_string()
    } else {
        crate::quote_literal(text)
    }
}

fn is_numeric_type(data_type: &str) -> bool {
    matches!(data_type, "numeric" | "integer" | "bigint" | "smallint" | "double precision" | "real")
}

/// Format a cell for embedding in an emitted statement, given the column's
/// declared type (ignored for `Null`/`Sql` cells).
#[must_use]
pub fn format_cell(cell: &Cell, data_type: &str) -> String {
    match cell {
        Cell::Null => "null".to_string(),
        Cell::Sql(sql) => format!("({sql})"),
        Cell::Text(text) => literal_for_type(data_type, text),
    }
}
