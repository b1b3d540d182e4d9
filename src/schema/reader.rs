//! Schema Reader: turns `information_schema`/`pg_catalog` rows into
//! [`Table`] values, then hands each one through [`apply_table_filters`].

use super::{Column, Reference, Table, UniqueIndex, apply_table_filters};
use crate::db::Database;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Reads and filters tables from a live catalog.
pub struct SchemaReader<'a, D: Database> {
    db: &'a mut D,
}

impl<'a, D: Database> SchemaReader<'a, D> {
    pub fn new(db: &'a mut D) -> Self {
        Self { db }
    }

    /// Read a single table by name, applying the filter overlay.
    ///
    /// Returns [`Error::TableNotFound`] if the table does not exist in the
    /// `public` schema — the election rule this tool relies on: a table
    /// either exists with exactly this shape on both servers, or the export
    /// cannot proceed.
    pub fn read_table(&mut self, name: &str) -> Result<Table> {
        let columns = self.read_columns(name)?;
        if columns.is_empty() {
            return Err(Error::TableNotFound(name.to_string()));
        }
        let primary_key = self.read_primary_key(name)?;
        let sequence = self.read_primary_key_sequence(name, &primary_key)?;
        let unique_indexes = self.read_unique_indexes(name)?;
        let references = self.read_references(name)?;

        let main_unique_index = elect_main_unique_index(&unique_indexes);

        let table = Table {
            name: name.to_string(),
            columns,
            primary_key,
            sequence,
            unique_indexes,
            main_unique_index,
            references,
            unexported_columns: Vec::new(),
            only_if_parent_exists: false,
        };

        Ok(apply_table_filters(table))
    }

    /// Read every table named in `names`, collecting them into a map keyed
    /// by table name. Stops at the first unreadable table.
    pub fn read_tables(&mut self, names: &[&str]) -> Result<HashMap<String, Table>> {
        let mut out = HashMap::with_capacity(names.len());
        for name in names {
            let table = self.read_table(name)?;
            out.insert((*name).to_string(), table);
        }
        Ok(out)
    }

    fn read_columns(&mut self, table: &str) -> Result<Vec<Column>> {
        let sql = format!(
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = {} \
             ORDER BY ordinal_position",
            crate::quote_literal(table)
        );
        let rows = self.db.query_text(&sql)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(Column {
                    name: row.get(0)?.to_string(),
                    data_type: row.get(1)?.to_string(),
                    nullable: row.get(2) == Some("YES"),
                })
            })
            .collect())
    }

    fn read_primary_key(&mut self, table: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT a.attname \
             FROM pg_index i \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = {}::regclass AND i.indisprimary \
             ORDER BY array_position(i.indkey, a.attnum)",
            crate::quote_literal(table)
        );
        let rows = self.db.query_text(&sql)?;
        Ok(rows.iter().filter_map(|r| r.get(0).map(str::to_string)).collect())
    }

    /// Resolve the sequence backing a single-column primary key via
    /// `pg_get_serial_sequence`, the catalog function Postgres itself uses
    /// to answer "what sequence does this `serial`/`identity` column own".
    /// Composite primary keys and tables with no owned sequence leave this
    /// `None`, for the overlay to fill in from its own knowledge.
    fn read_primary_key_sequence(&mut self, table: &str, primary_key: &[String]) -> Result<Option<String>> {
        let [column] = primary_key else { return Ok(None) };
        let sql = format!(
            "SELECT pg_get_serial_sequence({}, {})",
            crate::quote_literal(table),
            crate::quote_literal(column)
        );
        let rows = self.db.query_text(&sql)?;
        Ok(rows.first().and_then(|r| r.get(0)).map(str::to_string))
    }

    fn read_unique_indexes(&mut self, table: &str) -> Result<Vec<UniqueIndex>> {
        let sql = format!(
            "SELECT ic.relname AS index_name, a.attname \
             FROM pg_index i \
             JOIN pg_class ic ON ic.oid = i.indexrelid \
             JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
             WHERE i.indrelid = {}::regclass AND i.indisunique AND NOT i.indisprimary \
             ORDER BY ic.relname, array_position(i.indkey, a.attnum)",
            crate::quote_literal(table)
        );
        let rows = self.db.query_text(&sql)?;
        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for row in &rows {
            let (Some(idx_name), Some(col)) = (row.get(0), row.get(1)) else {
                continue;
            };
            if !by_name.contains_key(idx_name) {
                order.push(idx_name.to_string());
            }
            by_name.entry(idx_name.to_string()).or_default().push(col.to_string());
        }
        Ok(order
            .into_iter()
            .map(|name| {
                let columns = by_name.remove(&name).unwrap_or_default();
                UniqueIndex { name, columns }
            })
            .collect())
    }

    fn read_references(&mut self, table: &str) -> Result<Vec<Reference>> {
        let sql = format!(
            "SELECT confrelid::regclass::text AS referenced_table, \
                    a.attname AS local_column, af.attname AS referenced_column \
             FROM pg_constraint c \
             JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = ANY(c.conkey) \
             JOIN pg_attribute af ON af.attrelid = c.confrelid AND af.attnum = ANY(c.confkey) \
             WHERE c.conrelid = {}::regclass AND c.contype = 'f' \
             ORDER BY c.conname, array_position(c.conkey, a.attnum)",
            crate::quote_literal(table)
        );
        let rows = self.db.query_text(&sql)?;
        let mut by_table: Vec<(String, Vec<(String, String)>)> = Vec::new();
        for row in &rows {
            let (Some(rt), Some(local), Some(remote)) = (row.get(0), row.get(1), row.get(2))
            else {
                continue;
            };
            match by_table.iter_mut().find(|(t, _)| t == rt) {
                Some((_, pairs)) => pairs.push((local.to_string(), remote.to_string())),
                None => by_table.push((rt.to_string(), vec![(local.to_string(), remote.to_string())])),
            }
        }
        Ok(by_table
            .into_iter()
            .map(|(referenced_table, column_pairs)| Reference {
                referenced_table,
                column_pairs,
            })
            .collect())
    }
}

/// Pick the unique index used for conflict resolution and natural-key
/// substitution. A single candidate wins outright; otherwise the index with
/// the fewest columns wins, ties broken by index name so the choice is
/// stable across runs and servers.
fn elect_main_unique_index(unique_indexes: &[UniqueIndex]) -> Option<usize> {
    if unique_indexes.len() == 1 {
        return Some(0);
    }
    unique_indexes
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.columns.len().cmp(&b.columns.len()).then_with(|| a.name.cmp(&b.name)))
        .map(|(idx, _)| idx)
}
