//! Data Crawler: follows the foreign-key graph outward from a seed row,
//! visiting parents (outbound references) before the row itself, then
//! children (inbound references) subject to [`should_follow_reference_to_link`].
//!
//! Simplifying assumption (recorded in the grounding ledger): every foreign
//! key in this schema targets the referenced table's primary key, so a row's
//! identity during crawling can be represented as just its primary-key
//! values rather than the full column set of whichever unique index a
//! particular reference happens to use.

use crate::db::{Database, TextRow};
use crate::error::Result;
use crate::schema::{Reference, Schema, Table};
use std::collections::{HashMap, HashSet};

/// Identifies one row by table name plus primary-key values, in the order
/// of `table.primary_key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub table: String,
    pub pk_values: Vec<String>,
}

/// The set of rows discovered by a crawl, grouped by table.
///
/// Consumed by the substitution engine and statement emitter to fetch and
/// rewrite each row in turn.
#[derive(Debug, Default, Clone)]
pub struct DataDumper {
    pub table_data: HashMap<String, Vec<TableKey>>,
}

impl DataDumper {
    #[must_use]
    pub fn keys_for(&self, table: &str) -> &[TableKey] {
        self.table_data.get(table).map_or(&[], Vec::as_slice)
    }

    pub fn merge(&mut self, other: DataDumper) {
        for (table, mut keys) in other.table_data {
            self.table_data.entry(table).or_default().append(&mut keys);
        }
    }
}

/// Crawls the foreign-key graph of a [`Schema`] against a live [`Database`].
pub struct Crawler<'a, D: Database> {
    db: &'a mut D,
    schema: &'a Schema,
    /// When set, an extra SQL predicate applied when fetching child keys of
    /// the named table — backs `--startingDate`, which scopes a channel
    /// export to errata (and, transitively, their packages) issued on or
    /// after a given timestamp rather than the channel's entire history.
    date_filter: Option<(String, String)>,
}

impl<'a, D: Database> Crawler<'a, D> {
    pub fn new(db: &'a mut D, schema: &'a Schema) -> Self {
        Self { db, schema, date_filter: None }
    }

    /// Restrict rows fetched for `table` during inbound (child) traversal to
    /// those additionally matching `predicate`, e.g. `("rhnerrata",
    /// "modified >= '2024-01-01T00:00:00+00:00'")`.
    #[must_use]
    pub fn with_date_filter(mut self, table: impl Into<String>, predicate: impl Into<String>) -> Self {
        self.date_filter = Some((table.into(), predicate.into()));
        self
    }

    /// Crawl starting from a single seed row, typically the channel, config
    /// channel or image row an export command was pointed at.
    pub fn crawl(&mut self, table: &str, seed: TableKey) -> Result<DataDumper> {
        let mut dumper = DataDumper::default();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        self.visit(table, seed, &mut path, &mut visited, &mut dumper)?;
        Ok(dumper)
    }

    fn visit(
        &mut self,
        table_name: &str,
        key: TableKey,
        path: &mut Vec<String>,
        visited: &mut HashSet<(String, TableKey)>,
        dumper: &mut DataDumper,
    ) -> Result<()> {
        let visit_id = (table_name.to_string(), key.clone());
        if visited.contains(&visit_id) {
            return Ok(());
        }
        visited.insert(visit_id);

        let Some(table) = self.schema.get(table_name).cloned() else {
            return Ok(());
        };
        let Some(row) = self.fetch_row(&table, &key)? else {
            return Ok(());
        };

        path.push(table_name.to_string());

        // Outbound: visit parents before recording this row, so the
        // statement emitter can later emit parents first.
        for reference in &table.references {
            if let Some(parent) = self.schema.get(&reference.referenced_table) {
                if let Some(parent_key) = resolve_parent_key(&table, &row, reference, parent) {
                    self.visit(&reference.referenced_table, parent_key, path, visited, dumper)?;
                }
            }
        }

        dumper.table_data.entry(table_name.to_string()).or_default().push(key.clone());

        // Inbound: children referencing this row.
        for (child_name, reference) in self.children_of(table_name) {
            if !should_follow_reference_to_link(path, table_name, &child_name) {
                continue;
            }
            let Some(child_table) = self.schema.get(&child_name) else {
                continue;
            };
            for child_key in self.fetch_child_keys(&table, &row, child_table, &reference)? {
                self.visit(&child_name, child_key, path, visited, dumper)?;
            }
        }

        path.pop();
        Ok(())
    }

    fn children_of(&self, table_name: &str) -> Vec<(String, Reference)> {
        self.schema
            .tables
            .values()
            .filter_map(|t| {
                t.references
                    .iter()
                    .find(|r| r.referenced_table == table_name)
                    .map(|r| (t.name.clone(), r.clone()))
            })
            .collect()
    }

    fn fetch_row(&mut self, table: &Table, key: &TableKey) -> Result<Option<TextRow>> {
        let where_clause = table
            .primary_key
            .iter()
            .zip(&key.pk_values)
            .map(|(col, val)| format!("{col} = {}", crate::quote_literal(val)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let columns = table
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {columns} FROM {} WHERE {where_clause}", table.name);
        Ok(self.db.query_text(&sql)?.into_iter().next())
    }

    fn fetch_child_keys(
        &mut self,
        table: &Table,
        row: &TextRow,
        child: &Table,
        reference: &Reference,
    ) -> Result<Vec<TableKey>> {
        let mut wheres = Vec::new();
        for (local_col, remote_col) in &reference.column_pairs {
            let Some(value) = column_value(table, row, remote_col) else {
                return Ok(vec![]);
            };
            wheres.push(format!("{local_col} = {}", crate::quote_literal(&value)));
        }
        if let Some((filtered_table, predicate)) = &self.date_filter {
            if filtered_table == &child.name {
                wheres.push(predicate.clone());
            }
        }
        let pk_cols = child.primary_key.join(", ");
        let sql = format!(
            "SELECT {pk_cols} FROM {} WHERE {}",
            child.name,
            wheres.join(" AND ")
        );
        let rows = self.db.query_text(&sql)?;
        Ok(rows
            .into_iter()
            .map(|r| TableKey {
                table: child.name.clone(),
                pk_values: r.values.into_iter().map(Option::unwrap_or_default).collect(),
            })
            .collect())
    }
}

fn column_value(table: &Table, row: &TextRow, column: &str) -> Option<String> {
    let idx = table.columns.iter().position(|c| c.name == column)?;
    row.get(idx).map(str::to_string)
}

fn resolve_parent_key(table: &Table, row: &TextRow, reference: &Reference, parent: &Table) -> Option<TableKey> {
    let mut values = Vec::with_capacity(parent.primary_key.len());
    for pk_col in &parent.primary_key {
        let (local_col, _) = reference.column_pairs.iter().find(|(_, remote)| remote == pk_col)?;
        values.push(column_value(table, row, local_col)?);
    }
    Some(TableKey {
        table: parent.name.clone(),
        pk_values: values,
    })
}

/// A link-table's inbound edge is followed only when doing so would not
/// immediately reverse the edge the crawler just traversed to reach
/// `current` — i.e. `child` is not the table directly preceding `current`
/// on the current path. Combined with the global visited set, this breaks
/// cycles through pure join tables without pruning legitimate fan-out.
#[must_use]
pub fn should_follow_reference_to_link(path: &[String], _current: &str, child: &str) -> bool {
    match path.len().checked_sub(2) {
        Some(idx) => path.get(idx).is_none_or(|prev| prev != child),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_immediately_reverse_last_edge() {
        let path = vec!["rhnconfigrevision".to_string(), "rhnconfigfile".to_string()];
        assert!(!should_follow_reference_to_link(&path, "rhnconfigfile", "rhnconfigrevision"));
    }

    #[test]
    fn allows_fan_out_to_other_children() {
        let path = vec!["rhnconfigrevision".to_string(), "rhnconfigfile".to_string()];
        assert!(should_follow_reference_to_link(&path, "rhnconfigfile", "rhnserverconfigchannel"));
    }

    #[test]
    fn allows_following_at_path_start() {
        let path = vec!["rhnchannel".to_string()];
        assert!(should_follow_reference_to_link(&path, "rhnchannel", "rhnchannelpackage"));
    }

    #[test]
    fn date_filter_is_appended_to_child_fetch() {
        use crate::db::mock::MockDatabase;
        use crate::schema::{Column, Reference, Table, UniqueIndex};

        let mut schema = Schema::default();
        schema.tables.insert(
            "rhnchannel".to_string(),
            Table {
                name: "rhnchannel".to_string(),
                columns: vec![Column { name: "id".to_string(), data_type: "numeric".to_string(), nullable: false }],
                primary_key: vec!["id".to_string()],
                sequence: None,
                unique_indexes: vec![UniqueIndex { name: "uq".to_string(), columns: vec!["id".to_string()] }],
                main_unique_index: Some(0),
                references: vec![],
                unexported_columns: vec![],
                only_if_parent_exists: false,
            },
        );
        schema.tables.insert(
            "rhnerrata".to_string(),
            Table {
                name: "rhnerrata".to_string(),
                columns: vec![
                    Column { name: "id".to_string(), data_type: "numeric".to_string(), nullable: false },
                    Column { name: "channel_id".to_string(), data_type: "numeric".to_string(), nullable: false },
                ],
                primary_key: vec!["id".to_string()],
                sequence: None,
                unique_indexes: vec![UniqueIndex { name: "uq".to_string(), columns: vec!["id".to_string()] }],
                main_unique_index: Some(0),
                references: vec![Reference {
                    referenced_table: "rhnchannel".to_string(),
                    column_pairs: vec![("channel_id".to_string(), "id".to_string())],
                }],
                unexported_columns: vec![],
                only_if_parent_exists: false,
            },
        );

        let mut db = MockDatabase::new();
        db.expect_query(vec![vec![Some("1")]]); // fetch_row for rhnchannel seed
        db.expect_query(vec![vec![Some("9")]]); // fetch_child_keys for rhnerrata
        db.expect_query(vec![vec![Some("9"), Some("1")]]); // fetch_row for rhnerrata row

        let mut crawler = Crawler::new(&mut db, &schema)
            .with_date_filter("rhnerrata", "modified >= '2024-01-01T00:00:00+00:00'");
        let seed = TableKey { table: "rhnchannel".to_string(), pk_values: vec!["1".to_string()] };
        crawler.crawl("rhnchannel", seed).unwrap();

        let child_fetch_sql = &db.executed[1];
        assert!(child_fetch_sql.contains("modified >= '2024-01-01T00:00:00+00:00'"));
    }
}
