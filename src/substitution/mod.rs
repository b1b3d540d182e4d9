//! Key-Substitution Engine: rewrites a fetched row's primary key into a
//! `nextval(...)` call and each foreign key into a natural-key `SELECT`
//! subquery against the target's main unique index, so the emitted
//! statement is portable to a server whose surrogate ids differ entirely
//! from the source's.

use crate::crawler::TableKey;
use crate::db::{Database, TextRow};
use crate::error::Result;
use crate::schema::{Reference, Schema, Table};
use crate::value::{Cell, Row};
use std::collections::HashMap;

/// How deep [`Substitutor`] will recurse into a natural-key column that is
/// itself a foreign key before giving up and falling back to a literal.
/// Bounds runaway recursion on a pathological reference cycle; every chain
/// in this schema bottoms out in 2-3 hops.
const MAX_NATURAL_KEY_DEPTH: usize = 8;

/// Rewrites rows in place, memoizing foreign-key subqueries it has already
/// computed for a given `(table, predicate)` pair across the whole export —
/// the original tool's cache existed because the same organization/channel
/// family/arch rows are referenced by thousands of package rows.
pub struct Substitutor<'a, D: Database> {
    db: &'a mut D,
    schema: &'a Schema,
    cache: HashMap<String, String>,
}

impl<'a, D: Database> Substitutor<'a, D> {
    pub fn new(db: &'a mut D, schema: &'a Schema) -> Self {
        Self { db, schema, cache: HashMap::new() }
    }

    /// Fetch the row identified by `key` and apply primary-key and
    /// foreign-key substitution. Returns `None` if the row no longer exists
    /// (deleted between crawl and emission).
    pub fn load_row(&mut self, table: &Table, key: &TableKey) -> Result<Option<Row>> {
        let Some(text_row) = self.fetch_row(table, key)? else {
            return Ok(None);
        };
        let mut row = build_row(table, &text_row);
        substitute_primary_key(table, &mut row);
        for reference in &table.references {
            self.substitute_foreign_key(table, &mut row, reference)?;
        }
        Ok(Some(row))
    }

    fn fetch_row(&mut self, table: &Table, key: &TableKey) -> Result<Option<TextRow>> {
        let where_clause = table
            .primary_key
            .iter()
            .zip(&key.pk_values)
            .map(|(col, val)| format!("{col} = {}", crate::quote_literal(val)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let columns = column_list(table);
        let sql = format!("SELECT {columns} FROM {} WHERE {where_clause}", table.name);
        Ok(self.db.query_text(&sql)?.into_iter().next())
    }

    /// Rewrite `reference`'s local column(s) in `row` into a natural-key
    /// subquery against the referenced table, unless the current value is
    /// NULL (e.g. `rhnchannel.org_id` for a vendor channel) or already a
    /// raw SQL fragment from an earlier substitution pass.
    fn substitute_foreign_key(&mut self, table: &Table, row: &mut Row, reference: &Reference) -> Result<()> {
        let Ok(foreign_table) = self.schema.require(&reference.referenced_table).cloned() else {
            return Ok(());
        };
        let Some(main_index) = foreign_table.main_unique_index().cloned() else {
            return Ok(());
        };

        let mut lookup_wheres = Vec::new();
        for (local_col, foreign_col) in &reference.column_pairs {
            match row.get(local_col) {
                Some(Cell::Text(val)) => {
                    lookup_wheres.push(format!("{foreign_col} = {}", crate::quote_literal(val)));
                }
                _ => return Ok(()), // NULL, or already substituted: leave untouched
            }
        }
        let lookup_where = lookup_wheres.join(" AND ");
        let cache_key = format!("{}::{lookup_where}", foreign_table.name);

        let subquery = if let Some(cached) = self.cache.get(&cache_key).cloned() {
            cached
        } else {
            let columns = column_list(&foreign_table);
            let sql = format!("SELECT {columns} FROM {} WHERE {lookup_where}", foreign_table.name);
            let Some(foreign_row) = self.db.query_text(&sql)?.into_iter().next() else {
                tracing::debug!(
                    table = %table.name,
                    foreign_table = %foreign_table.name,
                    "foreign key does not resolve to an existing row; keeping source value literally"
                );
                return Ok(()); // FK doesn't resolve to an existing row: leave the literal value
            };

            let predicate = self.natural_key_predicate(&foreign_table, &foreign_row, &main_index.columns, 0)?;
            let foreign_col = reference.column_pairs[0].1.as_str();
            let subquery = format!("SELECT {foreign_col} FROM {} WHERE {predicate} LIMIT 1", foreign_table.name);
            self.cache.insert(cache_key, subquery.clone());
            subquery
        };

        for (local_col, _) in &reference.column_pairs {
            row.set(local_col, Cell::Sql(subquery.clone()));
        }
        Ok(())
    }

    /// Build a `col = value AND col = value ...` predicate over
    /// `columns` of `row` (a fetched row of `table`), recursing into any
    /// column that is itself a foreign key so the predicate stays valid on
    /// a server where that column's surrogate value differs too.
    fn natural_key_predicate(
        &mut self,
        table: &Table,
        row: &TextRow,
        columns: &[String],
        depth: usize,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            let Some(idx) = table.columns.iter().position(|c| &c.name == column) else {
                continue;
            };
            let value = row.get(idx);

            let Some(value) = value else {
                parts.push(format!("{column} IS NULL"));
                continue;
            };

            if depth < MAX_NATURAL_KEY_DEPTH {
                if let Some(reference) = table.references.iter().find(|r| r.column_pairs.iter().any(|(l, _)| l == column)) {
                    if let Ok(expr) = self.nested_column_subquery(table, row, reference, column, depth + 1) {
                        parts.push(format!("{column} = {expr}"));
                        continue;
                    }
                }
            }

            let data_type = table.columns[idx].data_type.as_str();
            parts.push(format!("{column} = {}", crate::value::literal_for_type(data_type, value)));
        }
        Ok(parts.join(" AND "))
    }

    fn nested_column_subquery(
        &mut self,
        table: &Table,
        row: &TextRow,
        reference: &Reference,
        column: &str,
        depth: usize,
    ) -> Result<String> {
        let Ok(foreign_table) = self.schema.require(&reference.referenced_table).cloned() else {
            return Ok(column.to_string());
        };
        let Some(main_index) = foreign_table.main_unique_index().cloned() else {
            return Ok(column.to_string());
        };
        let Some(idx) = table.columns.iter().position(|c| c.name == column) else {
            return Ok(column.to_string());
        };
        let Some(value) = row.get(idx) else {
            return Ok("NULL".to_string());
        };

        let (_, foreign_col) = reference
            .column_pairs
            .iter()
            .find(|(l, _)| l == column)
            .expect("reference covers column");
        let columns = column_list(&foreign_table);
        let sql = format!(
            "SELECT {columns} FROM {} WHERE {foreign_col} = {}",
            foreign_table.name,
            crate::quote_literal(value)
        );
        let Some(foreign_row) = self.db.query_text(&sql)?.into_iter().next() else {
            return Ok(crate::quote_literal(value));
        };

        let predicate = self.natural_key_predicate(&foreign_table, &foreign_row, &main_index.columns, depth)?;
        Ok(format!(
            "(SELECT {foreign_col} FROM {} WHERE {predicate} LIMIT 1)",
            foreign_table.name
        ))
    }
}

fn column_list(table: &Table) -> String {
    table.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>().join(", ")
}

fn build_row(table: &Table, text_row: &TextRow) -> Row {
    let mut row = Row {
        columns: table.columns.iter().map(|c| c.name.clone()).collect(),
        cells: HashMap::with_capacity(table.columns.len()),
    };
    for (idx, column) in table.columns.iter().enumerate() {
        row.set(&column.name, Cell::from_text(text_row.get(idx)));
    }
    row
}

/// Rewrite the primary key's `id` column into `nextval('<sequence>')`, when
/// the table has a known sequence. Composite or non-`id` primary keys (link
/// tables) are left as-is — their identity is the natural key itself.
fn substitute_primary_key(table: &Table, row: &mut Row) {
    if let Some(sequence) = &table.sequence {
        if table.primary_key.iter().any(|c| c == "id") {
            row.set("id", Cell::Sql(format!("SELECT nextval('{sequence}')")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockDatabase;
    use crate::schema::{Column, UniqueIndex};

    fn numeric_col(name: &str) -> Column {
        Column { name: name.to_string(), data_type: "numeric".to_string(), nullable: false }
    }
    fn text_col(name: &str) -> Column {
        Column { name: name.to_string(), data_type: "character varying".to_string(), nullable: true }
    }

    fn org_table() -> Table {
        Table {
            name: "rhnorg".to_string(),
            columns: vec![numeric_col("id"), text_col("name")],
            primary_key: vec!["id".to_string()],
            sequence: Some("rhn_org_id_seq".to_string()),
            unique_indexes: vec![UniqueIndex { name: "rhn_org_name_uq".to_string(), columns: vec!["name".to_string()] }],
            main_unique_index: Some(0),
            references: vec![],
            unexported_columns: vec![],
            only_if_parent_exists: false,
        }
    }

    fn channel_table() -> Table {
        Table {
            name: "rhnchannel".to_string(),
            columns: vec![numeric_col("id"), text_col("label"), numeric_col("org_id")],
            primary_key: vec!["id".to_string()],
            sequence: Some("rhn_channel_id_seq".to_string()),
            unique_indexes: vec![UniqueIndex { name: "rhn_channel_label_uq".to_string(), columns: vec!["label".to_string()] }],
            main_unique_index: Some(0),
            references: vec![Reference {
                referenced_table: "rhnorg".to_string(),
                column_pairs: vec![("org_id".to_string(), "id".to_string())],
            }],
            unexported_columns: vec![],
            only_if_parent_exists: false,
        }
    }

    #[test]
    fn rewrites_primary_key_to_nextval() {
        let table = channel_table();
        let mut db = MockDatabase::new();
        db.expect_query(vec![vec![Some("42"), Some("base"), Some("7")]]);
        db.expect_query(vec![vec![Some("7"), Some("ACME")]]);

        let mut schema = Schema::default();
        schema.tables.insert("rhnorg".to_string(), org_table());
        schema.tables.insert("rhnchannel".to_string(), table.clone());

        let mut sub = Substitutor::new(&mut db, &schema);
        let key = TableKey { table: "rhnchannel".to_string(), pk_values: vec!["42".to_string()] };
        let row = sub.load_row(&table, &key).unwrap().unwrap();

        assert_eq!(row.get("id"), Some(&Cell::Sql("SELECT nextval('rhn_channel_id_seq')".to_string())));
    }

    #[test]
    fn rewrites_foreign_key_to_natural_key_subquery() {
        let table = channel_table();
        let mut db = MockDatabase::new();
        db.expect_query(vec![vec![Some("42"), Some("base"), Some("7")]]);
        db.expect_query(vec![vec![Some("7"), Some("ACME")]]);

        let mut schema = Schema::default();
        schema.tables.insert("rhnorg".to_string(), org_table());
        schema.tables.insert("rhnchannel".to_string(), table.clone());

        let mut sub = Substitutor::new(&mut db, &schema);
        let key = TableKey { table: "rhnchannel".to_string(), pk_values: vec!["42".to_string()] };
        let row = sub.load_row(&table, &key).unwrap().unwrap();

        match row.get("org_id") {
            Some(Cell::Sql(sql)) => {
                assert!(sql.contains("FROM rhnorg"));
                assert!(sql.contains("name = 'ACME'"));
            }
            other => panic!("expected rewritten org_id subquery, got {other:?}"),
        }
    }

    #[test]
    fn leaves_null_foreign_key_untouched() {
        let table = channel_table();
        let mut db = MockDatabase::new();
        db.expect_query(vec![vec![Some("42"), Some("base"), None]]);

        let mut schema = Schema::default();
        schema.tables.insert("rhnorg".to_string(), org_table());
        schema.tables.insert("rhnchannel".to_string(), table.clone());

        let mut sub = Substitutor::new(&mut db, &schema);
        let key = TableKey { table: "rhnchannel".to_string(), pk_values: vec!["42".to_string()] };
        let row = sub.load_row(&table, &key).unwrap().unwrap();

        assert_eq!(row.get("org_id"), Some(&Cell::Null));
    }
}
