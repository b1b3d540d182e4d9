//! Statement Emitter: turns substituted rows into SQL text.
//!
//! Four statement shapes, matching the original dispatch:
//! (a) plain `INSERT ... ON CONFLICT ... DO UPDATE` for ordinary tables;
//! (b) `INSERT ... SELECT ... WHERE NOT EXISTS (...)` for tables keyed by a
//!     virtual (synthesized) unique index, which Postgres has no real
//!     constraint to drive `ON CONFLICT` from;
//! (c) the same `WHERE NOT EXISTS` shape with an additional
//!     parent-existence guard, for `only_if_parent_exists` tables;
//! (d) the clean-table form, a `WITH new_records AS (INSERT ... RETURNING),
//!     existing_records AS (...) DELETE ... EXCEPT ALL` statement that
//!     prunes rows the source no longer has.

pub mod postorder;

use crate::schema::{Schema, Table};
use crate::value::{Cell, Row, format_cell};

/// Render the column list for an INSERT, honoring unexported columns.
fn column_list(table: &Table) -> String {
    table
        .columns
        .iter()
        .filter(|c| table.is_exported(&c.name))
        .map(|c| c.name.clone())
        .collect::<Vec<_>>()
        .join(", ")
}

fn formatted_values(table: &Table, row: &Row) -> String {
    table
        .columns
        .iter()
        .filter(|c| table.is_exported(&c.name))
        .map(|c| {
            row.get(&c.name)
                .map_or_else(|| "null".to_string(), |cell| format_cell(cell, &c.data_type))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The `ON CONFLICT` clause for ordinary (non-virtual-index) tables.
///
/// A handful of tables need conflict targets the catalog can't express as a
/// single named constraint (a partial unique index keyed on whether a
/// nullable column is present, or a `DO NOTHING` table with no meaningful
/// column to update). Those are special-cased here; everything else
/// conflicts on its main unique index and overwrites every non-key column.
fn on_conflict_clause(table: &Table, row: &Row) -> String {
    match table.name.as_str() {
        "rhnerrataseverity" => "(id) DO UPDATE SET label = excluded.label".to_string(),
        "rhnerrata" => {
            if matches!(row.get("org_id"), Some(Cell::Null) | None) {
                format!("(advisory) WHERE org_id IS NULL DO UPDATE SET {}", column_assignments(table))
            } else {
                format!(
                    "(advisory, org_id) WHERE org_id IS NOT NULL DO UPDATE SET {}",
                    column_assignments(table)
                )
            }
        }
        "rhnpackageevr" => {
            if matches!(row.get("epoch"), Some(Cell::Null) | None) {
                "(version, release, ((evr).type)) WHERE epoch IS NULL DO NOTHING".to_string()
            } else {
                "(version, release, epoch, ((evr).type)) WHERE epoch IS NOT NULL DO NOTHING".to_string()
            }
        }
        "rhnpackagecapability" => {
            if matches!(row.get("version"), Some(Cell::Null) | None) {
                "(name) WHERE version IS NULL DO NOTHING".to_string()
            } else {
                "(name, version) WHERE version IS NOT NULL DO NOTHING".to_string()
            }
        }
        _ => {
            let columns = table
                .main_unique_index()
                .map(|idx| idx.columns.join(", "))
                .unwrap_or_default();
            format!("({columns}) DO UPDATE SET {}", column_assignments(table))
        }
    }
}

fn column_assignments(table: &Table) -> String {
    table
        .columns
        .iter()
        .filter(|c| !table.primary_key.contains(&c.name) && table.is_exported(&c.name))
        .map(|c| format!("{name} = excluded.{name}", name = c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether `table` is keyed by a synthesized (not catalog-backed) unique
/// index, which forces the `WHERE NOT EXISTS` insert shape instead of
/// `ON CONFLICT`.
fn uses_virtual_index(table: &Table) -> bool {
    table
        .main_unique_index()
        .is_some_and(|idx| idx.name == crate::schema::VIRTUAL_INDEX_NAME)
}

/// Emit the INSERT statement for a single row (shapes (a)-(c)).
#[must_use]
pub fn generate_insert_statement(table: &Table, row: &Row) -> String {
    let columns = column_list(table);
    let values = formatted_values(table, row);

    if uses_virtual_index(table) || table.only_if_parent_exists {
        let Some(index) = table.main_unique_index() else {
            return format!("-- skipped: {} has no main unique index", table.name);
        };
        let mut where_clauses = Vec::new();
        let mut parent_exists_clauses = Vec::new();
        for column in &index.columns {
            match row.get(column) {
                Some(Cell::Null) | None => where_clauses.push(format!("{column} IS NULL")),
                Some(cell) => {
                    let data_type = table
                        .columns
                        .iter()
                        .find(|c| &c.name == column)
                        .map_or("text", |c| c.data_type.as_str());
                    let formatted = format_cell(cell, data_type);
                    where_clauses.push(format!("{column} = {formatted}"));
                    if matches!(cell, Cell::Sql(_)) {
                        parent_exists_clauses.push(format!("exists {formatted}"));
                    }
                }
            }
        }
        let where_clause = where_clauses.join(" and ");

        if table.only_if_parent_exists {
            if parent_exists_clauses.is_empty() {
                return format!(
                    "INSERT INTO {table} ({columns}) SELECT {values} WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE {where_clause});",
                    table = table.name
                );
            }
            let parent_clause = parent_exists_clauses.join(" and ");
            return format!(
                "INSERT INTO {table} ({columns}) SELECT {values} WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE {where_clause}) AND {parent_clause};",
                table = table.name
            );
        }
        return format!(
            "INSERT INTO {table} ({columns}) SELECT {values} WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE {where_clause});",
            table = table.name
        );
    }

    let on_conflict = on_conflict_clause(table, row);
    format!(
        "INSERT INTO {table} ({columns}) VALUES ({values}) ON CONFLICT {on_conflict};",
        table = table.name
    )
}

/// Emit the clean-table form (shape (d)) for a batch of rows belonging to
/// the same table, plus the join path used to scope which existing rows
/// are candidates for deletion.
#[must_use]
pub fn generate_insert_with_clean(table: &Table, rows: &[Row], existing_records_query: &str) -> String {
    let columns = column_list(table);
    let value_tuples = rows
        .iter()
        .map(|row| format!("({})", formatted_values(table, row)))
        .collect::<Vec<_>>()
        .join(", ");

    let on_conflict = rows.first().map_or_else(String::new, |row| on_conflict_clause(table, row));
    let main_unique_columns = table
        .main_unique_index()
        .map(|idx| idx.columns.join(", "))
        .unwrap_or_default();

    let insert_part = format!(
        "INSERT INTO {name} ({columns}) VALUES {value_tuples} ON CONFLICT {on_conflict} RETURNING {main_unique_columns}",
        name = table.name
    );

    format!(
        "WITH new_records_{name} AS ({insert_part}), existing_records_{name} AS ({existing_records_query}) \
         DELETE FROM {name} WHERE ({main_unique_columns}) IN (SELECT * FROM existing_records_{name} EXCEPT ALL SELECT * FROM new_records_{name});",
        name = table.name
    )
}

/// Emit the pure-prune statement for a cleanable table that had no source
/// rows at all (shape (d) degenerate case: nothing to insert, only delete).
#[must_use]
pub fn generate_clear_empty_table(table: &Table, existing_records_query: &str) -> String {
    let main_unique_columns = table
        .main_unique_index()
        .map(|idx| idx.columns.join(", "))
        .unwrap_or_default();
    format!(
        "DELETE FROM {name} WHERE ({main_unique_columns}) IN ({existing_records_query});",
        name = table.name
    )
}

/// Build the `SELECT <main unique columns> FROM <table> <joins> <where>`
/// query used to find rows a clean pass should consider for deletion,
/// scoped down to the crawl path that reached `table` (e.g. a single
/// channel's package set rather than every package row on the server).
#[must_use]
pub fn build_existing_records_query(schema: &Schema, path: &[String], table: &Table, clean_where_clause: &str) -> String {
    let main_unique_columns = table
        .main_unique_index()
        .map(|idx| {
            idx.columns
                .iter()
                .map(|c| format!("{}.{c}", table.name))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    let joins = get_joins_clause(schema, path);
    format!("SELECT {main_unique_columns} FROM {} {joins} {clean_where_clause}", table.name)
}

/// Walk `path` back-to-front, joining each table to the next on whichever
/// side holds the foreign key between them (a table can be reached either
/// by following one of its own outbound references or by another table's
/// inbound reference to it).
fn get_joins_clause(schema: &Schema, path: &[String]) -> String {
    let mut reverse_path = path.to_vec();
    reverse_path.reverse();

    let mut result = String::new();
    for pair in reverse_path.windows(2) {
        let [first_table, second_table] = pair else { continue };
        let Some(first) = schema.get(first_table) else { continue };

        if let Some(pairs) = referenced_by(schema, first_table, second_table) {
            for (key, value) in pairs {
                result.push_str(&format!(" INNER JOIN {second_table} ON {second_table}.{value} = {first_table}.{key}"));
            }
        } else if let Some(pairs) = find_relation_info(&first.references, second_table) {
            for (key, value) in pairs {
                result.push_str(&format!(" INNER JOIN {second_table} ON {second_table}.{key} = {first_table}.{value}"));
            }
        }
    }
    result
}

/// The column-pair mapping of another table's reference to `table_name`,
/// i.e. the reverse of [`Table::references`] — "who points at me".
fn referenced_by(schema: &Schema, table_name: &str, referencing_table: &str) -> Option<Vec<(String, String)>> {
    let referencing = schema.get(referencing_table)?;
    find_relation_info(&referencing.references, table_name)
}

fn find_relation_info(references: &[crate::schema::Reference], table_to_find: &str) -> Option<Vec<(String, String)>> {
    references
        .iter()
        .find(|r| r.referenced_table == table_to_find)
        .map(|r| r.column_pairs.clone())
}

/// Drop the overlay's unexported columns from a row before it is emitted.
pub fn filter_row_data(table: &Table, row: &mut Row) {
    for unexported in &table.unexported_columns {
        row.cells.remove(unexported);
    }
    row.columns.retain(|c| table.is_exported(c));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, UniqueIndex};

    fn numeric(name: &str) -> Column {
        Column { name: name.to_string(), data_type: "numeric".to_string(), nullable: false }
    }

    fn plain_table() -> Table {
        Table {
            name: "rhnchannelfamily".to_string(),
            columns: vec![numeric("id"), Column { name: "label".to_string(), data_type: "character varying".to_string(), nullable: false }],
            primary_key: vec!["id".to_string()],
            sequence: Some("rhn_channel_family_id_seq".to_string()),
            unique_indexes: vec![UniqueIndex { name: "rhn_channelfamily_label_uq".to_string(), columns: vec!["label".to_string()] }],
            main_unique_index: Some(0),
            references: vec![],
            unexported_columns: vec![],
            only_if_parent_exists: false,
        }
    }

    fn virtual_table() -> Table {
        Table {
            name: "rhnpackage".to_string(),
            columns: vec![numeric("id"), numeric("name_id"), numeric("evr_id")],
            primary_key: vec!["id".to_string()],
            sequence: Some("RHN_PACKAGE_ID_SEQ".to_string()),
            unique_indexes: vec![UniqueIndex {
                name: crate::schema::VIRTUAL_INDEX_NAME.to_string(),
                columns: vec!["name_id".to_string(), "evr_id".to_string()],
            }],
            main_unique_index: Some(0),
            references: vec![],
            unexported_columns: vec![],
            only_if_parent_exists: false,
        }
    }

    fn row_with(pairs: &[(&str, Cell)]) -> Row {
        let mut row = Row::default();
        for (col, cell) in pairs {
            row.columns.push((*col).to_string());
            row.set(col, cell.clone());
        }
        row
    }

    #[test]
    fn plain_table_gets_on_conflict_upsert() {
        let table = plain_table();
        let row = row_with(&[
            ("id", Cell::Sql("SELECT nextval('rhn_channel_family_id_seq')".to_string())),
            ("label", Cell::Text("base".to_string())),
        ]);
        let sql = generate_insert_statement(&table, &row);
        assert!(sql.starts_with("INSERT INTO rhnchannelfamily (id, label) VALUES"));
        assert!(sql.contains("ON CONFLICT (label) DO UPDATE SET label = excluded.label"));
    }

    #[test]
    fn virtual_index_table_gets_where_not_exists() {
        let table = virtual_table();
        let row = row_with(&[
            ("id", Cell::Sql("SELECT nextval('RHN_PACKAGE_ID_SEQ')".to_string())),
            ("name_id", Cell::Text("5".to_string())),
            ("evr_id", Cell::Text("9".to_string())),
        ]);
        let sql = generate_insert_statement(&table, &row);
        assert!(sql.contains("WHERE NOT EXISTS (SELECT 1 FROM rhnpackage WHERE name_id = 5 and evr_id = 9)"));
    }

    #[test]
    fn package_evr_conflict_depends_on_epoch_nullness() {
        let mut table = plain_table();
        table.name = "rhnpackageevr".to_string();
        let row_with_epoch = row_with(&[("epoch", Cell::Text("1".to_string()))]);
        let row_without_epoch = row_with(&[("epoch", Cell::Null)]);
        assert!(on_conflict_clause(&table, &row_with_epoch).contains("epoch IS NOT NULL DO NOTHING"));
        assert!(on_conflict_clause(&table, &row_without_epoch).contains("epoch IS NULL DO NOTHING"));
    }
}
