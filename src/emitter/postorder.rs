//! The post-order backfill for `rhnconfigfile.latest_config_revision_id`.
//!
//! `rhnconfigfile` and `rhnconfigrevision` reference each other: a revision
//! points back at its owning file, and a file points forward at its latest
//! revision. Inserting both tables in one pass would need the revision row
//! to exist before the file row can reference it, but the crawl and main
//! emission order the other way around (file before its revisions). Rather
//! than reorder the whole emission, the forward link is backfilled in a
//! second pass once every file and revision row has already been inserted.

use crate::crawler::{DataDumper, TableKey};
use crate::db::Database;
use crate::error::Result;
use crate::schema::Schema;
use crate::substitution::Substitutor;

const BATCH_SIZE: usize = 100;

/// Emit `UPDATE rhnconfigfile SET latest_config_revision_id = (...)`
/// statements for every `rhnconfigfile` row the crawl discovered, batching
/// row fetches so a config channel with many files doesn't hold them all in
/// memory at once.
pub fn backfill_latest_config_revision<D: Database>(
    db: &mut D,
    schema: &Schema,
    dumper: &DataDumper,
) -> Result<Vec<String>> {
    let Some(table) = schema.get("rhnconfigfile") else {
        return Ok(vec![]);
    };
    let keys = dumper.keys_for("rhnconfigfile");
    if keys.is_empty() {
        return Ok(vec![]);
    }

    let mut statements = Vec::new();
    for batch in keys.chunks(BATCH_SIZE) {
        for key in batch {
            if let Some(statement) = backfill_one(db, schema, table, key)? {
                statements.push(statement);
            }
        }
    }
    Ok(statements)
}

fn backfill_one<D: Database>(
    db: &mut D,
    schema: &Schema,
    table: &crate::schema::Table,
    key: &TableKey,
) -> Result<Option<String>> {
    let mut substitutor = Substitutor::new(db, schema);
    let Some(row) = substitutor.load_row(table, key)? else {
        return Ok(None);
    };

    let (Some(latest_revision), Some(file_name), Some(channel)) = (
        row.get("latest_config_revision_id"),
        row.get("config_file_name_id"),
        row.get("config_channel_id"),
    ) else {
        return Ok(None);
    };

    let latest_revision = crate::value::format_cell(latest_revision, "numeric");
    let file_name = crate::value::format_cell(file_name, "numeric");
    let channel = crate::value::format_cell(channel, "numeric");

    Ok(Some(format!(
        "UPDATE rhnconfigfile SET latest_config_revision_id = ({}) WHERE config_file_name_id = ({}) AND config_channel_id = ({});",
        strip_parens(&latest_revision),
        strip_parens(&file_name),
        strip_parens(&channel),
    )))
}

/// `format_cell` parenthesizes `Sql` cells so they nest safely inside a
/// larger expression; here the cell is the entire parenthesized group
/// already, so strip one layer back off to match the original's bare
/// subquery placement.
fn strip_parens(formatted: &str) -> &str {
    formatted
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockDatabase;
    use crate::schema::{Column, Table, UniqueIndex};

    fn config_file_table() -> Table {
        Table {
            name: "rhnconfigfile".to_string(),
            columns: vec![
                Column { name: "id".to_string(), data_type: "numeric".to_string(), nullable: false },
                Column { name: "config_file_name_id".to_string(), data_type: "numeric".to_string(), nullable: false },
                Column { name: "config_channel_id".to_string(), data_type: "numeric".to_string(), nullable: false },
                Column { name: "latest_config_revision_id".to_string(), data_type: "numeric".to_string(), nullable: true },
            ],
            primary_key: vec!["id".to_string()],
            sequence: Some("rhn_confdatafiles_id_seq".to_string()),
            unique_indexes: vec![UniqueIndex {
                name: "rhn_cfgfile_ncc_uq".to_string(),
                columns: vec!["config_file_name_id".to_string(), "config_channel_id".to_string()],
            }],
            main_unique_index: Some(0),
            references: vec![],
            unexported_columns: vec![],
            only_if_parent_exists: false,
        }
    }

    #[test]
    fn emits_update_for_each_config_file() {
        let mut schema = Schema::default();
        schema.tables.insert("rhnconfigfile".to_string(), config_file_table());

        let mut dumper = DataDumper::default();
        dumper.table_data.insert(
            "rhnconfigfile".to_string(),
            vec![TableKey { table: "rhnconfigfile".to_string(), pk_values: vec!["42".to_string()] }],
        );

        let mut db = MockDatabase::default();
        db.expect_query(vec![vec![Some("42"), Some("7"), Some("3"), Some("99")]]);

        let statements = backfill_latest_config_revision(&mut db, &schema, &dumper).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("UPDATE rhnconfigfile SET latest_config_revision_id = (99)"));
        assert!(statements[0].contains("config_file_name_id = (7)"));
        assert!(statements[0].contains("config_channel_id = (3)"));
    }

    #[test]
    fn no_config_files_emits_nothing() {
        let mut schema = Schema::default();
        schema.tables.insert("rhnconfigfile".to_string(), config_file_table());
        let dumper = DataDumper::default();
        let mut db = MockDatabase::default();

        let statements = backfill_latest_config_revision(&mut db, &schema, &dumper).unwrap();
        assert!(statements.is_empty());
    }
}
