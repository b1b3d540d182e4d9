//! Orchestrates a full export run: schema introspection, crawling,
//! substitution and statement emission, tied together the way
//! `DumpAllEntities`/`DumpChannelData`/`processConfigChannel` did in the
//! original dumper — products first, then each requested software channel,
//! then each requested configuration channel, wrapped in a single
//! transaction.

use crate::crawler::{Crawler, DataDumper, TableKey};
use crate::db::Database;
use crate::emitter::{self, postorder};
use crate::error::{Error, Result};
use crate::schema::{self, Schema, Table};
use crate::substitution::Substitutor;
use crate::sync::version::ImportManifest;
use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What an `export` invocation was asked to do; assembled from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub channels: Vec<String>,
    pub config_labels: Vec<String>,
    pub output_dir: PathBuf,
    pub metadata_only: bool,
    pub os_images: bool,
    pub containers: bool,
    pub starting_date: Option<String>,
    /// This server's own product identity, stamped into `version.txt` so a
    /// later import can refuse to apply the script against a mismatched
    /// target (see [`crate::sync::version`]).
    pub server: ImportManifest,
}

/// Run a full export: opens `sql_statements.sql` in `output_dir`, wraps the
/// whole run in `BEGIN;`/`COMMIT;`, and writes products, channels,
/// configuration channels and image metadata in that order. Blob-tree
/// export (package/image files themselves) is handled out of band by the
/// `sync` module and is not part of the SQL statement stream.
pub fn run_export<D: Database>(db: &mut D, request: &ExportRequest) -> Result<()> {
    std::fs::create_dir_all(&request.output_dir)
        .map_err(|source| Error::OutputCreateFailed { path: request.output_dir.clone(), source })?;

    request.server.write(&request.output_dir)?;

    let starting_date = request
        .starting_date
        .as_deref()
        .map(parse_starting_date)
        .transpose()?;

    let sql_path = request.output_dir.join("sql_statements.sql");
    let file = std::fs::File::create(&sql_path)
        .map_err(|source| Error::OutputCreateFailed { path: sql_path.clone(), source })?;
    let mut writer = std::io::BufWriter::new(file);

    writeln!(writer, "BEGIN;")?;

    if !request.channels.is_empty() {
        let products_schema = Schema { tables: schema::SchemaReader::new(db).read_tables(&schema::products_table_names())? };
        export_products(db, &products_schema, &mut writer)?;

        let channel_schema = Schema { tables: schema::SchemaReader::new(db).read_tables(&schema::software_channel_table_names())? };
        for label in &request.channels {
            export_channel(db, &channel_schema, label, &mut writer, starting_date.as_deref())?;
        }
    }

    if !request.config_labels.is_empty() {
        let config_schema = Schema { tables: schema::SchemaReader::new(db).read_tables(&schema::config_channel_table_names())? };
        let mut exported = Vec::with_capacity(request.config_labels.len());
        for label in &request.config_labels {
            export_config_channel(db, &config_schema, label, &mut writer)?;
            exported.push(label.clone());
        }
        write_exported_configs_list(&request.output_dir, &exported)?;
    }

    if request.os_images || request.containers {
        let image_schema = Schema { tables: schema::SchemaReader::new(db).read_tables(&schema::image_table_names())? };
        if request.os_images {
            export_images(db, &image_schema, schema::OS_IMAGE_TYPE, &mut writer)?;
        }
        if request.containers {
            export_images(db, &image_schema, schema::CONTAINER_IMAGE_TYPE, &mut writer)?;
        }
    }

    writeln!(writer, "COMMIT;")?;
    writer.flush()?;
    Ok(())
}

/// Parse and re-render `--startingDate` as the RFC 3339 form Postgres
/// accepts in a `timestamp with time zone` comparison, rejecting the
/// request early rather than failing mid-crawl on a malformed predicate.
fn parse_starting_date(raw: &str) -> Result<String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_rfc3339())
        .map_err(|e| Error::Other(format!("--startingDate '{raw}' is not a valid ISO-8601 timestamp: {e}")))
}

fn write_exported_configs_list(output_dir: &Path, labels: &[String]) -> Result<()> {
    let path = output_dir.join("exportedConfigs.txt");
    let file = std::fs::File::create(&path).map_err(|source| Error::OutputCreateFailed { path: path.clone(), source })?;
    let mut writer = std::io::BufWriter::new(file);
    for label in labels {
        writeln!(writer, "{label}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Carried once, ahead of any channel: channel families and product
/// metadata, filtered to rows with no owning organization (`org_id IS
/// NULL`) on tables that track one, matching the original's
/// `whereFilterClause`.
fn export_products<D: Database, W: Write>(db: &mut D, schema: &Schema, writer: &mut W) -> Result<()> {
    let Some(root) = schema.get("suseproducts") else {
        return Ok(());
    };
    let seeds = seed_keys(db, root, "org_id IS NULL")?;
    emit_crawl(db, schema, root, seeds, writer, None)
}

/// Crawl and emit one software channel by label, then prune the cleanable
/// tables scoped to it. `starting_date`, if set, restricts the errata
/// carried along with the channel to those issued on or after that instant.
fn export_channel<D: Database, W: Write>(
    db: &mut D,
    schema: &Schema,
    label: &str,
    writer: &mut W,
    starting_date: Option<&str>,
) -> Result<()> {
    tracing::info!(channel = label, "exporting software channel");
    let Some(root) = schema.get("rhnchannel") else {
        return Err(Error::TableNotFound("rhnchannel".to_string()));
    };
    let where_clause = format!("label = {}", crate::quote_literal(label));
    let seeds = seed_keys(db, root, &where_clause)?;
    if seeds.is_empty() {
        return Err(Error::EntityNotFound { table: "rhnchannel".to_string(), label: label.to_string() });
    }
    let clean_where = format!(
        "WHERE rhnchannel.id = (SELECT id FROM rhnchannel WHERE label = {})",
        crate::quote_literal(label)
    );

    let mut dumper = DataDumper::default();
    for seed in seeds {
        let mut crawler = Crawler::new(db, schema);
        if let Some(date) = starting_date {
            crawler = crawler.with_date_filter("rhnerrata", format!("modified >= {}", crate::quote_literal(date)));
        }
        dumper.merge(crawler.crawl(&root.name, seed)?);
    }
    tracing::debug!(channel = label, tables = dumper.table_data.len(), "crawl complete");
    emit_dumper(db, schema, &dumper, writer, Some(&clean_where))
}

/// Crawl and emit every image row of the given `image_type` (OS/kiwi images
/// or container images, selected by [`schema::OS_IMAGE_TYPE`] /
/// [`schema::CONTAINER_IMAGE_TYPE`]). Images have no per-run scoping label
/// the way channels do — every image of the requested kind is carried, the
/// same "carry everything of this kind" treatment `export_products` gives
/// channel families.
fn export_images<D: Database, W: Write>(db: &mut D, schema: &Schema, image_type: &str, writer: &mut W) -> Result<()> {
    tracing::info!(image_type, "exporting images");
    let Some(root) = schema.get("suseimageinfo") else {
        return Ok(());
    };
    let where_clause = format!("image_type = {}", crate::quote_literal(image_type));
    let seeds = seed_keys(db, root, &where_clause)?;
    emit_crawl(db, schema, root, seeds, writer, None)
}

/// Crawl and emit one configuration channel by label, followed by the
/// `rhnconfigfile.latest_config_revision_id` backfill pass.
fn export_config_channel<D: Database, W: Write>(db: &mut D, schema: &Schema, label: &str, writer: &mut W) -> Result<()> {
    tracing::info!(config_channel = label, "exporting configuration channel");
    let Some(root) = schema.get("rhnconfigchannel") else {
        return Err(Error::TableNotFound("rhnconfigchannel".to_string()));
    };
    let where_clause = format!("label = {}", crate::quote_literal(label));
    let seeds = seed_keys(db, root, &where_clause)?;
    if seeds.is_empty() {
        return Err(Error::EntityNotFound { table: "rhnconfigchannel".to_string(), label: label.to_string() });
    }

    let mut dumper = DataDumper::default();
    for seed in seeds {
        let mut crawler = Crawler::new(db, schema);
        dumper.merge(crawler.crawl(&root.name, seed)?);
    }

    emit_dumper(db, schema, &dumper, writer, None)?;

    for statement in postorder::backfill_latest_config_revision(db, schema, &dumper)? {
        writeln!(writer, "{statement}")?;
    }
    Ok(())
}

fn seed_keys<D: Database>(db: &mut D, table: &Table, where_clause: &str) -> Result<Vec<TableKey>> {
    let pk_cols = table.primary_key.join(", ");
    let sql = format!("SELECT {pk_cols} FROM {} WHERE {where_clause}", table.name);
    let rows = db.query_text(&sql)?;
    Ok(rows
        .into_iter()
        .map(|row| TableKey {
            table: table.name.clone(),
            pk_values: row.values.into_iter().map(Option::unwrap_or_default).collect(),
        })
        .collect())
}

fn emit_crawl<D: Database, W: Write>(
    db: &mut D,
    schema: &Schema,
    root: &Table,
    seeds: Vec<TableKey>,
    writer: &mut W,
    clean_where_clause: Option<&str>,
) -> Result<()> {
    let mut dumper = DataDumper::default();
    for seed in seeds {
        let mut crawler = Crawler::new(db, schema);
        dumper.merge(crawler.crawl(&root.name, seed)?);
    }
    emit_dumper(db, schema, &dumper, writer, clean_where_clause)
}

/// Walk every table touched by a crawl in dependency order (parents before
/// children, derived from each table's outbound references) and emit its
/// rows, routing cleanable tables through the clean-and-prune statement
/// shape instead of plain upserts.
fn emit_dumper<D: Database, W: Write>(
    db: &mut D,
    schema: &Schema,
    dumper: &DataDumper,
    writer: &mut W,
    clean_where_clause: Option<&str>,
) -> Result<()> {
    for table_name in emission_order(schema, dumper) {
        let Some(table) = schema.get(&table_name) else { continue };
        let keys = dumper.keys_for(&table_name);

        let is_cleanable = clean_where_clause.is_some() && schema::CLEANABLE_CHANNEL_TABLES.contains(&table_name.as_str());
        tracing::debug!(table = %table_name, rows = keys.len(), cleanable = is_cleanable, "emitting table");

        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let mut substitutor = Substitutor::new(db, schema);
            if let Some(mut row) = substitutor.load_row(table, key)? {
                emitter::filter_row_data(table, &mut row);
                rows.push(row);
            }
        }

        if is_cleanable {
            let clean_where = clean_where_clause.unwrap();
            let path = shortest_reference_path(schema, &table_name, clean_root(clean_where)).unwrap_or_else(|| vec![table_name.clone()]);
            let existing_query = emitter::build_existing_records_query(schema, &path, table, clean_where);
            if rows.is_empty() {
                writeln!(writer, "{}", emitter::generate_clear_empty_table(table, &existing_query))?;
            } else {
                writeln!(writer, "{}", emitter::generate_insert_with_clean(table, &rows, &existing_query))?;
            }
        } else {
            for row in &rows {
                writeln!(writer, "{}", emitter::generate_insert_statement(table, row))?;
            }
        }
    }
    Ok(())
}

/// The root table a clean-where-clause is scoped to, e.g. `rhnchannel` for
/// `WHERE rhnchannel.id = (...)`. Cheap string scan rather than a parsed
/// clause since the clause is always one we generated ourselves.
fn clean_root(clean_where_clause: &str) -> &str {
    clean_where_clause
        .trim_start_matches("WHERE ")
        .split('.')
        .next()
        .unwrap_or(clean_where_clause)
}

/// Orders the tables a crawl touched so that every table appears after all
/// tables it references (parents before children), falling back to
/// discovery order for tables with no ordering constraint between them.
fn emission_order(schema: &Schema, dumper: &DataDumper) -> Vec<String> {
    let present: HashSet<&str> = dumper.table_data.keys().map(String::as_str).collect();
    let mut ordered = Vec::with_capacity(present.len());
    let mut placed = HashSet::new();

    fn visit(schema: &Schema, table_name: &str, present: &HashSet<&str>, placed: &mut HashSet<String>, ordered: &mut Vec<String>) {
        if placed.contains(table_name) {
            return;
        }
        placed.insert(table_name.to_string());
        if let Some(table) = schema.get(table_name) {
            for reference in &table.references {
                if present.contains(reference.referenced_table.as_str()) {
                    visit(schema, &reference.referenced_table, present, placed, ordered);
                }
            }
        }
        ordered.push(table_name.to_string());
    }

    for table_name in dumper.table_data.keys() {
        visit(schema, table_name, &present, &mut placed, &mut ordered);
    }
    ordered
}

/// Shortest path (by foreign-key hops, either direction) from `from` to
/// `to`, used to build the join clause that scopes a clean pass. A plain
/// breadth-first search over the reference graph; the schemas this tool
/// targets are shallow enough that this always terminates quickly.
fn shortest_reference_path(schema: &Schema, from: &str, to: &str) -> Option<Vec<String>> {
    if from == to {
        return Some(vec![from.to_string()]);
    }
    let mut queue = VecDeque::new();
    let mut came_from = std::collections::HashMap::new();
    queue.push_back(from.to_string());
    came_from.insert(from.to_string(), None::<String>);

    while let Some(current) = queue.pop_front() {
        if current == to {
            let mut path = vec![current.clone()];
            let mut cursor = current;
            while let Some(Some(prev)) = came_from.get(&cursor) {
                path.push(prev.clone());
                cursor = prev.clone();
            }
            path.reverse();
            return Some(path);
        }
        for neighbor in neighbors(schema, &current) {
            if !came_from.contains_key(&neighbor) {
                came_from.insert(neighbor.clone(), Some(current.clone()));
                queue.push_back(neighbor);
            }
        }
    }
    None
}

fn neighbors(schema: &Schema, table_name: &str) -> Vec<String> {
    let mut result = Vec::new();
    if let Some(table) = schema.get(table_name) {
        result.extend(table.references.iter().map(|r| r.referenced_table.clone()));
    }
    for table in schema.tables.values() {
        if table.references.iter().any(|r| r.referenced_table == table_name) {
            result.push(table.name.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Reference, UniqueIndex};

    fn table(name: &str, references: Vec<Reference>) -> Table {
        Table {
            name: name.to_string(),
            columns: vec![Column { name: "id".to_string(), data_type: "numeric".to_string(), nullable: false }],
            primary_key: vec!["id".to_string()],
            sequence: None,
            unique_indexes: vec![UniqueIndex { name: "uq".to_string(), columns: vec!["id".to_string()] }],
            main_unique_index: Some(0),
            references,
            unexported_columns: vec![],
            only_if_parent_exists: false,
        }
    }

    fn reference(to: &str) -> Reference {
        Reference { referenced_table: to.to_string(), column_pairs: vec![("id".to_string(), "id".to_string())] }
    }

    #[test]
    fn emission_order_places_parents_before_children() {
        let mut schema = Schema::default();
        schema.tables.insert("rhnchannel".to_string(), table("rhnchannel", vec![]));
        schema.tables.insert("rhnchannelpackage".to_string(), table("rhnchannelpackage", vec![reference("rhnchannel")]));

        let mut dumper = DataDumper::default();
        dumper.table_data.insert("rhnchannelpackage".to_string(), vec![]);
        dumper.table_data.insert("rhnchannel".to_string(), vec![]);

        let order = emission_order(&schema, &dumper);
        let channel_pos = order.iter().position(|t| t == "rhnchannel").unwrap();
        let package_pos = order.iter().position(|t| t == "rhnchannelpackage").unwrap();
        assert!(channel_pos < package_pos);
    }

    #[test]
    fn shortest_path_follows_either_direction() {
        let mut schema = Schema::default();
        schema.tables.insert("rhnchannel".to_string(), table("rhnchannel", vec![]));
        schema.tables.insert("rhnchannelpackage".to_string(), table("rhnchannelpackage", vec![reference("rhnchannel")]));

        let path = shortest_reference_path(&schema, "rhnchannelpackage", "rhnchannel").unwrap();
        assert_eq!(path, vec!["rhnchannelpackage".to_string(), "rhnchannel".to_string()]);
    }

    #[test]
    fn clean_root_extracts_table_name() {
        assert_eq!(clean_root("WHERE rhnchannel.id = (SELECT id FROM rhnchannel WHERE label = 'base')"), "rhnchannel");
    }
}
