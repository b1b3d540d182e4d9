//! Catalog introspection: reads tables, columns, unique indexes and foreign
//! keys from `information_schema`/`pg_catalog`, then applies the table-filter
//! overlay so downstream components see a corrected, export-ready schema.

mod overlay;
mod reader;
mod tables;

pub use overlay::apply_table_filters;
pub use reader::SchemaReader;
pub use tables::{
    config_channel_table_names, image_table_names, products_table_names,
    software_channel_table_names, CLEANABLE_CHANNEL_TABLES, CONTAINER_IMAGE_TYPE,
    OS_IMAGE_TYPE, VIRTUAL_INDEX_NAME,
};

use std::collections::HashMap;

/// A column as read from the catalog.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    /// Postgres `data_type` / `udt_name`, e.g. "numeric", "timestamp with time zone".
    pub data_type: String,
    pub nullable: bool,
}

/// A unique index (or the synthesized "virtual" index the overlay installs
/// for tables whose natural key isn't backed by a real Postgres index).
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    pub name: String,
    pub columns: Vec<String>,
}

/// A foreign key from this table to another table.
#[derive(Debug, Clone)]
pub struct Reference {
    pub referenced_table: String,
    /// (local column, referenced column) pairs, in key order.
    pub column_pairs: Vec<(String, String)>,
}

/// A table, after the filter overlay has been applied.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    /// Name of the sequence backing the primary key, if any (overlay may
    /// assign one the catalog doesn't report directly, e.g. an `id_seq`
    /// shared with a parent table).
    pub sequence: Option<String>,
    pub unique_indexes: Vec<UniqueIndex>,
    /// Index into `unique_indexes` of the index used for natural-key
    /// substitution. `None` means the table is only ever reached by
    /// primary key (e.g. it is never referenced, or is parent-exists-only).
    pub main_unique_index: Option<usize>,
    pub references: Vec<Reference>,
    /// Columns dropped from INSERT/output entirely (overlay mark).
    pub unexported_columns: Vec<String>,
    /// This table is only inserted when its natural-key-matching parent row
    /// already exists on the target (no row is ever synthesized for it).
    pub only_if_parent_exists: bool,
}

impl Table {
    #[must_use]
    pub fn main_unique_index(&self) -> Option<&UniqueIndex> {
        self.main_unique_index.map(|i| &self.unique_indexes[i])
    }

    #[must_use]
    pub fn is_exported(&self, column: &str) -> bool {
        !self.unexported_columns.iter().any(|c| c == column)
    }
}

/// The full introspected and filtered schema, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub tables: HashMap<String, Table>,
}

impl Schema {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn require(&self, name: &str) -> crate::error::Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| crate::error::Error::TableNotFound(name.to_string()))
    }
}
