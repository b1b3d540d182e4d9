//! Import-side orchestration: version manifest checks, blob-tree copies,
//! running the exported SQL against the target, and asking the target to
//! resync configuration files on disk afterward.
//!
//! Mirrors `cmd/import.go`'s `runImport`: check versions match, copy any
//! package/image files, run the SQL, then resync config channels if the
//! import included any.

pub mod blobs;
pub mod rpc;
pub mod version;

use crate::db::Database;
use crate::error::{Error, Result};
use rpc::ConfigFileSync;
use std::path::Path;
use version::ImportManifest;

/// What an `import` invocation was asked to do.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub import_dir: std::path::PathBuf,
    pub package_destination: String,
    pub image_destination: String,
}

impl Default for ImportRequest {
    fn default() -> Self {
        Self {
            import_dir: std::path::PathBuf::from("."),
            package_destination: "/var/spacewalk/packages/".to_string(),
            image_destination: "/srv/www/os-images".to_string(),
        }
    }
}

/// Run a full import: validate the version manifest, copy blob trees,
/// apply `sql_statements.sql`, then resync config files if the export
/// included any configuration channels.
pub fn run_import<D: Database>(db: &mut D, rpc: &mut impl ConfigFileSync, server: &ImportManifest, request: &ImportRequest) -> Result<()> {
    let manifest = ImportManifest::read(&request.import_dir)?;
    manifest.ensure_matches(server)?;

    let sql_path = request.import_dir.join("sql_statements.sql");
    if !sql_path.is_file() {
        return Err(Error::Other(format!("no sql_statements.sql found in {}", request.import_dir.display())));
    }

    blobs::sync_package_files(&request.import_dir, &request.package_destination)?;
    if blobs::has_image_pillars(&request.import_dir) {
        tracing::info!("image pillar files present; import them through the pillar-aware path");
    }
    blobs::sync_image_files(&request.import_dir, &request.image_destination)?;

    apply_sql_file(db, &sql_path)?;

    if let Some(labels) = read_exported_config_labels(&request.import_dir)? {
        if let Err(err) = rpc.sync_config_files(&labels) {
            tracing::error!(
                error = %err,
                "error recreating configuration files; run spacecmd api configchannel.syncSaltFilesOnDisk manually for: {}",
                labels.join(", ")
            );
        }
    }

    Ok(())
}

/// Run `sql_statements.sql` as a single simple-query batch. String literals
/// in emitted statements (an errata summary, a package description,
/// `rhnconfigcontent.contents`) can hold a bare `;`, so the file must be
/// handed to the server's own statement parser rather than split on `;`
/// client-side.
fn apply_sql_file<D: Database>(db: &mut D, path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)?;
    db.execute_batch(&contents)
}

fn read_exported_config_labels(import_dir: &Path) -> Result<Option<Vec<String>>> {
    let path = import_dir.join("exportedConfigs.txt");
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(Some(contents.lines().map(str::to_string).filter(|l| !l.is_empty()).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockDatabase;
    use rpc::NullConfigSync;

    fn write_manifest(dir: &Path, version: &str, product: &str) {
        std::fs::write(dir.join("version.txt"), format!("version = {version}\nproduct_name = {product}\n")).unwrap();
    }

    #[test]
    fn rejects_mismatched_server_version() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "4.3.0", "Uyuni");
        std::fs::write(dir.path().join("sql_statements.sql"), "BEGIN;\nCOMMIT;\n").unwrap();

        let request = ImportRequest { import_dir: dir.path().to_path_buf(), ..ImportRequest::default() };
        let server = ImportManifest { product_name: "Uyuni".to_string(), version: "4.4.0".to_string() };
        let mut db = MockDatabase::default();
        let mut rpc = NullConfigSync;

        let result = run_import(&mut db, &mut rpc, &server, &request);
        assert!(result.is_err());
    }

    #[test]
    fn missing_sql_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "4.3.0", "Uyuni");

        let request = ImportRequest { import_dir: dir.path().to_path_buf(), ..ImportRequest::default() };
        let server = ImportManifest { product_name: "Uyuni".to_string(), version: "4.3.0".to_string() };
        let mut db = MockDatabase::default();
        let mut rpc = NullConfigSync;

        let result = run_import(&mut db, &mut rpc, &server, &request);
        assert!(result.is_err());
    }

    #[test]
    fn applies_the_sql_file_as_a_single_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "4.3.0", "Uyuni");
        std::fs::write(
            dir.path().join("sql_statements.sql"),
            "BEGIN;\nINSERT INTO rhnerrata (summary) VALUES ('contains a ; semicolon');\nCOMMIT;\n",
        )
        .unwrap();

        let request = ImportRequest { import_dir: dir.path().to_path_buf(), ..ImportRequest::default() };
        let server = ImportManifest { product_name: "Uyuni".to_string(), version: "4.3.0".to_string() };
        let mut db = MockDatabase::default();
        db.expect_batch();
        let mut rpc = NullConfigSync;

        run_import(&mut db, &mut rpc, &server, &request).unwrap();
        assert!(db.expectations_met());
    }
}
