//! Reads and validates the `version.txt` manifest an export directory
//! carries, so an import refuses to run against statements generated by a
//! different product or version than the target server runs.

use crate::error::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportManifest {
    pub product_name: String,
    pub version: String,
}

impl ImportManifest {
    /// Parse `<import_dir>/version.txt`, a flat `key = value` file written
    /// by the export side. Both `version` and `product_name` keys are
    /// required; their absence means the export directory is incomplete
    /// rather than merely old.
    pub fn read(import_dir: &Path) -> Result<Self> {
        let path = import_dir.join("version.txt");
        let contents = std::fs::read_to_string(&path)?;

        let version = scan_key(&contents, "version")
            .ok_or_else(|| Error::ManifestIncomplete { path: path.clone(), key: "version".to_string() })?;
        let product_name = scan_key(&contents, "product_name")
            .ok_or_else(|| Error::ManifestIncomplete { path: path.clone(), key: "product_name".to_string() })?;

        Ok(Self { product_name, version })
    }

    /// Write a manifest out, mirroring the format [`Self::read`] expects.
    pub fn write(&self, output_dir: &Path) -> Result<()> {
        let path = output_dir.join("version.txt");
        let contents = format!("version = {}\nproduct_name = {}\n", self.version, self.product_name);
        std::fs::write(&path, contents).map_err(|source| Error::OutputCreateFailed { path, source })
    }

    /// Compare against the importing server's own product/version, the
    /// check `runImport` performed before touching any data.
    pub fn ensure_matches(&self, server: &ImportManifest) -> Result<()> {
        if self.version != server.version || self.product_name != server.product_name {
            return Err(Error::VersionMismatch {
                import_product: self.product_name.clone(),
                import_version: self.version.clone(),
                server_product: server.product_name.clone(),
                server_version: server.version.clone(),
            });
        }
        Ok(())
    }
}

/// Find the first `key = value` line and return the trimmed value. Lines
/// are matched by exact key rather than a full parser since the manifest
/// format this tool writes and reads is always this flat two-line shape.
fn scan_key(contents: &str, key: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let (found_key, value) = line.split_once('=')?;
        (found_key.trim() == key).then(|| value.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_version_and_product() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("version.txt"), "version = 4.3.0\nproduct_name = Uyuni\n").unwrap();
        let manifest = ImportManifest::read(dir.path()).unwrap();
        assert_eq!(manifest.version, "4.3.0");
        assert_eq!(manifest.product_name, "Uyuni");
    }

    #[test]
    fn missing_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("version.txt"), "version = 4.3.0\n").unwrap();
        let result = ImportManifest::read(dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn mismatched_manifests_are_rejected() {
        let a = ImportManifest { product_name: "Uyuni".to_string(), version: "4.3.0".to_string() };
        let b = ImportManifest { product_name: "Uyuni".to_string(), version: "4.4.0".to_string() };
        assert!(a.ensure_matches(&b).is_err());
    }
}
