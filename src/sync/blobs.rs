//! Blob-tree copies: package and image files live on disk, not in the
//! database, and move between servers via `rsync` rather than SQL. These
//! wrappers shell out the same way the original tool did, rather than
//! reimplementing rsync's permission/ownership handling in Rust.

use crate::error::Result;
use std::path::Path;
use std::process::Command;

/// Copy `<export_dir>/packages/` into the target server's package tree,
/// preserving group ownership the way the original's `-og --chown` flags
/// did. A missing `packages/` directory is not an error: channels with no
/// binary packages (e.g. source-only or metadata-only exports) never
/// produce one.
pub fn sync_package_files(export_dir: &Path, destination: &str) -> Result<()> {
    let source = export_dir.join("packages");
    if !source.is_dir() {
        tracing::info!("no package files to import");
        return Ok(());
    }
    run_rsync(&[
        "-og",
        "--chown=wwwrun:www",
        "-r",
        &format!("{}/", source.display()),
        destination,
    ])
}

/// Copy `<export_dir>/images/` into the target server's OS image tree,
/// excluding `pillars/` (handled separately by [`sync_image_pillars`]
/// since pillar data also needs a database-side registration step, not
/// just a file copy).
pub fn sync_image_files(export_dir: &Path, destination: &str) -> Result<()> {
    let source = export_dir.join("images");
    if !source.is_dir() {
        tracing::info!("no image files to import");
        return Ok(());
    }
    run_rsync(&[
        "-og",
        "--chown=salt:susemanager",
        "--chmod=Du=rwx,Dgo=rx,Fu=rw,Fgo=r",
        "-r",
        "--exclude=pillars",
        &format!("{}/", source.display()),
        destination,
    ])
}

/// Whether `<export_dir>/images/pillars/` exists and should be imported
/// through the pillar-specific path rather than a plain file copy.
#[must_use]
pub fn has_image_pillars(export_dir: &Path) -> bool {
    export_dir.join("images").join("pillars").is_dir()
}

fn run_rsync(args: &[&str]) -> Result<()> {
    let status = Command::new("rsync").args(args).status()?;
    if !status.success() {
        return Err(crate::error::Error::Other(format!(
            "rsync exited with status {}",
            status.code().map_or_else(|| "unknown".to_string(), |c| c.to_string())
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_packages_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sync_package_files(dir.path(), "/tmp/does-not-matter").is_ok());
    }

    #[test]
    fn detects_absence_of_pillars() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        assert!(!has_image_pillars(dir.path()));
    }
}
