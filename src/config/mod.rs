//! Server connection resolution.
//!
//! A run always talks to a source server (the one being exported from) and,
//! for imports, a target server too. Each connection string is resolved the
//! same way: an explicit CLI flag wins, then an environment variable, then a
//! fixed local default aimed at a standard Uyuni/SUSE Manager install.

use std::path::PathBuf;

/// Default connection string for a server running on the local host.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/susemanager";

/// Resolve the source server's connection string.
///
/// Priority:
/// 1. `--db-url` flag
/// 2. `ESYNC_DATABASE_URL` environment variable
/// 3. [`DEFAULT_DATABASE_URL`]
#[must_use]
pub fn resolve_source_db_url(explicit: Option<&str>) -> String {
    resolve_db_url(explicit, "ESYNC_DATABASE_URL")
}

/// Resolve the target server's connection string (import only).
///
/// Priority:
/// 1. `--target-db-url` flag
/// 2. `ESYNC_TARGET_DATABASE_URL` environment variable
/// 3. [`DEFAULT_DATABASE_URL`]
#[must_use]
pub fn resolve_target_db_url(explicit: Option<&str>) -> String {
    resolve_db_url(explicit, "ESYNC_TARGET_DATABASE_URL")
}

fn resolve_db_url(explicit: Option<&str>, env_var: &str) -> String {
    if let Some(url) = explicit {
        return url.to_string();
    }
    if let Ok(url) = std::env::var(env_var) {
        if !url.trim().is_empty() {
            return url;
        }
    }
    DEFAULT_DATABASE_URL.to_string()
}

/// Resolve the directory an export run should write into, defaulting to
/// the current directory when the CLI didn't specify one.
#[must_use]
pub fn resolve_output_dir(explicit: Option<&std::path::Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf)
}

/// Default product identity reported by this server when nothing else is
/// configured. Reading the real value means parsing the server's own
/// product/version manifest files, which is out of scope for this crate
/// (see [`crate::sync::version`]) — so, like the database connection
/// string, it is resolved from explicit configuration rather than
/// introspected from disk.
pub const DEFAULT_PRODUCT_NAME: &str = "Uyuni";
pub const DEFAULT_PRODUCT_VERSION: &str = "unknown";

/// Resolve the local server's own product identity, used both to stamp an
/// export's `version.txt` and to validate an import against it.
///
/// Priority:
/// 1. `--product-name`/`--product-version` flags
/// 2. `ESYNC_PRODUCT_NAME`/`ESYNC_PRODUCT_VERSION` environment variables
/// 3. [`DEFAULT_PRODUCT_NAME`]/[`DEFAULT_PRODUCT_VERSION`]
#[must_use]
pub fn resolve_server_version(
    explicit_name: Option<&str>,
    explicit_version: Option<&str>,
) -> crate::sync::version::ImportManifest {
    let product_name = explicit_name.map(ToString::to_string).unwrap_or_else(|| {
        std::env::var("ESYNC_PRODUCT_NAME").unwrap_or_else(|_| DEFAULT_PRODUCT_NAME.to_string())
    });
    let version = explicit_version.map(ToString::to_string).unwrap_or_else(|| {
        std::env::var("ESYNC_PRODUCT_VERSION").unwrap_or_else(|_| DEFAULT_PRODUCT_VERSION.to_string())
    });
    crate::sync::version::ImportManifest { product_name, version }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins_over_default() {
        assert_eq!(resolve_source_db_url(Some("postgresql://example/db")), "postgresql://example/db");
    }

    #[test]
    fn falls_back_to_default_when_nothing_set() {
        std::env::remove_var("ESYNC_DATABASE_URL");
        assert_eq!(resolve_source_db_url(None), DEFAULT_DATABASE_URL);
    }

    #[test]
    fn resolve_output_dir_defaults_to_cwd() {
        assert_eq!(resolve_output_dir(None), PathBuf::from("."));
    }

    #[test]
    fn server_version_explicit_flags_win() {
        let manifest = resolve_server_version(Some("Uyuni"), Some("2024.07"));
        assert_eq!(manifest.product_name, "Uyuni");
        assert_eq!(manifest.version, "2024.07");
    }

    #[test]
    fn server_version_falls_back_to_defaults() {
        std::env::remove_var("ESYNC_PRODUCT_NAME");
        std::env::remove_var("ESYNC_PRODUCT_VERSION");
        let manifest = resolve_server_version(None, None);
        assert_eq!(manifest.product_name, DEFAULT_PRODUCT_NAME);
        assert_eq!(manifest.version, DEFAULT_PRODUCT_VERSION);
    }
}
