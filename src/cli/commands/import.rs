//! `import` command implementation.

use crate::cli::ImportArgs;
use crate::db::PgDatabase;
use crate::error::Result;
use crate::sync::rpc::{ConfigFileSync, NullConfigSync, XmlRpcConfigSync};
use crate::sync::{self, ImportRequest};
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct ImportSummary<'a> {
    import_dir: String,
    product_name: &'a str,
    version: &'a str,
}

/// Execute the import command: connect to the target server and run
/// [`sync::run_import`] against the requested import directory.
///
/// # Errors
///
/// Returns an error if the connection fails, the version manifest doesn't
/// match this server, or the import pipeline fails.
pub fn execute(
    args: &ImportArgs,
    target_db_url: Option<&str>,
    product_name: Option<&str>,
    product_version: Option<&str>,
    json: bool,
) -> Result<()> {
    let url = crate::config::resolve_target_db_url(target_db_url);
    let server = crate::config::resolve_server_version(product_name, product_version);

    let request = ImportRequest {
        import_dir: args.import_dir.clone(),
        ..ImportRequest::default()
    };

    if crate::is_dry_run() {
        tracing::info!(
            import_dir = %request.import_dir.display(),
            product_name = %server.product_name,
            version = %server.version,
            "dry run: would validate version.txt and apply sql_statements.sql without touching the database"
        );
    } else {
        let mut db = PgDatabase::connect(&url)?;
        let endpoint = std::env::var("ESYNC_XMLRPC_ENDPOINT").ok();
        let mut xml_rpc_sync;
        let mut null_sync;
        let rpc: &mut dyn ConfigFileSync = if let Some(endpoint) = endpoint {
            xml_rpc_sync = XmlRpcConfigSync::new(endpoint, &args.xml_rpc_user, &args.xml_rpc_password);
            &mut xml_rpc_sync
        } else {
            null_sync = NullConfigSync;
            &mut null_sync
        };
        sync::run_import(&mut db, rpc, &server, &request)?;
    }

    if json {
        let summary = ImportSummary {
            import_dir: request.import_dir.display().to_string(),
            product_name: &server.product_name,
            version: &server.version,
        };
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{} {}", "Import applied from".green(), request.import_dir.display());
    }

    Ok(())
}
