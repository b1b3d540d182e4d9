//! `export` command implementation.

use crate::cli::ExportArgs;
use crate::db::PgDatabase;
use crate::error::Result;
use crate::pipeline::{self, ExportRequest};
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct ExportSummary<'a> {
    output_dir: String,
    channels: &'a [String],
    config_labels: &'a [String],
}

/// Execute the export command: connect to the source server and run
/// [`pipeline::run_export`] against the requested channels/config channels.
///
/// # Errors
///
/// Returns an error if the connection fails or the export pipeline fails.
pub fn execute(args: &ExportArgs, db_url: Option<&str>, json: bool) -> Result<()> {
    execute_with_identity(args, db_url, None, None, json)
}

/// Execute the export command, allowing the local server's product identity
/// to be overridden (`--product-name`/`--product-version`) rather than
/// falling back to environment variables / defaults.
pub fn execute_with_identity(
    args: &ExportArgs,
    db_url: Option<&str>,
    product_name: Option<&str>,
    product_version: Option<&str>,
    json: bool,
) -> Result<()> {
    let url = crate::config::resolve_source_db_url(db_url);

    let request = ExportRequest {
        channels: args.channels.clone(),
        config_labels: args.config_labels.clone(),
        output_dir: crate::config::resolve_output_dir(Some(args.output_dir.as_path())),
        metadata_only: args.metadata_only,
        os_images: args.os_images,
        containers: args.containers,
        starting_date: args.starting_date.clone(),
        server: crate::config::resolve_server_version(product_name, product_version),
    };

    if crate::is_dry_run() {
        tracing::info!(
            channels = ?request.channels,
            config_labels = ?request.config_labels,
            output_dir = %request.output_dir.display(),
            "dry run: would export the above without connecting to the database"
        );
    } else {
        let mut db = PgDatabase::connect(&url)?;
        pipeline::run_export(&mut db, &request)?;

        if request.os_images {
            tracing::info!("--osImages requested: image metadata was written to sql_statements.sql; copy images/ out of band before import");
        }
        if request.containers {
            tracing::info!("--containers requested: image metadata was written to sql_statements.sql; copy images/ out of band before import");
        }
    }

    if json {
        let summary = ExportSummary {
            output_dir: request.output_dir.display().to_string(),
            channels: &request.channels,
            config_labels: &request.config_labels,
        };
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{} {}", "Export written to".green(), request.output_dir.display());
    }

    Ok(())
}
