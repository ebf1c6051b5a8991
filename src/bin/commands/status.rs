use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tipstore::database::{
    builtin_migrations, describe_migrations, MigrationInfo, MigrationRunner, SchemaStatus,
};
use tipstore::{OutputFormat, TipstoreConfig};

use super::{open_unmigrated, print_json, print_rows};

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Only print the schema status, not the per-migration table
    #[clap(short, long)]
    pub brief: bool,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    path: String,
    schema: SchemaStatus,
    latest_version: i64,
    migrations: Vec<MigrationInfo>,
}

pub fn run(config: &TipstoreConfig, args: StatusArgs, output_format: OutputFormat) -> Result<()> {
    let StatusArgs { brief } = args;

    let migrations = builtin_migrations()?;
    let db = open_unmigrated(config)?;
    let schema = MigrationRunner::new(&migrations).status(&db)?;

    let output = StatusOutput {
        path: config.sqlite_path(),
        latest_version: migrations.latest_version(),
        migrations: describe_migrations(&migrations, schema.version()),
        schema,
    };

    if print_json(&output, output_format)? {
        return Ok(());
    }

    println!("Database: {}", output.path);
    println!("Schema:   {}", output.schema);
    if !brief {
        print_rows(output.migrations, output_format);
    }

    if output.schema.needs_migration() {
        eprintln!();
        eprintln!("Run `tipstore migrate` to apply pending migrations");
    }
    Ok(())
}
