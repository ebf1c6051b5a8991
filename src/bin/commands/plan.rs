use anyhow::Result;
use clap::Args;
use tipstore::database::{builtin_migrations, MigrationInfo, MigrationRunner, MigrationState};
use tipstore::{OutputFormat, TipstoreConfig};

use super::{open_unmigrated, print_json, print_rows};

/// Arguments for the Plan command
#[derive(Args)]
pub struct PlanArgs {}

pub fn run(config: &TipstoreConfig, _args: PlanArgs, output_format: OutputFormat) -> Result<()> {
    let migrations = builtin_migrations()?;
    let db = open_unmigrated(config)?;

    let pending: Vec<MigrationInfo> = MigrationRunner::new(&migrations)
        .plan(&db)?
        .into_iter()
        .map(|m| MigrationInfo {
            version: m.version,
            name: m.name.clone().unwrap_or_else(|| "-".to_string()),
            state: MigrationState::Pending,
        })
        .collect();

    if print_json(&pending, output_format)? {
        return Ok(());
    }

    if pending.is_empty() {
        println!("Nothing to apply, schema is current");
        return Ok(());
    }
    print_rows(pending, output_format);
    Ok(())
}
