use anyhow::{anyhow, Result};
use clap::Args;
use tipstore::database::{builtin_migrations, MigrationRunner};
use tipstore::{OutputFormat, TipstoreConfig};

use super::{open_unmigrated, print_json};

/// Arguments for the Rollback command
#[derive(Args)]
pub struct RollbackArgs {
    /// Version to roll back to; 0 reverts every migration
    #[clap(long, value_name = "VERSION")]
    pub to: i64,

    /// Skip confirmation prompt
    #[clap(long, short = 'y')]
    pub yes: bool,
}

pub fn run(config: &TipstoreConfig, args: RollbackArgs, output_format: OutputFormat) -> Result<()> {
    let RollbackArgs { to, yes } = args;

    if !yes && !output_format.is_json() {
        eprintln!(
            "This will revert migrations above v{} in {} and may drop data.",
            to,
            config.sqlite_path()
        );
        eprint!("Are you sure? [y/N] ");

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| anyhow!("Failed to read confirmation: {}", e))?;
        let input = input.trim().to_lowercase();
        if input != "y" && input != "yes" {
            eprintln!("Aborted.");
            return Ok(());
        }
    } else if !yes {
        return Err(anyhow!("Refusing to roll back without --yes"));
    }

    let migrations = builtin_migrations()?;
    let db = open_unmigrated(config)?;
    let report = MigrationRunner::with_options(&migrations, config.runner_options())
        .rollback_to(&db, to)?;

    if print_json(&report, output_format)? {
        return Ok(());
    }

    if report.reverted.is_empty() {
        println!(
            "Schema is at v{}, nothing to roll back",
            report.old_version
        );
    } else {
        let reverted: Vec<String> = report.reverted.iter().map(|v| format!("v{}", v)).collect();
        println!(
            "Rolled back schema from v{} to v{} (reverted {})",
            report.old_version,
            report.new_version,
            reverted.join(", ")
        );
    }
    Ok(())
}
