use anyhow::Result;
use clap::Args;
use tipstore::database::{
    builtin_migrations, describe_migrations, MigrationInfo, MigrationRunner,
};
use tipstore::{OutputFormat, TipstoreConfig};

use super::{open_unmigrated, print_json, print_rows};

/// Arguments for the Migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Skip the advisory migration lock (only safe with a single invoker)
    #[clap(long)]
    pub no_lock: bool,
}

pub fn run(config: &TipstoreConfig, args: MigrateArgs, output_format: OutputFormat) -> Result<()> {
    let MigrateArgs { no_lock } = args;

    let migrations = builtin_migrations()?;
    let mut options = config.runner_options();
    if no_lock {
        options.lock = false;
    }

    let db = open_unmigrated(config)?;
    let report = MigrationRunner::with_options(&migrations, options).run(&db)?;

    if print_json(&report, output_format)? {
        return Ok(());
    }

    if report.is_noop() {
        println!("Schema is current at v{}", report.new_version);
        return Ok(());
    }

    println!(
        "Migrated schema from v{} to v{}",
        report.old_version, report.new_version
    );
    let applied: Vec<MigrationInfo> = describe_migrations(&migrations, report.new_version)
        .into_iter()
        .filter(|info| report.applied.contains(&info.version))
        .collect();
    print_rows(applied, output_format);
    Ok(())
}
