pub mod config;
pub mod migrate;
pub mod plan;
pub mod rollback;
pub mod status;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tipstore::database::DatabaseConn;
use tipstore::{OutputFormat, TipstoreConfig};

/// Print `value` if `output_format` is a JSON variant
///
/// Returns `false` for non-JSON formats so the caller can render its own view.
pub(crate) fn print_json<T: Serialize>(value: &T, output_format: OutputFormat) -> Result<bool> {
    match output_format.to_json(value) {
        Some(json) => {
            let json = json.map_err(|e| anyhow!("Failed to serialize to JSON: {}", e))?;
            println!("{}", json);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Print rows as a rounded or markdown table, or as pipe-separated values
pub(crate) fn print_rows<T: Tabled>(rows: Vec<T>, output_format: OutputFormat) {
    match output_format {
        OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
        OutputFormat::Psv => {
            println!("{}", T::headers().join("|"));
            for row in &rows {
                println!("{}", row.fields().join("|"));
            }
        }
        _ => println!("{}", Table::new(rows).with(Style::rounded())),
    }
}

/// Open the configured database file without migrating it
pub(crate) fn open_unmigrated(config: &TipstoreConfig) -> Result<DatabaseConn> {
    tipstore::database::ensure_data_dir(&config.data_dir)?;
    let db = DatabaseConn::open_path(&config.sqlite_path())?;
    db.set_busy_timeout(config.busy_timeout())?;
    Ok(db)
}
