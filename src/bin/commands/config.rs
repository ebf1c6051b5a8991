use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tipstore::config::{format_size, get_sqlite_info, SqliteDatabaseInfo};
use tipstore::{OutputFormat, TipstoreConfig};

use super::print_json;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Show detailed information about all data files
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    busy_timeout_ms: u64,
    migration_lock: bool,
    stale_lock_secs: u64,
    database: SqliteDatabaseInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<FileInfo>>,
}

#[derive(Debug, Serialize)]
struct FileInfo {
    name: String,
    path: String,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
}

pub fn run(config: &TipstoreConfig, args: ConfigArgs, output_format: OutputFormat) -> Result<()> {
    let ConfigArgs { verbose } = args;

    // Collect file info if verbose
    let files = if verbose {
        let mut file_list = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&config.data_dir) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    if metadata.is_file() {
                        let modified = metadata.modified().ok().map(|t| {
                            let datetime: chrono::DateTime<chrono::Utc> = t.into();
                            datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
                        });

                        file_list.push(FileInfo {
                            name: entry.file_name().to_string_lossy().to_string(),
                            path: entry.path().to_string_lossy().to_string(),
                            size_bytes: metadata.len(),
                            modified,
                        });
                    }
                }
            }
        }
        file_list.sort_by(|a, b| a.name.cmp(&b.name));
        Some(file_list)
    } else {
        None
    };

    let config_info = ConfigInfo {
        config_file: TipstoreConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        busy_timeout_ms: config.busy_timeout_ms,
        migration_lock: config.migration_lock,
        stale_lock_secs: config.stale_lock_secs,
        database: get_sqlite_info(config),
        files,
    };

    if !print_json(&config_info, output_format)? {
        // Table, Markdown, and PSV all use the same human-readable format
        print_config_table(config, &config_info, verbose);
    }
    Ok(())
}

fn print_config_table(config: &TipstoreConfig, info: &ConfigInfo, verbose: bool) {
    println!("Tipstore Configuration");
    println!("======================\n");

    println!("General:");
    println!("  Config file:    {}", info.config_file);
    for line in config.summary().lines() {
        println!("  {}", line);
    }
    println!();

    println!("SQLite Database:");
    println!("  Path:           {}", info.database.path);
    println!(
        "  Status:         {}",
        if info.database.exists {
            "exists"
        } else {
            "not created"
        }
    );
    if let Some(size) = info.database.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    println!(
        "  Schema:         {}",
        match info.database.schema_version {
            Some(version) => format!(
                "v{} (latest v{})",
                version, info.database.latest_version
            ),
            None => "not initialized".to_string(),
        }
    );
    if let Some(ts) = &info.database.last_migrated {
        println!("  Last migrated:  {}", ts);
    }
    if let Some(count) = info.database.content_cache_count {
        println!("  Content cache:  {} entries", count);
    }
    if let Some(count) = info.database.dependent_values_count {
        println!("  Dependents:     {} entries", count);
    }

    if verbose {
        if let Some(ref files) = info.files {
            println!();
            println!("Data Directory Files:");
            println!("  {:<40} {:>12}  {}", "Name", "Size", "Modified");
            println!("  {}", "-".repeat(80));
            for file in files {
                println!(
                    "  {:<40} {:>12}  {}",
                    file.name,
                    format_size(file.size_bytes),
                    file.modified.as_deref().unwrap_or("-")
                );
            }
        }
    }

    eprintln!();
    eprintln!("Tips:");
    eprintln!("  Use --verbose (-v) to see all files in the data directory");
    eprintln!("  Use --format json for machine-readable output");
    eprintln!("  Edit ~/.tipstore/tipstore.toml to customize settings");
}
