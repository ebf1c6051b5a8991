use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::database::{RunnerOptions, DATABASE_FILE_NAME};

pub struct TipstoreConfig {
    /// Path to the directory to hold tipstore's data
    pub data_dir: String,

    /// How long a statement waits on a locked database, in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,

    /// Take the advisory migration lock before migrating (default: true)
    pub migration_lock: bool,

    /// Age in seconds after which a migration lock is taken over (default: 600)
    pub stale_lock_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### tipstore configuration file

### directory for the tipstore database
# data_dir = "~/.tipstore"

### how long to wait on a busy database (in milliseconds)
# busy_timeout_ms = 5000

### serialize concurrent migration runs with an advisory lock
# migration_lock = true

### take over a migration lock older than this (in seconds)
# stale_lock_secs = 600
"#;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_STALE_LOCK_SECS: u64 = 600;

impl Default for TipstoreConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.tipstore", home_dir),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            migration_lock: true,
            stale_lock_secs: DEFAULT_STALE_LOCK_SECS,
        }
    }
}

impl TipstoreConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<TipstoreConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.tipstore/tipstore.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let tipstore_dir = format!("{}/.tipstore", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(tipstore_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create tipstore directory: {}", e))?;
                let p = format!("{}/tipstore.toml", tipstore_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `TIPSTORE_DATA_DIR=/var/lib/tipstore tipstore migrate`
        builder = builder.add_source(config::Environment::with_prefix("TIPSTORE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, tipstore_dir)
    }

    fn from_map(config: &HashMap<String, String>, default_data_dir: String) -> Result<Self> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => default_data_dir,
        };

        let busy_timeout_ms = parse_or(config, "busy_timeout_ms", DEFAULT_BUSY_TIMEOUT_MS)?;
        let migration_lock = parse_or(config, "migration_lock", true)?;
        let stale_lock_secs = parse_or(config, "stale_lock_secs", DEFAULT_STALE_LOCK_SECS)?;

        Ok(TipstoreConfig {
            data_dir,
            busy_timeout_ms,
            migration_lock,
            stale_lock_secs,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, DATABASE_FILE_NAME)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }

    /// Migration runner settings derived from this configuration
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            lock: self.migration_lock,
            stale_lock_after: self.stale_lock_after(),
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!("Busy Timeout:       {} ms", self.busy_timeout_ms),
            format!("Migration Lock:     {}", self.migration_lock),
            format!("Stale Lock After:   {} seconds", self.stale_lock_secs),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.tipstore/tipstore.toml", home_dir)
    }
}

/// Parse an optional key, falling back to `default` when absent
fn parse_or<T>(config: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match config.get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value '{}' for {}: {}", value, key, e)),
        None => Ok(default),
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}

// =============================================================================
// Database info (used by the config and status commands)
// =============================================================================

#[derive(Debug, Serialize, Clone)]
pub struct SqliteDatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub schema_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,
    pub latest_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_cache_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_values_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_migrated: Option<String>,
}

/// Inspect the database file without migrating it
pub fn get_sqlite_info(config: &TipstoreConfig) -> SqliteDatabaseInfo {
    use crate::database::{builtin_migrations, DatabaseConn, MigrationRunner, Store};

    let sqlite_path = config.sqlite_path();
    let sqlite_exists = Path::new(&sqlite_path).exists();
    let sqlite_size = if sqlite_exists {
        std::fs::metadata(&sqlite_path).ok().map(|m| m.len())
    } else {
        None
    };

    let migrations = builtin_migrations().ok();
    let latest_version = migrations
        .as_ref()
        .map(|m| m.latest_version())
        .unwrap_or(0);

    let mut info = SqliteDatabaseInfo {
        path: sqlite_path,
        exists: sqlite_exists,
        size_bytes: sqlite_size,
        schema_initialized: false,
        schema_version: None,
        latest_version,
        content_cache_count: None,
        dependent_values_count: None,
        last_migrated: None,
    };

    let (Some(migrations), true) = (migrations, sqlite_exists) else {
        return info;
    };
    let Ok(db) = DatabaseConn::open_path(&info.path) else {
        return info;
    };

    info.schema_version = MigrationRunner::new(&migrations)
        .current_version(&db)
        .ok()
        .flatten();
    info.schema_initialized = info.schema_version.is_some();
    if !info.schema_initialized {
        return info;
    }

    info.last_migrated = db
        .query_i64("SELECT updated_at FROM schema_version WHERE id = 1", &[])
        .ok()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    if db.table_exists("content_cache").unwrap_or(false) {
        info.content_cache_count = db.table_count("content_cache").ok();
    }
    if db.table_exists("dependent_values").unwrap_or(false) {
        info.dependent_values_count = db.table_count("dependent_values").ok();
    }

    info
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TipstoreDatabase;

    fn test_config(data_dir: &str) -> TipstoreConfig {
        TipstoreConfig {
            data_dir: data_dir.to_string(),
            ..TipstoreConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = TipstoreConfig::default();
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.migration_lock);
        assert_eq!(config.stale_lock_secs, 600);
        assert!(config.data_dir.ends_with("/.tipstore"));
    }

    #[test]
    fn test_paths() {
        let config = test_config("/test/dir/");
        assert_eq!(config.sqlite_path(), "/test/dir/tipstore-data.sqlite3");
    }

    #[test]
    fn test_runner_options() {
        let config = TipstoreConfig {
            migration_lock: false,
            stale_lock_secs: 30,
            ..test_config("/test")
        };

        let options = config.runner_options();
        assert!(!options.lock);
        assert_eq!(options.stale_lock_after, Duration::from_secs(30));
        assert_eq!(config.busy_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_from_map() {
        let mut map = HashMap::new();
        map.insert("data_dir".to_string(), "/srv/tipstore".to_string());
        map.insert("busy_timeout_ms".to_string(), "250".to_string());
        map.insert("migration_lock".to_string(), "false".to_string());

        let config = TipstoreConfig::from_map(&map, "/unused".to_string()).unwrap();
        assert_eq!(config.data_dir, "/srv/tipstore");
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.migration_lock);
        assert_eq!(config.stale_lock_secs, 600);

        map.insert("stale_lock_secs".to_string(), "soon".to_string());
        assert!(TipstoreConfig::from_map(&map, "/unused".to_string()).is_err());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tipstore.toml");
        std::fs::write(&path, "busy_timeout_ms = 1200\nstale_lock_secs = 60\n").unwrap();

        let config = TipstoreConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.busy_timeout_ms, 1200);
        assert_eq!(config.stale_lock_secs, 60);
    }

    #[test]
    fn test_missing_config_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.toml");

        TipstoreConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("### tipstore configuration file"));
    }

    #[test]
    fn test_sqlite_info() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_str().unwrap());

        let info = get_sqlite_info(&config);
        assert!(!info.exists);
        assert!(!info.schema_initialized);
        assert_eq!(info.latest_version, 2);

        TipstoreDatabase::open_with_config(&config).unwrap();

        let info = get_sqlite_info(&config);
        assert!(info.exists);
        assert!(info.schema_initialized);
        assert_eq!(info.schema_version, Some(2));
        assert_eq!(info.content_cache_count, Some(0));
        assert!(info.last_migrated.is_some());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }
}
