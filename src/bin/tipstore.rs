use clap::{Parser, Subcommand};
use tipstore::{OutputFormat, TipstoreConfig};
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::migrate::MigrateArgs;
use commands::plan::PlanArgs;
use commands::rollback::RollbackArgs;
use commands::status::StatusArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.tipstore/tipstore.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty, json-line, psv
    #[clap(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate(MigrateArgs),

    /// Show schema status and which migrations are applied
    Status(StatusArgs),

    /// List the migrations `migrate` would apply, without applying them
    Plan(PlanArgs),

    /// Revert applied migrations down to a target version
    Rollback(RollbackArgs),

    /// Show resolved configuration and database info
    Config(ConfigArgs),
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level INFO or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match TipstoreConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::run(&config, args, cli.format),
        Commands::Status(args) => commands::status::run(&config, args, cli.format),
        Commands::Plan(args) => commands::plan::run(&config, args, cli.format),
        Commands::Rollback(args) => commands::rollback::run(&config, args, cli.format),
        Commands::Config(args) => commands::config::run(&config, args, cli.format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
