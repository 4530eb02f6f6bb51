use bookstore::cli::{self as prog_cli, Command};
use bookstore::config::{self, AppConfig};
use bookstore::logger;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about = "Runs the bookstore query script against MongoDB", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path to a config file (TOML)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "MongoDB connection string (e.g., mongodb://localhost:27017)")]
    uri: Option<String>,
    #[arg(long, global = true, help = "Database name")]
    db: Option<String>,
    #[arg(long, global = true, help = "Collection name")]
    collection: Option<String>,
    #[arg(long, global = true, help = "Directory for app.log and audit.log")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Connect to MongoDB and run every scripted query")]
    Run,
    #[command(about = "Insert sample books into the configured collection")]
    Seed {
        #[arg(long, help = "NDJSON, JSON array or CSV file; defaults to the built-in fixture")]
        file: Option<PathBuf>,
        #[arg(long, help = "Delete existing documents first")]
        drop: bool,
    },
    #[command(about = "Run the script against an in-process engine seeded with the fixture")]
    Demo,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let flags = AppConfig {
        uri: cli.uri,
        database: cli.db,
        collection: cli.collection,
        log_dir: cli.log_dir,
        log_level: cli.log_level,
    };
    let env_config = std::env::var("BOOKSTORE_CONFIG").ok().map(PathBuf::from);
    let resolved = config::resolve(flags, cli.config.as_deref(), AppConfig::from_env(), env_config);
    let config::Resolved { settings, warnings } = match resolved {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };
    match logger::configure(&settings.log_dir, &settings.log_level) {
        Ok(()) => warnings.iter().for_each(|w| log::warn!("{w}")),
        Err(e) => {
            eprintln!("warning: file logging disabled: {e}");
            warnings.iter().for_each(|w| eprintln!("warning: {w}"));
        }
    }
    let cmd = match cli.command {
        Commands::Run => Command::Run,
        Commands::Seed { file, drop } => Command::Seed { file, drop },
        Commands::Demo => Command::Demo,
    };
    match prog_cli::run(&settings, cmd, std::io::stdout()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}
