use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod db;
mod users;

use commands::{ConfigCommand, ProfileCommand, UserCommand};
use config::Config;
use db::{init_db, SqliteDocumentStore};
use profilesync_core::{DocumentStore, LifecycleBus, ProfileSyncRule};
use users::UserService;

#[derive(Parser)]
#[command(name = "profilesync")]
#[command(version)]
#[command(about = "Manage users and keep one profile per user", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User(UserCommand),

    /// Inspect profiles
    Profile(ProfileCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profilesync=warn,profilesync_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Everything a command needs: the store, the bus with the profile rule
/// installed, and the user service emitting into it.
struct App {
    rule: Arc<ProfileSyncRule>,
    users: UserService,
}

async fn open(config: &Config) -> Result<App, Box<dyn std::error::Error>> {
    let pool = init_db(&config.database_path.value).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));
    let bus = Arc::new(LifecycleBus::new());

    let rule = Arc::new(ProfileSyncRule::new(Arc::clone(&store)));
    Arc::clone(&rule).install(&bus).await?;

    let users = UserService::new(
        store,
        bus,
        config.allowed_fields.value.clone(),
        config.hook_failure.value,
    );
    users.prepare().await?;

    Ok(App { rule, users })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::User(cmd)) => {
            let app = open(&config).await?;
            cmd.run(&app.users).await?;
        }
        Some(Commands::Profile(cmd)) => {
            let app = open(&config).await?;
            cmd.run(&app.rule).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
