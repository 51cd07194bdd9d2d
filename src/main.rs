use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chat_mirror::{ChatStore, Config, DocumentDb, StoreError, StoreResult, StoreSnapshot};

#[derive(Parser)]
#[command(name = "chat-mirror")]
#[command(about = "Mirror a messaging client's chat cache into SQLite", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Database path (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate default config
    InitConfig,
    /// Show version
    Version,
    /// Write a JSON snapshot of the store
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Include chats and contacts
        #[arg(long)]
        full: bool,
    },
    /// Load a JSON snapshot into the database
    Import { file: PathBuf },
    /// List stored chats in display order
    Chats,
    /// Drop expired status messages from a snapshot file, in place
    PurgeStatus {
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig => {
            init_config();
            return ExitCode::SUCCESS;
        }
        Commands::Version => {
            println!("chat-mirror v{}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let mut config = load_config(&cli.config);
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli.command, &config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &str) -> Config {
    let from_env = || {
        Config::load_env().unwrap_or_else(|e| {
            tracing::warn!("Ignoring environment overrides: {}", e);
            Config::default()
        })
    };

    if Path::new(path).exists() {
        Config::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            from_env()
        })
    } else {
        from_env()
    }
}

fn open_store(config: &Config) -> StoreResult<ChatStore> {
    let db = DocumentDb::open(&config.database.path)?;
    tracing::info!(path = %config.database.path.display(), "Database opened");
    ChatStore::new(config.store_config(db))
}

async fn run(command: Commands, config: &Config) -> StoreResult<()> {
    match command {
        Commands::Export { output, full } => {
            let store = open_store(config)?;
            let snapshot = if full {
                store.export_full().await?
            } else {
                store.to_json().await?
            };
            write_snapshot(&snapshot, output.as_deref())?;
        }
        Commands::Import { file } => {
            let store = open_store(config)?;
            let snapshot = read_snapshot(&file)?;
            store.from_json(snapshot).await?;
            println!(
                "Imported {} chats, {} contacts",
                store.chats().count()?,
                store.contacts().count()?
            );
        }
        Commands::Chats => {
            let store = open_store(config)?;
            for chat in store.list_chats().await? {
                let name = chat.name.as_deref().unwrap_or("-");
                let flags = match (chat.is_pinned(), chat.is_archived()) {
                    (true, _) => " [pinned]",
                    (false, true) => " [archived]",
                    _ => "",
                };
                println!(
                    "{}  {}  unread={}{}",
                    chat.id,
                    name,
                    chat.unread_count.unwrap_or(0),
                    flags
                );
            }
        }
        Commands::PurgeStatus { snapshot: path } => {
            let store = ChatStore::new(config.store_config(DocumentDb::open_in_memory()?))?;
            store.from_json(read_snapshot(&path)?).await?;
            let removed = store.purge_status_messages(chrono::Utc::now()).await;

            let mut snapshot = read_snapshot(&path)?;
            snapshot.messages = store.to_json().await?.messages;
            write_snapshot(&snapshot, Some(&path))?;
            println!("Removed {} expired status messages", removed);
        }
        Commands::InitConfig | Commands::Version => {}
    }
    Ok(())
}

fn read_snapshot(path: &Path) -> StoreResult<StoreSnapshot> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_snapshot(snapshot: &StoreSnapshot, output: Option<&Path>) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            tracing::info!(path = %path.display(), "Snapshot written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn init_config() {
    match serde_yaml::to_string(&Config::default()) {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => eprintln!("{}", StoreError::Internal(e.to_string())),
    }
}
