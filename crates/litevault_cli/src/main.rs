//! LiteVault CLI
//!
//! Runs the HTTP server and offline maintenance commands against one
//! SQLite database and its backup generations.
//!
//! # Commands
//!
//! - `serve` - Prepare the database and serve the HTTP API
//! - `init` - Run the recovery cascade and print each transition
//! - `backup` - Rotate local and remote generations now
//! - `restore` - Replace the database with the newest local generation
//! - `status` - Show the database, generations and sync state
//! - `verify` - Check that the database is present and schema-valid
//! - `fingerprint` - Print the content fingerprint of a file
//! - `add-user` - Create a login for the HTTP API

mod commands;

use clap::{Parser, Subcommand};
use commands::VaultOptions;
use std::fs::{self, OpenOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// LiteVault database availability and backup tools.
#[derive(Parser)]
#[command(name = "litevault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, long, env = "LITEVAULT_DB_PATH", default_value = "data/app.sqlite")]
    db_path: PathBuf,

    /// Directory for local generations (default: <db dir>/backups)
    #[arg(global = true, long, env = "LITEVAULT_BACKUP_DIR")]
    backup_dir: Option<PathBuf>,

    /// Directory used as the remote object store (e.g. a mounted share)
    #[arg(global = true, long, env = "LITEVAULT_REMOTE_DIR")]
    remote_dir: Option<PathBuf>,

    /// Deadline for each remote store call, in seconds
    #[arg(global = true, long, env = "LITEVAULT_REMOTE_TIMEOUT_SECS", default_value = "30")]
    remote_timeout_secs: u64,

    /// Number of generations retained locally and remotely
    #[arg(global = true, long, env = "LITEVAULT_GENERATIONS", default_value = "3")]
    generations: usize,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the database and serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "LITEVAULT_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,

        /// Secret used to sign bearer tokens
        #[arg(long, env = "LITEVAULT_SECRET", hide_env_values = true)]
        secret: String,

        /// Administrator created at startup if missing
        #[arg(long, env = "LITEVAULT_ADMIN_USERNAME", requires = "admin_password")]
        admin_username: Option<String>,

        /// Password for the administrator
        #[arg(long, env = "LITEVAULT_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,

        /// Number of request worker threads
        #[arg(long, env = "LITEVAULT_WORKERS", default_value = "4")]
        workers: usize,

        /// Bearer token lifetime in seconds
        #[arg(long, default_value = "3600")]
        token_expiry_secs: u64,
    },

    /// Run the recovery cascade and print each transition
    Init {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rotate local and remote generations from the current database
    Backup,

    /// Replace the database with the newest local generation
    Restore,

    /// Show the database, generations and sync state
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that the database exists and has the required tables
    Verify,

    /// Print the content fingerprint of a file
    Fingerprint {
        /// File to fingerprint
        file: PathBuf,
    },

    /// Create a login for the HTTP API
    AddUser {
        /// Username
        username: String,

        /// Password (prefer the environment variable)
        #[arg(long, env = "LITEVAULT_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_path = match cli.command {
        Commands::Fingerprint { .. } => None,
        _ => Some(log_file_path(&cli.db_path)),
    };
    init_logging(cli.verbose, log_path.as_deref());

    let options = VaultOptions {
        db_path: cli.db_path,
        backup_dir: cli.backup_dir,
        remote_dir: cli.remote_dir,
        remote_timeout_secs: cli.remote_timeout_secs,
        generations: cli.generations,
    };

    match cli.command {
        Commands::Serve {
            bind,
            secret,
            admin_username,
            admin_password,
            workers,
            token_expiry_secs,
        } => {
            let admin = admin_username.zip(admin_password);
            commands::serve::run(
                &options,
                commands::serve::ServeOptions {
                    bind,
                    secret,
                    admin,
                    workers,
                    token_expiry_secs,
                    log_path,
                },
            )?;
        }
        Commands::Init { format } => commands::init::run(&options, &format)?,
        Commands::Backup => commands::backup::run_backup(&options)?,
        Commands::Restore => commands::backup::run_restore(&options)?,
        Commands::Status { format } => commands::status::run(&options, &format)?,
        Commands::Verify => commands::verify::run(&options)?,
        Commands::Fingerprint { file } => commands::fingerprint::run(&file)?,
        Commands::AddUser { username, password } => {
            commands::user::run(&options, &username, &password)?;
        }
    }

    Ok(())
}

/// `app.log` next to the database file.
fn log_file_path(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join("app.log")
}

/// Console output plus an ANSI-free copy in the log file, if one is given.
fn init_logging(verbose: bool, log_path: Option<&Path>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_layer = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).ok()?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
}
