// src/main.rs
//! glix - CLI entry point

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "glix")]
#[command(version)]
#[command(about = "Install, update or remove Go module binaries with ease", long_about = None)]
struct Cli {
    /// Disable interactive output
    #[arg(long, global = true)]
    no_tui: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a module and track it in the database
    Install {
        /// Module path, repository URL, or path@version
        module: String,
    },

    /// Remove an installed module and its binary
    Remove {
        /// Module name, optionally name@version
        module: String,
    },

    /// Update a single installed module to its latest version
    Update {
        /// Module name
        module: String,
    },

    /// Check every installed module for updates
    Monitor {
        /// Apply available updates instead of only reporting them
        #[arg(long)]
        update: bool,
    },

    /// List installed modules
    List {
        /// Maximum number of modules to show (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: i32,

        /// Number of modules to skip
        #[arg(short, long, default_value = "0")]
        offset: i32,

        /// Filter modules by name (case-insensitive substring)
        #[arg(short, long, default_value = "")]
        filter: String,
    },

    /// Show the stored record of a module
    Report {
        /// Module name
        module: String,

        /// Expected version; reports not-found on mismatch
        #[arg(short, long, default_value = "")]
        version: String,

        /// Emit the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Service management
    #[command(subcommand)]
    Service(ServiceCommands),

    /// Manage automatic update settings
    #[command(name = "auto-update", subcommand)]
    AutoUpdate(AutoUpdateCommands),
}

#[derive(Subcommand)]
enum ServiceCommands {
    /// Run the service in the foreground
    Run {
        /// Port to listen on
        #[arg(long, default_value_t = glix::DEFAULT_PORT)]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "localhost")]
        bind: String,

        /// Shut down after this much inactivity (e.g. 5m); 0s disables
        #[arg(long, default_value = "0s")]
        idle_timeout: String,
    },

    /// Show the status of the running service
    Status,
}

#[derive(Subcommand)]
enum AutoUpdateCommands {
    /// Show auto-update status and statistics
    Status,

    /// Enable automatic updates
    Enable,

    /// Disable automatic updates
    Disable,

    /// Run an update check immediately
    Now,

    /// Configure auto-update settings
    Config {
        /// Update check interval (e.g. 24h, 12h, 1h)
        #[arg(long)]
        interval: Option<String>,

        /// Only notify about updates, don't auto-install
        #[arg(long, conflicts_with = "no_notify_only")]
        notify_only: bool,

        /// Auto-install updates (disable notify-only)
        #[arg(long)]
        no_notify_only: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Output is always plain text; the flag exists for script compatibility
    // with the interactive renderer.
    let _ = cli.no_tui;

    match cli.command {
        Commands::Install { module } => commands::cmd_install(&module).await,

        Commands::Remove { module } => commands::cmd_remove(&module).await,

        Commands::Update { module } => commands::cmd_update(&module).await,

        Commands::Monitor { update } => commands::cmd_monitor(update).await,

        Commands::List { limit, offset, filter } => {
            commands::cmd_list(limit, offset, &filter).await
        }

        Commands::Report { module, version, json } => {
            commands::cmd_report(&module, &version, json).await
        }

        Commands::Service(ServiceCommands::Run { port, bind, idle_timeout }) => {
            commands::cmd_service_run(port, &bind, &idle_timeout).await
        }

        Commands::Service(ServiceCommands::Status) => commands::cmd_service_status().await,

        Commands::AutoUpdate(AutoUpdateCommands::Status) => commands::cmd_autoupdate_status(),

        Commands::AutoUpdate(AutoUpdateCommands::Enable) => commands::cmd_autoupdate_enable(),

        Commands::AutoUpdate(AutoUpdateCommands::Disable) => commands::cmd_autoupdate_disable(),

        Commands::AutoUpdate(AutoUpdateCommands::Now) => commands::cmd_autoupdate_now().await,

        Commands::AutoUpdate(AutoUpdateCommands::Config {
            interval,
            notify_only,
            no_notify_only,
        }) => commands::cmd_autoupdate_config(interval.as_deref(), notify_only, no_notify_only),
    }
}
