//! Hearth CLI - durable storage actors behind a small HTTP API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hearth_core::actor::{ActorRegistry, validate_instance_name};
use hearth_core::config::Config;
use hearth_core::storage::{
    Database, DatabaseConfig, MigrationSet, applied_migrations, apply_migrations, migration_status,
};
use hearth_server::{AppState, build_router};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(author, version, about = "Durable per-entity storage actors over HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on (overrides server.bind_addr)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Apply pending migrations to an instance and show what is applied
    Migrate {
        /// Instance name (defaults to actor.default_instance)
        #[arg(short, long)]
        instance: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hearth=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => cmd_serve(bind).await,
        Commands::Migrate { instance } => cmd_migrate(instance, cli.quiet).await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

/// Attach the error code and operator hint to a core error
fn explain(err: hearth_core::Error) -> anyhow::Error {
    match err.suggestion() {
        Some(hint) => anyhow::anyhow!("[{}] {}\n  hint: {}", err.code(), err, hint),
        None => anyhow::anyhow!("[{}] {}", err.code(), err),
    }
}

fn load_migrations(config: &Config) -> anyhow::Result<MigrationSet> {
    let set = match &config.storage.migrations_dir {
        Some(dir) => MigrationSet::from_dir(dir),
        None => MigrationSet::builtin(),
    };
    set.map_err(explain)
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_serve(bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let bind_addr = match bind {
        Some(addr) => addr,
        None => config.bind_addr()?,
    };

    let registry = Arc::new(
        ActorRegistry::from_config(&config)
            .map_err(explain)
            .context("failed to load migrations")?,
    );

    // Construct the default instance up front so a broken migration shows in
    // the startup log. Requests retry construction on their own.
    let default_instance = config.actor.default_instance.clone();
    if let Err(e) = registry.get(&default_instance).await {
        warn!(instance = %default_instance, error = %e, "Default instance is not ready");
    }

    let app = build_router(AppState::new(registry.clone(), default_instance.as_str()));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(
        bind_addr = %bind_addr,
        data_dir = %config.storage.data_dir.display(),
        default_instance = %default_instance,
        "Hearth server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    registry.shutdown().await;
    info!("Hearth server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn cmd_migrate(instance: Option<String>, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let name = instance.unwrap_or_else(|| config.actor.default_instance.clone());
    validate_instance_name(&name).map_err(explain)?;

    let set = load_migrations(&config)?;
    let db_config = DatabaseConfig::for_instance(&config.storage.data_dir, &name)
        .max_connections(config.storage.max_connections);
    let db = Database::new(db_config).await.map_err(explain)?;

    let result = async {
        let newly_applied = apply_migrations(db.pool(), &set).await?;
        let applied = applied_migrations(db.pool()).await?;
        let status = migration_status(db.pool(), &set).await?;
        Ok::<_, hearth_core::Error>((newly_applied, applied, status))
    }
    .await;
    db.close().await;

    let (newly_applied, applied, status) = result.map_err(explain)?;

    if quiet {
        return Ok(());
    }

    println!("Instance '{}' ({})", name, db.path().display());
    if newly_applied.is_empty() {
        println!("Already up to date.");
    } else {
        println!("Applied {} migration(s):", newly_applied.len());
        for tag in &newly_applied {
            println!("  + {}", tag);
        }
    }

    println!();
    for migration in &applied {
        println!(
            "  {:>4}  {:<32}  applied {}",
            migration.idx,
            migration.tag,
            migration.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if status.needs_migration {
        println!("Pending: {}", status.pending.join(", "));
    }

    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            // Edit the file as written so env overrides are not persisted
            let mut config = Config::load_file()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
