//! Configuration, schema management and status

use anyhow::{Context, Result};
use optgate_gatekeeper::{GatekeeperConfig, ServiceContext};
use optgate_persistence::LedgerStore;
use std::path::{Path, PathBuf};

use crate::MigrateAction;

/// File config, then environment, then the `--database-url` flag
pub fn load_config(path: Option<&Path>, database_url: Option<&str>) -> Result<GatekeeperConfig> {
    let mut config = GatekeeperConfig::load(path).context("Failed to load configuration")?;
    if let Some(url) = database_url {
        config.database_url = url.to_string();
        config.validate().context("Invalid --database-url")?;
    }
    Ok(config)
}

/// Filesystem path behind a SQLite URL, if it is file-backed
fn database_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Create the database's parent directory if needed
fn ensure_data_dir(config: &GatekeeperConfig) -> Result<()> {
    if let Some(parent) = database_path(&config.database_url)
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }
    Ok(())
}

/// Connect to the store without migrating
pub async fn connect(config: &GatekeeperConfig) -> Result<LedgerStore> {
    ensure_data_dir(config)?;
    LedgerStore::connect(&config.store_options())
        .await
        .with_context(|| format!("Failed to connect to {}", config.database_url))
}

/// Open a service context, applying pending migrations
pub async fn open_context(config: &GatekeeperConfig) -> Result<ServiceContext> {
    ensure_data_dir(config)?;
    ServiceContext::open(config.clone())
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))
}

/// Handle migrate subcommands
pub async fn migrate(config: &GatekeeperConfig, action: MigrateAction) -> Result<()> {
    let store = connect(config).await?;

    match action {
        MigrateAction::Up => {
            store.migrate().await.context("Migration failed")?;
            println!("✅ Schema is up to date ({})", config.database_url);
        }
        MigrateAction::Down => {
            store.drop_schema().await.context("Failed to drop schema")?;
            println!("🗑️  Dropped all tables");
        }
        MigrateAction::Reset => {
            store.reset().await.context("Failed to reset schema")?;
            println!("♻️  Schema reset ({})", config.database_url);
        }
    }

    store.close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(config: &GatekeeperConfig) -> Result<()> {
    if let Some(path) = database_path(&config.database_url) {
        if !path.exists() {
            println!("❌ Database not found at {:?}", path);
            println!("   Run 'optgate migrate up' to create the database");
            return Ok(());
        }
    }

    let store = connect(config).await?;
    let stats = store
        .stats()
        .await
        .context("Failed to read table counts (run 'optgate migrate up'?)")?;

    println!("📊 Database Status");
    println!("   URL: {}", config.database_url);
    println!();
    println!("   Senders:      {}", stats.senders);
    println!("   Messages:     {}", stats.messages);
    println!("   Reports:      {}", stats.reports);
    println!("   Destinations: {}", stats.guarded_destinations);

    store.close().await;
    Ok(())
}
