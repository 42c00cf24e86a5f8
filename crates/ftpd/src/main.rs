//! obexftpd
//!
//! Inspection tool for the folder browsing server's shared tree.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use ftpd::config::{default_config_path, Config};
use ftpd::files::entry::is_writable;
use ftpd::files::{list_directory, listing, scan, ExtensionTable};
use ftpd::storage::LocalVolume;
use ftpd::StorageVolume;
use tracing_subscriber::EnvFilter;

/// obexftpd - OBEX folder browsing server core.
#[derive(Parser, Debug)]
#[command(name = "obexftpd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the folder listing a client would receive
    Listing {
        /// Folder to list (defaults to the shared root)
        dir: Option<PathBuf>,
    },

    /// Print the classifiable files under a folder as JSON
    Scan {
        /// Folder to scan (defaults to the shared root)
        dir: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,

    /// Validate the configuration and the storage volume
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply_env_overrides();

    let level = if cli.verbose {
        "debug"
    } else {
        config.daemon.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;
    tracing::debug!(config_path = ?cli.config.clone().unwrap_or_else(default_config_path), "configuration loaded");

    let root = config.ftp.root_path.clone();
    match cli.command {
        Commands::Listing { dir } => {
            let dir = dir.unwrap_or(root);
            let entries = list_directory(&dir)
                .with_context(|| format!("Failed to list {}", dir.display()))?;
            print!("{}", listing::render(&entries));
        }
        Commands::Scan { dir } => {
            let dir = dir.unwrap_or(root);
            let classifier = ExtensionTable::with_overrides(&config.mime.overrides);
            let files = scan(&dir, &classifier)
                .with_context(|| format!("Failed to scan {}", dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Check => check(&root, config.storage.reserve_bytes)?,
    }

    Ok(())
}

fn check(root: &Path, reserve_bytes: u64) -> anyhow::Result<()> {
    let volume = LocalVolume::new(root, reserve_bytes);
    if !volume.is_mounted() {
        anyhow::bail!("Shared folder {} is not available", root.display());
    }

    println!("root:      {}", root.display());
    match volume.available_bytes() {
        Some(free) => println!("free:      {} bytes", free),
        None => println!("free:      unknown"),
    }
    println!("reserve:   {} bytes", reserve_bytes);
    println!("writable:  {}", is_writable(root));
    Ok(())
}
