//! CLI command definitions and dispatch.

pub mod admin;
pub mod browse;
pub mod migrate;
pub mod namespace;
pub mod transfer;

use clap::{Parser, Subcommand};

use treehub_core::config::AppConfig;
use treehub_core::error::AppError;
use treehub_core::types::OwnerId;
use treehub_service::ServiceContext;

use crate::output::OutputFormat;

/// TreeHub: per-owner file trees with a synchronized namespace index
#[derive(Debug, Parser)]
#[command(name = "treehub", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file (defaults to config/default.toml plus
    /// the TREEHUB_ENV overlay)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply pending index migrations
    Migrate,
    /// List the direct children of a folder
    Ls(browse::LsArgs),
    /// Show every folder of an owner as a tree
    Tree(browse::TreeArgs),
    /// Show the recursive on-disk size of a path
    Du(browse::DuArgs),
    /// Create a folder and its missing ancestors
    Mkdir(namespace::MkdirArgs),
    /// Rename or move a file or folder
    Mv(namespace::MvArgs),
    /// Delete a file or folder subtree
    Rm(namespace::RmArgs),
    /// Upload a local file
    Upload(transfer::UploadArgs),
    /// Download a file, or a folder as a zip archive
    Download(transfer::DownloadArgs),
    /// List every owner with size and entry count
    Owners,
    /// Compare (and optionally repair) index and filesystem
    Reconcile(admin::ReconcileArgs),
}

/// Owner selection shared by per-owner commands.
#[derive(Debug, Clone, clap::Args)]
pub struct OwnerArg {
    /// Owner id
    #[arg(short, long)]
    pub owner: i64,
}

impl OwnerArg {
    /// The selected owner.
    pub fn id(&self) -> OwnerId {
        OwnerId::new(self.owner)
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(self.config.as_deref())?;

        if let Commands::Migrate = self.command {
            return migrate::execute(&config).await;
        }

        let (ctx, db) = ServiceContext::connect(&config).await?;
        let result = match &self.command {
            Commands::Migrate => Ok(()),
            Commands::Ls(args) => browse::ls(&ctx, args, self.format).await,
            Commands::Tree(args) => browse::tree(&ctx, args, self.format).await,
            Commands::Du(args) => browse::du(&ctx, args, self.format).await,
            Commands::Mkdir(args) => namespace::mkdir(&ctx, args, self.format).await,
            Commands::Mv(args) => namespace::mv(&ctx, args).await,
            Commands::Rm(args) => namespace::rm(&ctx, args).await,
            Commands::Upload(args) => transfer::upload(&ctx, args, self.format).await,
            Commands::Download(args) => transfer::download(&ctx, args).await,
            Commands::Owners => admin::owners(&ctx, self.format).await,
            Commands::Reconcile(args) => admin::reconcile(&ctx, args, self.format).await,
        };
        db.close().await;
        result
    }
}

/// Helper: load configuration from an explicit file or the default layout
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, AppError> {
    match config_path {
        Some(path) => AppConfig::load_file(path),
        None => {
            let env = std::env::var("TREEHUB_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Helper: ask for confirmation unless `assume_yes` is set
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool, AppError> {
    if assume_yes {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {}", e)))
}
