//! Namespace mutation commands.

use clap::Args;

use treehub_core::error::AppError;
use treehub_service::ServiceContext;

use super::OwnerArg;
use crate::output::{self, OutputFormat};

/// Arguments for `mkdir`
#[derive(Debug, Args)]
pub struct MkdirArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
    /// Folder path to create
    pub path: String,
}

/// Arguments for `mv`
#[derive(Debug, Args)]
pub struct MvArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
    /// Existing file or folder
    pub from: String,
    /// New path, or the destination folder with `--into`
    pub to: String,
    /// Keep the name and move into the `to` folder
    #[arg(long)]
    pub into: bool,
}

/// Arguments for `rm`
#[derive(Debug, Args)]
pub struct RmArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
    /// File or folder to delete
    pub path: String,
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute `mkdir`
pub async fn mkdir(ctx: &ServiceContext, args: &MkdirArgs, format: OutputFormat) -> Result<(), AppError> {
    let entry = ctx.namespace.create_folder(args.owner.id(), &args.path).await?;
    match format {
        OutputFormat::Json => output::print_item(&entry, format),
        OutputFormat::Table => output::print_success(&format!("Folder '{}' ready", entry.logical_path)),
    }
    Ok(())
}

/// Execute `mv`
pub async fn mv(ctx: &ServiceContext, args: &MvArgs) -> Result<(), AppError> {
    let owner = args.owner.id();
    let count = if args.into {
        ctx.namespace.move_into(owner, &args.from, &args.to).await?
    } else {
        ctx.namespace.rename(owner, &args.from, &args.to).await?
    };
    output::print_success(&format!("Moved '{}' ({} entries updated)", args.from, count));
    Ok(())
}

/// Execute `rm`
pub async fn rm(ctx: &ServiceContext, args: &RmArgs) -> Result<(), AppError> {
    let prompt = format!("Delete '{}' and everything under it?", args.path);
    if !super::confirm(&prompt, args.yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    let count = ctx.namespace.delete(args.owner.id(), &args.path).await?;
    output::print_success(&format!("Deleted '{}' ({} entries removed)", args.path, count));
    Ok(())
}
