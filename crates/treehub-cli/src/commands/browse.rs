//! Read-only browse commands.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use treehub_core::error::AppError;
use treehub_entity::ListingItem;
use treehub_service::ServiceContext;

use super::OwnerArg;
use crate::output::{self, OutputFormat};

/// Arguments for `ls`
#[derive(Debug, Args)]
pub struct LsArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
    /// Folder to list (empty for the owner root)
    #[arg(default_value = "")]
    pub path: String,
}

/// Arguments for `tree`
#[derive(Debug, Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
}

/// Arguments for `du`
#[derive(Debug, Args)]
pub struct DuArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
    /// Path to measure (empty for the owner root)
    #[arg(default_value = "")]
    pub path: String,
}

/// Listing display row
#[derive(Debug, Serialize, Tabled)]
struct ListingRow {
    /// Name
    name: String,
    /// File or folder
    kind: &'static str,
    /// Size
    size: String,
    /// Last modified on disk
    modified: String,
    /// Indexed at
    created: String,
}

impl From<&ListingItem> for ListingRow {
    fn from(item: &ListingItem) -> Self {
        Self {
            name: item.entry.name().to_string(),
            kind: if item.entry.is_folder { "folder" } else { "file" },
            size: if item.entry.is_folder {
                "-".to_string()
            } else {
                output::human_size(item.entry.size())
            },
            modified: output::format_time(item.modified_at),
            created: output::format_time(Some(item.entry.created_at)),
        }
    }
}

/// Execute `ls`
pub async fn ls(ctx: &ServiceContext, args: &LsArgs, format: OutputFormat) -> Result<(), AppError> {
    let items = ctx.browse.list_children(args.owner.id(), &args.path).await?;
    match format {
        OutputFormat::Json => output::print_item(&items, format),
        OutputFormat::Table => {
            let rows: Vec<ListingRow> = items.iter().map(ListingRow::from).collect();
            output::print_list(&rows, format);
        }
    }
    Ok(())
}

/// Execute `tree`
pub async fn tree(ctx: &ServiceContext, args: &TreeArgs, format: OutputFormat) -> Result<(), AppError> {
    let folders = ctx.browse.folder_tree(args.owner.id()).await?;
    match format {
        OutputFormat::Json => output::print_item(&folders, format),
        OutputFormat::Table => {
            println!("/");
            for folder in &folders {
                println!("{}", folder.label());
            }
        }
    }
    Ok(())
}

/// Execute `du`
pub async fn du(ctx: &ServiceContext, args: &DuArgs, format: OutputFormat) -> Result<(), AppError> {
    let bytes = ctx.browse.dir_size(args.owner.id(), &args.path).await?;
    match format {
        OutputFormat::Json => output::print_item(
            &serde_json::json!({ "path": args.path, "size_bytes": bytes }),
            format,
        ),
        OutputFormat::Table => {
            let shown = if args.path.is_empty() { "/" } else { args.path.as_str() };
            output::print_kv(shown, &output::human_size(bytes));
        }
    }
    Ok(())
}
