//! Upload and download commands.

use std::path::PathBuf;

use clap::Args;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use treehub_core::error::{AppError, ErrorKind};
use treehub_service::ServiceContext;

use super::OwnerArg;
use crate::output::{self, OutputFormat};

/// Arguments for `upload`
#[derive(Debug, Args)]
pub struct UploadArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
    /// Local file to upload
    pub file: PathBuf,
    /// Destination path (defaults to the local file name at the owner root)
    pub dest: Option<String>,
}

/// Arguments for `download`
#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub owner: OwnerArg,
    /// File or folder to download (empty for the whole owner tree)
    #[arg(default_value = "")]
    pub path: String,
    /// Output file (defaults to the suggested name in the current directory)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute `upload`
pub async fn upload(ctx: &ServiceContext, args: &UploadArgs, format: OutputFormat) -> Result<(), AppError> {
    let dest = match &args.dest {
        Some(dest) => dest.clone(),
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Cannot derive a destination from the file name"))?,
    };

    let file = tokio::fs::File::open(&args.file).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Io,
            format!("Failed to open {}", args.file.display()),
            e,
        )
    })?;
    let entry = ctx
        .namespace
        .upload(args.owner.id(), &dest, Box::pin(ReaderStream::new(file)))
        .await?;

    match format {
        OutputFormat::Json => output::print_item(&entry, format),
        OutputFormat::Table => output::print_success(&format!(
            "Uploaded '{}' ({})",
            entry.logical_path,
            output::human_size(entry.size())
        )),
    }
    Ok(())
}

/// Execute `download`
pub async fn download(ctx: &ServiceContext, args: &DownloadArgs) -> Result<(), AppError> {
    let mut download = ctx.browse.download(args.owner.id(), &args.path).await?;
    let target = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&download.file_name));

    let mut file = tokio::fs::File::create(&target).await.map_err(|e| {
        AppError::with_source(ErrorKind::Io, format!("Failed to create {}", target.display()), e)
    })?;
    let mut written = 0u64;
    while let Some(chunk) = download.stream.next().await {
        let chunk = chunk.map_err(|e| AppError::with_source(ErrorKind::Io, "Download stream error", e))?;
        written += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Io, "Failed to write output", e))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Io, "Failed to flush output", e))?;

    output::print_success(&format!(
        "Saved {} to {} ({})",
        if download.is_archive { "archive" } else { "file" },
        target.display(),
        output::human_size(written)
    ));
    Ok(())
}
