//! Operator commands: owner overview and reconciliation.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use treehub_core::error::AppError;
use treehub_core::types::OwnerId;
use treehub_entity::ReconcileReport;
use treehub_service::ServiceContext;

use crate::output::{self, OutputFormat};

/// Arguments for `reconcile`
#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Only this owner (default: every owner)
    #[arg(short, long)]
    pub owner: Option<i64>,
    /// Rewrite the index to match the filesystem
    #[arg(long)]
    pub repair: bool,
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Owner display row
#[derive(Debug, Serialize, Tabled)]
struct OwnerRow {
    /// Owner ID
    owner: i64,
    /// On-disk size
    size: String,
    /// Index entries
    entries: u64,
    /// Last modified
    modified: String,
}

/// Reconciliation display row
#[derive(Debug, Serialize, Tabled)]
struct ReportRow {
    /// Owner ID
    owner: i64,
    /// Missing in index
    missing_in_index: usize,
    /// Missing on disk
    missing_on_disk: usize,
    /// Kind mismatches
    kind: usize,
    /// Size mismatches
    size: usize,
    /// Repaired
    repaired: bool,
}

impl From<&ReconcileReport> for ReportRow {
    fn from(report: &ReconcileReport) -> Self {
        Self {
            owner: report.owner_id.get(),
            missing_in_index: report.missing_in_index.len(),
            missing_on_disk: report.missing_on_disk.len(),
            kind: report.kind_mismatches.len(),
            size: report.size_mismatches.len(),
            repaired: report.repaired,
        }
    }
}

/// Execute `owners`
pub async fn owners(ctx: &ServiceContext, format: OutputFormat) -> Result<(), AppError> {
    let summaries = ctx.admin.owners().await?;
    match format {
        OutputFormat::Json => output::print_item(&summaries, format),
        OutputFormat::Table => {
            let rows: Vec<OwnerRow> = summaries
                .iter()
                .map(|s| OwnerRow {
                    owner: s.root.owner_id.get(),
                    size: output::human_size(s.root.size_bytes),
                    entries: s.entry_count,
                    modified: output::format_time(s.root.modified_at),
                })
                .collect();
            output::print_list(&rows, format);
        }
    }
    Ok(())
}

/// Execute `reconcile`
pub async fn reconcile(ctx: &ServiceContext, args: &ReconcileArgs, format: OutputFormat) -> Result<(), AppError> {
    if args.repair
        && !super::confirm("Rewrite index entries to match the filesystem?", args.yes)?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let reports = match args.owner.map(OwnerId::new) {
        Some(owner) if args.repair => vec![ctx.reconciler.repair(owner).await?],
        Some(owner) => vec![ctx.reconciler.check(owner).await?],
        None => ctx.reconciler.run_all(args.repair).await?,
    };

    match format {
        OutputFormat::Json => output::print_item(&reports, format),
        OutputFormat::Table => {
            let rows: Vec<ReportRow> = reports.iter().map(ReportRow::from).collect();
            output::print_list(&rows, format);
            let diverged = reports.iter().filter(|r| !r.is_consistent()).count();
            if diverged == 0 {
                output::print_success("Index and filesystem agree.");
            } else if !args.repair {
                output::print_warning(&format!(
                    "{diverged} owner(s) diverge; re-run with --repair to fix the index."
                ));
            }
        }
    }
    Ok(())
}
