//! Out-of-band reconciliation of the index against the physical tree.
//!
//! The physical tree is treated as the source of truth. A check re-scans
//! both stores and reports every divergence; a repair rewrites the index
//! until the two agree.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use treehub_core::error::ErrorKind;
use treehub_core::result::AppResult;
use treehub_core::types::{OwnerId, PathKey};
use treehub_database::NamespaceIndex;
use treehub_entity::{Entry, PhysicalObject, ReconcileReport, SizeMismatch};
use treehub_storage::PhysicalStore;

use crate::locks::OwnerLocks;

/// Compares and repairs owners' index rows against their physical trees.
#[derive(Debug, Clone)]
pub struct Reconciler {
    /// Namespace index.
    index: Arc<dyn NamespaceIndex>,
    /// Physical owner trees.
    store: Arc<PhysicalStore>,
    /// Per-owner critical sections.
    locks: Arc<OwnerLocks>,
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(
        index: Arc<dyn NamespaceIndex>,
        store: Arc<PhysicalStore>,
        locks: Arc<OwnerLocks>,
    ) -> Self {
        Self {
            index,
            store,
            locks,
        }
    }

    /// Every owner known to either store.
    pub async fn all_owners(&self) -> AppResult<Vec<OwnerId>> {
        let mut owners: BTreeSet<OwnerId> = self.index.owners().await?.into_iter().collect();
        owners.extend(self.store.owner_roots().await?.into_iter().map(|r| r.owner_id));
        Ok(owners.into_iter().collect())
    }

    /// Report divergences for one owner without changing anything.
    pub async fn check(&self, owner: OwnerId) -> AppResult<ReconcileReport> {
        let _guard = self.locks.lock(owner).await;
        self.scan(owner).await
    }

    /// Rewrite the owner's index so that it matches the physical tree.
    ///
    /// Returns the divergences that were found and fixed.
    pub async fn repair(&self, owner: OwnerId) -> AppResult<ReconcileReport> {
        let _guard = self.locks.lock(owner).await;
        let mut report = self.scan(owner).await?;
        if report.is_consistent() {
            return Ok(report);
        }

        let physical: BTreeMap<PathKey, PhysicalObject> = self
            .store
            .walk(owner)
            .await?
            .into_iter()
            .map(|o| (o.path.clone(), o))
            .collect();

        for path in &report.missing_on_disk {
            self.index.delete_subtree(owner, path).await?;
        }
        for path in &report.kind_mismatches {
            self.index.delete_subtree(owner, path).await?;
        }

        let mut to_insert: Vec<&PathKey> = report
            .missing_in_index
            .iter()
            .chain(report.kind_mismatches.iter())
            .collect();
        to_insert.sort();
        for path in to_insert {
            let Some(object) = physical.get(path) else {
                continue;
            };
            let result = if object.is_folder {
                self.index.create(owner, path, true, 0).await.map(|_| ())
            } else {
                self.index
                    .record_upload(owner, path, object.size_bytes)
                    .await
                    .map(|_| ())
            };
            match result {
                Ok(()) => {}
                Err(e) if e.is(ErrorKind::Conflict) && object.is_folder => {}
                Err(e) => return Err(e),
            }
        }

        for mismatch in &report.size_mismatches {
            self.index.set_size(owner, &mismatch.path, mismatch.actual).await?;
        }

        report.repaired = true;
        info!(
            owner_id = %owner,
            count = report.discrepancy_count(),
            "Repaired index from physical tree"
        );
        Ok(report)
    }

    /// Check (or repair) every known owner. Failures for one owner are
    /// logged and do not stop the others.
    pub async fn run_all(&self, repair: bool) -> AppResult<Vec<ReconcileReport>> {
        let mut reports = Vec::new();
        for owner in self.all_owners().await? {
            let result = if repair {
                self.repair(owner).await
            } else {
                self.check(owner).await
            };
            match result {
                Ok(report) => {
                    if !report.is_consistent() {
                        warn!(
                            owner_id = %owner,
                            count = report.discrepancy_count(),
                            repaired = report.repaired,
                            "Index and filesystem diverge"
                        );
                    }
                    reports.push(report);
                }
                Err(e) => warn!(owner_id = %owner, error = %e, "Reconciliation failed"),
            }
        }
        Ok(reports)
    }

    async fn scan(&self, owner: OwnerId) -> AppResult<ReconcileReport> {
        let indexed = self.index.list_subtree(owner, &PathKey::root()).await?;
        let physical = self.store.walk(owner).await?;
        Ok(diff(owner, indexed, physical))
    }
}

/// Compare index rows with physical objects.
fn diff(owner: OwnerId, indexed: Vec<Entry>, physical: Vec<PhysicalObject>) -> ReconcileReport {
    let mut report = ReconcileReport::new(owner);
    let mut on_disk: BTreeMap<PathKey, PhysicalObject> =
        physical.into_iter().map(|o| (o.path.clone(), o)).collect();

    for entry in indexed {
        match on_disk.remove(&entry.logical_path) {
            None => report.missing_on_disk.push(entry.logical_path),
            Some(object) if object.is_folder != entry.is_folder => {
                report.kind_mismatches.push(entry.logical_path)
            }
            Some(object) if !object.is_folder && object.size_bytes != entry.size() => {
                report.size_mismatches.push(SizeMismatch {
                    indexed: entry.size(),
                    actual: object.size_bytes,
                    path: entry.logical_path,
                })
            }
            Some(_) => {}
        }
    }
    report.missing_in_index = on_disk.into_keys().collect();
    report
}
