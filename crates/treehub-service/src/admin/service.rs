//! Administrator overview of all owners.

use std::collections::BTreeMap;
use std::sync::Arc;

use treehub_core::result::AppResult;
use treehub_database::NamespaceIndex;
use treehub_entity::{OwnerRoot, OwnerSummary};
use treehub_storage::PhysicalStore;

/// Cross-owner queries for operators.
#[derive(Debug, Clone)]
pub struct AdminService {
    /// Namespace index.
    index: Arc<dyn NamespaceIndex>,
    /// Physical owner trees.
    store: Arc<PhysicalStore>,
}

impl AdminService {
    /// Creates a new admin service.
    pub fn new(index: Arc<dyn NamespaceIndex>, store: Arc<PhysicalStore>) -> Self {
        Self { index, store }
    }

    /// Size, modification time and entry count of every owner, ordered by id.
    pub async fn owners(&self) -> AppResult<Vec<OwnerSummary>> {
        let mut roots: BTreeMap<_, OwnerRoot> = self
            .store
            .owner_roots()
            .await?
            .into_iter()
            .map(|r| (r.owner_id, r))
            .collect();
        for owner_id in self.index.owners().await? {
            roots.entry(owner_id).or_insert(OwnerRoot {
                owner_id,
                size_bytes: 0,
                modified_at: None,
            });
        }

        let mut summaries = Vec::with_capacity(roots.len());
        for (owner_id, root) in roots {
            summaries.push(OwnerSummary {
                entry_count: self.index.count(owner_id).await?,
                root,
            });
        }
        Ok(summaries)
    }
}
