//! Service wiring shared by the binaries and the integration tests.

use std::sync::Arc;

use tracing::info;

use treehub_core::config::AppConfig;
use treehub_core::result::AppResult;
use treehub_database::migration::run_migrations;
use treehub_database::{DatabasePool, EntryRepository, NamespaceIndex};
use treehub_storage::PhysicalStore;

use crate::admin::{AdminService, Reconciler};
use crate::locks::OwnerLocks;
use crate::namespace::{BrowseService, NamespaceService};

/// Every service, built over one index, one store and one lock table.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    /// Namespace mutations.
    pub namespace: NamespaceService,
    /// Read-only views and downloads.
    pub browse: BrowseService,
    /// Cross-owner overview.
    pub admin: AdminService,
    /// Index repair pass.
    pub reconciler: Reconciler,
    /// The index the services share.
    pub index: Arc<dyn NamespaceIndex>,
    /// The physical store the services share.
    pub store: Arc<PhysicalStore>,
}

impl ServiceContext {
    /// Wire services over an existing index and store.
    pub fn new(index: Arc<dyn NamespaceIndex>, store: Arc<PhysicalStore>) -> Self {
        let locks = Arc::new(OwnerLocks::new());
        Self {
            namespace: NamespaceService::new(index.clone(), store.clone(), locks.clone()),
            browse: BrowseService::new(index.clone(), store.clone()),
            admin: AdminService::new(index.clone(), store.clone()),
            reconciler: Reconciler::new(index.clone(), store.clone(), locks),
            index,
            store,
        }
    }

    /// Connect to the database, apply migrations, open the physical store
    /// and wire every service.
    pub async fn connect(config: &AppConfig) -> AppResult<(Self, DatabasePool)> {
        let db = DatabasePool::connect(&config.database).await?;
        run_migrations(db.pool()).await?;

        let store = PhysicalStore::new(&config.storage).await?;
        let index: Arc<dyn NamespaceIndex> = Arc::new(EntryRepository::new(db.pool().clone()));

        info!("Services initialized");
        Ok((Self::new(index, Arc::new(store)), db))
    }
}
