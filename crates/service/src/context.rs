use std::sync::Arc;

use models::TableStore;

use crate::cache::CacheProvider;
use crate::storage::StorageContext;

/// Storage and cache shared by every management.
#[derive(Clone)]
pub struct ManagementContext {
    pub storage: Arc<StorageContext>,
    pub cache: Arc<CacheProvider>,
}

impl ManagementContext {
    pub fn new(store: Arc<dyn TableStore>, cache: Arc<CacheProvider>) -> Self {
        Self { storage: Arc::new(StorageContext::new(store)), cache }
    }

    /// Memory backend with caching enabled.
    pub fn in_memory() -> Self {
        Self { storage: Arc::new(StorageContext::in_memory()), cache: Arc::new(CacheProvider::default()) }
    }
}
