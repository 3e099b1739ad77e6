//! Module management service.
//!
//! Wraps the module store with a read-through cache. Every mutation
//! evicts the whole `modules` namespace, so cached listings, counts and
//! single-row lookups can never outlive a write.

use std::sync::Arc;

use backplane_core::error::{CoreError, Result};
use backplane_core::module::{Module, ModuleDraft, ModulePatch};
use backplane_storage::{ModuleFilter, ModuleStore, Page, PageRequest};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::{CacheBackend, EntityCache};

const NAMESPACE: &str = "modules";

/// How far back [`ModuleService::find_recent`] looks.
const RECENT_WINDOW_DAYS: i64 = 30;

pub struct ModuleService {
    store: Arc<dyn ModuleStore>,
    cache: EntityCache,
}

impl ModuleService {
    pub fn new(store: Arc<dyn ModuleStore>, backend: CacheBackend) -> Self {
        Self {
            store,
            cache: EntityCache::new(backend, NAMESPACE),
        }
    }

    pub async fn create(&self, draft: ModuleDraft) -> Result<Module> {
        let module = self.store.create(draft).await?;
        self.cache.evict_all();
        Ok(module)
    }

    /// Full replace. The store enforces the optimistic version check.
    pub async fn update(&self, module: Module) -> Result<Module> {
        let updated = self.store.update(module).await?;
        self.cache.evict_all();
        Ok(updated)
    }

    pub async fn partial_update(&self, id: Uuid, patch: ModulePatch) -> Result<Module> {
        match self.store.partial_update(id, patch).await? {
            Some(updated) => {
                self.cache.evict_all();
                Ok(updated)
            }
            None => Err(CoreError::not_found("Module", id.to_string())),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.store.delete(id).await? {
            self.cache.evict_all();
            Ok(())
        } else {
            Err(CoreError::not_found("Module", id.to_string()))
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Module>> {
        let key = format!("id:{id}");
        if let Some(hit) = self.cache.get::<Module>(&key) {
            return Ok(Some(hit));
        }
        let found = self.store.get(id).await?;
        if let Some(module) = &found {
            self.cache.put(&key, module);
        }
        Ok(found)
    }

    /// Paged listing. Pages are not cached; their permutations are
    /// unbounded.
    pub async fn find_page(&self, request: &PageRequest) -> Result<Page<Module>> {
        self.store.get_page(request).await
    }

    pub async fn find_all(&self) -> Result<Vec<Module>> {
        if let Some(hit) = self.cache.get::<Vec<Module>>("all") {
            return Ok(hit);
        }
        let modules = self.store.find_all().await?;
        self.cache.put("all", &modules);
        Ok(modules)
    }

    pub async fn find_active(&self) -> Result<Vec<Module>> {
        if let Some(hit) = self.cache.get::<Vec<Module>>("active") {
            return Ok(hit);
        }
        let modules = self.store.find_active().await?;
        self.cache.put("active", &modules);
        Ok(modules)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Module>> {
        let key = format!("name:{}", name.to_lowercase());
        if let Some(hit) = self.cache.get::<Module>(&key) {
            return Ok(Some(hit));
        }
        let found = self.store.find_by_name(name).await?;
        if let Some(module) = &found {
            self.cache.put(&key, module);
        }
        Ok(found)
    }

    pub async fn exists_by_name(&self, name: &str) -> Result<bool> {
        self.store.exists_by_name(name).await
    }

    pub async fn search(
        &self,
        filter: &ModuleFilter,
        request: &PageRequest,
    ) -> Result<Page<Module>> {
        self.store.search(filter, request).await
    }

    pub async fn count(&self) -> Result<u64> {
        if let Some(hit) = self.cache.get::<u64>("count") {
            return Ok(hit);
        }
        let count = self.store.count().await?;
        self.cache.put("count", &count);
        Ok(count)
    }

    /// Flips the active flag on every listed module, returning how many
    /// rows changed.
    pub async fn set_active_bulk(&self, ids: &[Uuid], active: bool) -> Result<u64> {
        let changed = self.store.bulk_update_active(ids, active).await?;
        self.cache.evict_all();
        Ok(changed)
    }

    /// Modules created inside the recency window, newest first.
    pub async fn find_recent(&self) -> Result<Vec<Module>> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(RECENT_WINDOW_DAYS);
        self.store.find_created_since(cutoff).await
    }
}
