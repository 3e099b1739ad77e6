//! In-memory module store built on papaya's lock-free HashMap.

use std::sync::Arc;

use async_trait::async_trait;
use backplane_core::{CoreError, Module, ModuleDraft, ModulePatch, Result};
use backplane_storage::{ModuleFilter, ModuleStore, Page, PageRequest};
use papaya::{Compute, HashMap as PapayaHashMap, Operation};
use time::OffsetDateTime;
use uuid::Uuid;

/// Sort fields accepted by `get_page` and `search`.
const MODULE_SORT_FIELDS: &[&str] = &["id", "name", "created_at", "last_modified_at"];

/// Why a version-checked row swap did not go through.
enum WriteAbort {
    Missing,
    Stale(i64),
}

/// Lock-free module store.
///
/// Rows live in a papaya map keyed by id. A second map from lowercased
/// name to owning id enforces case-insensitive name uniqueness: writers
/// claim the name entry first, then swap the row, so two concurrent
/// creates (or renames) to the same name cannot both win.
pub struct InMemoryModuleStore {
    rows: Arc<PapayaHashMap<Uuid, Module>>,
    names: Arc<PapayaHashMap<String, Uuid>>,
}

impl InMemoryModuleStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(PapayaHashMap::new()),
            names: Arc::new(PapayaHashMap::new()),
        }
    }

    fn name_key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Claims a name entry for `owner`. Fails when another id holds it.
    fn claim_name(&self, key: String, owner: Uuid, display: &str) -> Result<()> {
        let names = self.names.pin();
        let claim = names.compute(key, |entry| match entry {
            None => Operation::Insert(owner),
            Some((_, held_by)) if *held_by == owner => Operation::Abort(true),
            Some(_) => Operation::Abort(false),
        });
        match claim {
            Compute::Aborted(false) => Err(CoreError::duplicate_name("Module", display)),
            _ => Ok(()),
        }
    }

    /// Drops a name entry, but only while it still points at `owner`.
    fn release_name(&self, key: &str, owner: Uuid) {
        let names = self.names.pin();
        names.compute(key.to_string(), |entry| match entry {
            Some((_, held_by)) if *held_by == owner => Operation::Remove,
            _ => Operation::Abort(()),
        });
    }

    fn snapshot(&self) -> Vec<Module> {
        let rows = self.rows.pin();
        rows.iter().map(|(_, module)| module.clone()).collect()
    }

    fn sorted(mut items: Vec<Module>, request: &PageRequest) -> Result<Vec<Module>> {
        let field = request.sort.as_deref().unwrap_or("id");
        match field {
            "id" => items.sort_by(|a, b| a.id.cmp(&b.id)),
            "name" => items.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then(a.id.cmp(&b.id))
            }),
            "created_at" => {
                items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            }
            "last_modified_at" => {
                items.sort_by(|a, b| {
                    a.last_modified_at
                        .cmp(&b.last_modified_at)
                        .then(a.id.cmp(&b.id))
                });
            }
            other => {
                return Err(CoreError::validation(format!(
                    "unknown module sort field '{other}', expected one of: {}",
                    MODULE_SORT_FIELDS.join(", ")
                )));
            }
        }
        if request.direction.is_descending() {
            items.reverse();
        }
        Ok(items)
    }

    fn paginate(items: Vec<Module>, request: &PageRequest) -> Result<Page<Module>> {
        let total = items.len() as u64;
        let sorted = Self::sorted(items, request)?;
        let page_items = sorted
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .collect();
        Ok(Page::new(page_items, total, request))
    }
}

impl Default for InMemoryModuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    async fn create(&self, draft: ModuleDraft) -> Result<Module> {
        let module = Module::from_draft(draft)?;
        self.claim_name(Self::name_key(&module.name), module.id, &module.name)?;
        let rows = self.rows.pin();
        rows.insert(module.id, module.clone());
        Ok(module)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Module>> {
        let rows = self.rows.pin();
        Ok(rows.get(&id).cloned())
    }

    async fn get_page(&self, page: &PageRequest) -> Result<Page<Module>> {
        Self::paginate(self.snapshot(), page)
    }

    async fn update(&self, module: Module) -> Result<Module> {
        module.validate()?;
        let new_key = Self::name_key(&module.name);

        let current = {
            let rows = self.rows.pin();
            rows.get(&module.id).cloned()
        };
        let Some(current) = current else {
            return Err(CoreError::not_found("Module", module.id.to_string()));
        };

        // A rename claims the new name entry before the row swap so that
        // concurrent renames to the same name cannot both succeed.
        let renamed = new_key != Self::name_key(&current.name);
        if renamed {
            self.claim_name(new_key.clone(), module.id, &module.name)?;
        }

        let outcome = {
            let rows = self.rows.pin();
            let swap = rows.compute(module.id, |entry| match entry {
                None => Operation::Abort(WriteAbort::Missing),
                Some((_, stored)) if stored.version == module.version => {
                    let mut next = module.clone();
                    next.created_at = stored.created_at;
                    next.last_modified_at = OffsetDateTime::now_utc();
                    next.version = stored.version + 1;
                    Operation::Insert(next)
                }
                Some((_, stored)) => Operation::Abort(WriteAbort::Stale(stored.version)),
            });
            match swap {
                Compute::Updated { old, new } => Ok((Self::name_key(&old.1.name), new.1.clone())),
                Compute::Aborted(WriteAbort::Missing) => {
                    Err(CoreError::not_found("Module", module.id.to_string()))
                }
                Compute::Aborted(WriteAbort::Stale(stored)) => Err(CoreError::version_conflict(
                    "Module",
                    module.id.to_string(),
                    module.version,
                    stored,
                )),
                _ => Err(CoreError::storage("module row swap left the map in an unexpected state")),
            }
        };

        match outcome {
            Ok((replaced_key, updated)) => {
                if replaced_key != new_key {
                    self.release_name(&replaced_key, module.id);
                }
                Ok(updated)
            }
            Err(err) => {
                if renamed {
                    self.release_name(&new_key, module.id);
                }
                Err(err)
            }
        }
    }

    async fn partial_update(&self, id: Uuid, patch: ModulePatch) -> Result<Option<Module>> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        // Retry on interleaved writers when the patch does not pin a
        // version; a pinned version turns a lost race into a conflict.
        loop {
            let Some(current) = self.get(id).await? else {
                return Ok(None);
            };
            if let Some(expected) = patch.version
                && expected != current.version
            {
                return Err(CoreError::version_conflict(
                    "Module",
                    id.to_string(),
                    expected,
                    current.version,
                ));
            }
            let mut next = current.clone();
            patch.apply(&mut next);
            next.version = current.version;
            match self.update(next).await {
                Ok(updated) => return Ok(Some(updated)),
                Err(CoreError::VersionConflict { .. }) if patch.version.is_none() => continue,
                Err(CoreError::NotFound { .. }) => return Ok(None),
                Err(err) => return Err(err),
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = {
            let rows = self.rows.pin();
            rows.remove(&id).cloned()
        };
        match removed {
            Some(module) => {
                self.release_name(&Self::name_key(&module.name), id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search(&self, filter: &ModuleFilter, page: &PageRequest) -> Result<Page<Module>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|module| filter.matches(module))
            .collect();
        Self::paginate(items, page)
    }

    async fn bulk_update_active(&self, ids: &[Uuid], active: bool) -> Result<u64> {
        let mut changed = 0;
        let rows = self.rows.pin();
        for id in ids {
            let swap = rows.compute(*id, |entry| match entry {
                Some((_, stored)) if stored.active != active => {
                    let mut next = stored.clone();
                    next.active = active;
                    next.last_modified_at = OffsetDateTime::now_utc();
                    next.version = stored.version + 1;
                    Operation::Insert(next)
                }
                _ => Operation::Abort(()),
            });
            if matches!(swap, Compute::Updated { .. }) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count(&self) -> Result<u64> {
        let rows = self.rows.pin();
        Ok(rows.len() as u64)
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        let names = self.names.pin();
        Ok(names.contains_key(&Self::name_key(name)))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Module>> {
        let id = {
            let names = self.names.pin();
            names.get(&Self::name_key(name)).copied()
        };
        match id {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<Module>> {
        Self::sorted(self.snapshot(), &PageRequest::new())
    }

    async fn find_active(&self) -> Result<Vec<Module>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|module| module.active)
            .collect();
        Self::sorted(items, &PageRequest::new())
    }

    async fn find_by_access_level(&self, access_level: &str) -> Result<Vec<Module>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|module| {
                module
                    .access_level
                    .as_deref()
                    .is_some_and(|level| level.eq_ignore_ascii_case(access_level))
            })
            .collect();
        Self::sorted(items, &PageRequest::new())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Module>> {
        let rows = self.rows.pin();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn find_created_since(&self, cutoff: OffsetDateTime) -> Result<Vec<Module>> {
        let mut items: Vec<Module> = self
            .snapshot()
            .into_iter()
            .filter(|module| module.created_at >= cutoff)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
