//! Entity store traits.
//!
//! This module defines the persistence contract that all store backends
//! must implement. Implementations must be thread-safe (`Send + Sync`);
//! services hold them as `Arc<dyn ModuleStore>` / `Arc<dyn CalculationStore>`.

use async_trait::async_trait;
use backplane_core::{
    CalculationDraft, CalculationPatch, CalculationRecord, Module, ModuleDraft, ModulePatch,
    Operation, Result,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::{CalculationFilter, ModuleFilter, OperationAverage, Page, PageRequest};

/// Persistence boundary for modules.
///
/// Writes follow the optimistic-concurrency contract: `update` and a
/// versioned `partial_update` compare the caller's version against the
/// stored one atomically and reject stale writes with
/// `CoreError::VersionConflict`; a successful write increments the
/// version and refreshes `last_modified_at`.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Persists a new module built from the draft.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` when a field violates its
    /// constraints and `CoreError::DuplicateName` when the name is
    /// already taken (case-insensitive).
    async fn create(&self, draft: ModuleDraft) -> Result<Module>;

    /// Reads a module by id. Returns `None` when it does not exist.
    async fn get(&self, id: Uuid) -> Result<Option<Module>>;

    /// Reads one page. Default order is by identifier ascending.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an unknown sort field.
    async fn get_page(&self, page: &PageRequest) -> Result<Page<Module>>;

    /// Replaces a stored module.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown id,
    /// `CoreError::VersionConflict` for a stale version and
    /// `CoreError::DuplicateName` when renaming onto a taken name.
    async fn update(&self, module: Module) -> Result<Module>;

    /// Merges the present patch fields into a stored module.
    ///
    /// Returns `None` for an unknown id. A patch carrying a version is
    /// subject to the same concurrency contract as `update`.
    async fn partial_update(&self, id: Uuid, patch: ModulePatch) -> Result<Option<Module>>;

    /// Removes a module. Idempotent at this layer: returns whether a
    /// row was actually removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Filtered page; unset filters are ignored.
    async fn search(&self, filter: &ModuleFilter, page: &PageRequest) -> Result<Page<Module>>;

    /// Sets the active flag on each given id independently (no cross-row
    /// transaction). Unknown ids are skipped. Returns the number of rows
    /// whose flag actually changed.
    async fn bulk_update_active(&self, ids: &[Uuid], active: bool) -> Result<u64>;

    async fn count(&self) -> Result<u64>;

    /// Case-insensitive name existence check.
    async fn exists_by_name(&self, name: &str) -> Result<bool>;

    /// Case-insensitive name lookup.
    async fn find_by_name(&self, name: &str) -> Result<Option<Module>>;

    /// All modules in default order.
    async fn find_all(&self) -> Result<Vec<Module>>;

    /// All modules with the active flag set.
    async fn find_active(&self) -> Result<Vec<Module>>;

    /// Modules carrying the given access level tag (case-insensitive).
    async fn find_by_access_level(&self, access_level: &str) -> Result<Vec<Module>>;

    /// Modules for the given ids; unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Module>>;

    /// Modules created at or after the cutoff.
    async fn find_created_since(&self, cutoff: OffsetDateTime) -> Result<Vec<Module>>;

    /// Name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Persistence boundary for calculation records.
///
/// Same optimistic-concurrency contract as [`ModuleStore`].
#[async_trait]
pub trait CalculationStore: Send + Sync {
    /// Persists a new record; the result is recomputed from the draft.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for constraint violations and
    /// `CoreError::DivisionByZero` for a divide draft with a zero
    /// divisor (such a record is never persisted).
    async fn create(&self, draft: CalculationDraft) -> Result<CalculationRecord>;

    /// Reads a record by id. Returns `None` when it does not exist.
    async fn get(&self, id: Uuid) -> Result<Option<CalculationRecord>>;

    /// Reads one page. Default order is by identifier ascending.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an unknown sort field.
    async fn get_page(&self, page: &PageRequest) -> Result<Page<CalculationRecord>>;

    /// Replaces a stored record.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for an unknown id and
    /// `CoreError::VersionConflict` for a stale version.
    async fn update(&self, record: CalculationRecord) -> Result<CalculationRecord>;

    /// Merges the present patch fields into a stored record.
    ///
    /// Returns `None` for an unknown id.
    async fn partial_update(
        &self,
        id: Uuid,
        patch: CalculationPatch,
    ) -> Result<Option<CalculationRecord>>;

    /// Removes a record. Returns whether a row was actually removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Filtered page; unset filters are ignored.
    async fn search(
        &self,
        filter: &CalculationFilter,
        page: &PageRequest,
    ) -> Result<Page<CalculationRecord>>;

    /// Sets the active flag on each given id independently. Returns the
    /// number of rows whose flag actually changed.
    async fn bulk_update_active(&self, ids: &[Uuid], active: bool) -> Result<u64>;

    async fn count(&self) -> Result<u64>;

    /// Records carrying the given operation tag.
    async fn find_by_operation(&self, operation: Operation) -> Result<Vec<CalculationRecord>>;

    /// Records whose result exceeds the threshold.
    async fn find_result_above(&self, threshold: f64) -> Result<Vec<CalculationRecord>>;

    /// Records created within the given window (inclusive bounds).
    async fn find_created_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<CalculationRecord>>;

    /// The most recent records, newest first.
    async fn find_recent(&self, limit: usize) -> Result<Vec<CalculationRecord>>;

    /// All records with the active flag set.
    async fn find_active(&self) -> Result<Vec<CalculationRecord>>;

    async fn count_by_operation(&self, operation: Operation) -> Result<u64>;

    /// Whether a record with these exact inputs already exists.
    async fn exists_by_inputs(
        &self,
        operand1: f64,
        operand2: f64,
        operation: Operation,
    ) -> Result<bool>;

    /// Removes records created before the cutoff. Returns the number of
    /// rows removed.
    async fn delete_created_before(&self, cutoff: OffsetDateTime) -> Result<u64>;

    /// Average result grouped by operation tag, for tags that occur.
    async fn average_result_by_operation(&self) -> Result<Vec<OperationAverage>>;

    /// Name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

// Ensure traits are object-safe by using them as trait objects
#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that ModuleStore is object-safe
    fn _assert_module_store_object_safe(_: &dyn ModuleStore) {}

    // Compile-time test that CalculationStore is object-safe
    fn _assert_calculation_store_object_safe(_: &dyn CalculationStore) {}
}
