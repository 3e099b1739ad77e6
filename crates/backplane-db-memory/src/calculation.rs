//! In-memory calculation store built on papaya's lock-free HashMap.

use std::sync::Arc;

use async_trait::async_trait;
use backplane_core::{
    CalculationDraft, CalculationPatch, CalculationRecord, CoreError, Operation as CalcOperation,
    Result,
};
use backplane_storage::{
    CalculationFilter, CalculationStore, OperationAverage, Page, PageRequest,
};
use papaya::{Compute, HashMap as PapayaHashMap, Operation};
use time::OffsetDateTime;
use uuid::Uuid;

/// Sort fields accepted by `get_page` and `search`.
const CALCULATION_SORT_FIELDS: &[&str] = &["id", "name", "created_at", "result", "operation"];

enum WriteAbort {
    Missing,
    Stale(i64),
}

/// Lock-free calculation store.
///
/// Labels are not unique, so there is no secondary index; everything
/// hangs off a single papaya map keyed by id.
pub struct InMemoryCalculationStore {
    rows: Arc<PapayaHashMap<Uuid, CalculationRecord>>,
}

impl InMemoryCalculationStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(PapayaHashMap::new()),
        }
    }

    fn snapshot(&self) -> Vec<CalculationRecord> {
        let rows = self.rows.pin();
        rows.iter().map(|(_, record)| record.clone()).collect()
    }

    fn sorted(
        mut items: Vec<CalculationRecord>,
        request: &PageRequest,
    ) -> Result<Vec<CalculationRecord>> {
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
            "result" => {
                items.sort_by(|a, b| a.result.total_cmp(&b.result).then(a.id.cmp(&b.id)));
            }
            "operation" => {
                items.sort_by(|a, b| {
                    a.operation
                        .as_str()
                        .cmp(b.operation.as_str())
                        .then(a.id.cmp(&b.id))
                });
            }
            other => {
                return Err(CoreError::validation(format!(
                    "unknown calculation sort field '{other}', expected one of: {}",
                    CALCULATION_SORT_FIELDS.join(", ")
                )));
            }
        }
        if request.direction.is_descending() {
            items.reverse();
        }
        Ok(items)
    }

    fn paginate(
        items: Vec<CalculationRecord>,
        request: &PageRequest,
    ) -> Result<Page<CalculationRecord>> {
        let total = items.len() as u64;
        let sorted = Self::sorted(items, request)?;
        let page_items = sorted
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .collect();
        Ok(Page::new(page_items, total, request))
    }

    fn newest_first(mut items: Vec<CalculationRecord>) -> Vec<CalculationRecord> {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        items
    }
}

impl Default for InMemoryCalculationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalculationStore for InMemoryCalculationStore {
    async fn create(&self, draft: CalculationDraft) -> Result<CalculationRecord> {
        let record = CalculationRecord::from_draft(draft)?;
        let rows = self.rows.pin();
        rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<CalculationRecord>> {
        let rows = self.rows.pin();
        Ok(rows.get(&id).cloned())
    }

    async fn get_page(&self, page: &PageRequest) -> Result<Page<CalculationRecord>> {
        Self::paginate(self.snapshot(), page)
    }

    async fn update(&self, record: CalculationRecord) -> Result<CalculationRecord> {
        record.validate()?;
        let rows = self.rows.pin();
        let swap = rows.compute(record.id, |entry| match entry {
            None => Operation::Abort(WriteAbort::Missing),
            Some((_, stored)) if stored.version == record.version => {
                let mut next = record.clone();
                next.created_at = stored.created_at;
                next.version = stored.version + 1;
                Operation::Insert(next)
            }
            Some((_, stored)) => Operation::Abort(WriteAbort::Stale(stored.version)),
        });
        match swap {
            Compute::Updated { new, .. } => Ok(new.1.clone()),
            Compute::Aborted(WriteAbort::Missing) => {
                Err(CoreError::not_found("Calculation", record.id.to_string()))
            }
            Compute::Aborted(WriteAbort::Stale(stored)) => Err(CoreError::version_conflict(
                "Calculation",
                record.id.to_string(),
                record.version,
                stored,
            )),
            _ => Err(CoreError::storage(
                "calculation row swap left the map in an unexpected state",
            )),
        }
    }

    async fn partial_update(
        &self,
        id: Uuid,
        patch: CalculationPatch,
    ) -> Result<Option<CalculationRecord>> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        loop {
            let Some(current) = self.get(id).await? else {
                return Ok(None);
            };
            if let Some(expected) = patch.version
                && expected != current.version
            {
                return Err(CoreError::version_conflict(
                    "Calculation",
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
        let rows = self.rows.pin();
        Ok(rows.remove(&id).is_some())
    }

    async fn search(
        &self,
        filter: &CalculationFilter,
        page: &PageRequest,
    ) -> Result<Page<CalculationRecord>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|record| filter.matches(record))
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

    async fn find_by_operation(&self, operation: CalcOperation) -> Result<Vec<CalculationRecord>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|record| record.operation == operation)
            .collect();
        Ok(Self::newest_first(items))
    }

    async fn find_result_above(&self, threshold: f64) -> Result<Vec<CalculationRecord>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|record| record.result > threshold)
            .collect();
        Ok(Self::newest_first(items))
    }

    async fn find_created_between(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<CalculationRecord>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|record| record.created_at >= from && record.created_at <= to)
            .collect();
        Ok(Self::newest_first(items))
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<CalculationRecord>> {
        let mut items = Self::newest_first(self.snapshot());
        items.truncate(limit);
        Ok(items)
    }

    async fn find_active(&self) -> Result<Vec<CalculationRecord>> {
        let items = self
            .snapshot()
            .into_iter()
            .filter(|record| record.active)
            .collect();
        Ok(Self::newest_first(items))
    }

    async fn count_by_operation(&self, operation: CalcOperation) -> Result<u64> {
        let rows = self.rows.pin();
        Ok(rows
            .iter()
            .filter(|(_, record)| record.operation == operation)
            .count() as u64)
    }

    async fn exists_by_inputs(
        &self,
        operand1: f64,
        operand2: f64,
        operation: CalcOperation,
    ) -> Result<bool> {
        let rows = self.rows.pin();
        Ok(rows.iter().any(|(_, record)| {
            record.operation == operation
                && record.operand1 == operand1
                && record.operand2 == operand2
        }))
    }

    async fn delete_created_before(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let expired: Vec<Uuid> = {
            let rows = self.rows.pin();
            rows.iter()
                .filter(|(_, record)| record.created_at < cutoff)
                .map(|(id, _)| *id)
                .collect()
        };
        let mut removed = 0;
        let rows = self.rows.pin();
        for id in expired {
            if rows.remove(&id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn average_result_by_operation(&self) -> Result<Vec<OperationAverage>> {
        let mut sums: std::collections::HashMap<CalcOperation, (f64, u64)> =
            std::collections::HashMap::new();
        {
            let rows = self.rows.pin();
            for (_, record) in rows.iter() {
                let entry = sums.entry(record.operation).or_insert((0.0, 0));
                entry.0 += record.result;
                entry.1 += 1;
            }
        }
        // Emit in the fixed operation order so output is deterministic.
        let averages = CalcOperation::ALL
            .iter()
            .filter_map(|operation| {
                sums.get(operation).map(|(sum, count)| OperationAverage {
                    operation: *operation,
                    average_result: sum / *count as f64,
                })
            })
            .collect();
        Ok(averages)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
