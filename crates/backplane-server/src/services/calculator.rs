//! Calculator service.
//!
//! The arithmetic itself is pure and synchronous; persistence is a
//! separate, explicit step so callers decide which results become
//! history. Cached aggregates live in the `calculations` namespace and
//! are evicted whenever history changes.

use std::sync::Arc;

use backplane_core::calculation::{CalculationDraft, CalculationRecord, Operation};
use backplane_core::error::{CoreError, Result};
use backplane_storage::{CalculationFilter, CalculationStore, OperationAverage, Page, PageRequest, SortDirection};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::{CacheBackend, EntityCache};

const NAMESPACE: &str = "calculations";

pub struct CalculatorService {
    store: Arc<dyn CalculationStore>,
    cache: EntityCache,
}

impl CalculatorService {
    pub fn new(store: Arc<dyn CalculationStore>, backend: CacheBackend) -> Self {
        Self {
            store,
            cache: EntityCache::new(backend, NAMESPACE),
        }
    }

    pub fn add(&self, operand1: f64, operand2: f64) -> f64 {
        operand1 + operand2
    }

    pub fn subtract(&self, operand1: f64, operand2: f64) -> f64 {
        operand1 - operand2
    }

    pub fn multiply(&self, operand1: f64, operand2: f64) -> f64 {
        operand1 * operand2
    }

    /// Division rejects a zero divisor instead of producing infinities.
    pub fn divide(&self, operand1: f64, operand2: f64) -> Result<f64> {
        Operation::Divide.apply(operand1, operand2)
    }

    pub fn power(&self, base: f64, exponent: f64) -> f64 {
        base.powf(exponent)
    }

    pub fn percentage(&self, value: f64, percent: f64) -> f64 {
        value * percent / 100.0
    }

    /// Dispatches on an operation tag such as `"add"` or `"DIVIDE"`.
    pub fn perform(&self, operand1: f64, operand2: f64, operation: &str) -> Result<f64> {
        let operation = Operation::parse(operation)?;
        operation.apply(operand1, operand2)
    }

    /// Persists a computed result as a history record.
    pub async fn log_calculation(&self, draft: CalculationDraft) -> Result<CalculationRecord> {
        let record = self.store.create(draft).await?;
        self.cache.evict_all();
        Ok(record)
    }

    /// Filtered history page. Without an explicit sort, records come
    /// back newest first.
    pub async fn history(
        &self,
        filter: &CalculationFilter,
        request: &PageRequest,
    ) -> Result<Page<CalculationRecord>> {
        if request.sort.is_none() {
            let request = request
                .clone()
                .with_sort("created_at")
                .with_direction(SortDirection::Desc);
            return self.store.search(filter, &request).await;
        }
        self.store.search(filter, request).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CalculationRecord>> {
        let key = format!("id:{id}");
        if let Some(hit) = self.cache.get::<CalculationRecord>(&key) {
            return Ok(Some(hit));
        }
        let found = self.store.get(id).await?;
        if let Some(record) = &found {
            self.cache.put(&key, record);
        }
        Ok(found)
    }

    pub async fn find_active(&self) -> Result<Vec<CalculationRecord>> {
        if let Some(hit) = self.cache.get::<Vec<CalculationRecord>>("active") {
            return Ok(hit);
        }
        let records = self.store.find_active().await?;
        self.cache.put("active", &records);
        Ok(records)
    }

    pub async fn count(&self) -> Result<u64> {
        if let Some(hit) = self.cache.get::<u64>("count") {
            return Ok(hit);
        }
        let count = self.store.count().await?;
        self.cache.put("count", &count);
        Ok(count)
    }

    pub async fn count_by_operation(&self, operation: Operation) -> Result<u64> {
        let key = format!("count:{}", operation.as_str());
        if let Some(hit) = self.cache.get::<u64>(&key) {
            return Ok(hit);
        }
        let count = self.store.count_by_operation(operation).await?;
        self.cache.put(&key, &count);
        Ok(count)
    }

    /// Most recent records, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<CalculationRecord>> {
        self.store.find_recent(limit).await
    }

    /// Mean result per operation over all history.
    pub async fn averages(&self) -> Result<Vec<OperationAverage>> {
        self.store.average_result_by_operation().await
    }

    /// Drops history older than the cutoff, returning how many records
    /// were removed.
    pub async fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<u64> {
        let removed = self.store.delete_created_before(cutoff).await?;
        if removed > 0 {
            self.cache.evict_all();
        }
        Ok(removed)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.store.delete(id).await? {
            self.cache.evict_all();
            Ok(())
        } else {
            Err(CoreError::not_found("CalculationRecord", id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use backplane_db_memory::create_calculation_store;

    use super::*;

    fn service() -> CalculatorService {
        CalculatorService::new(create_calculation_store(), CacheBackend::local(None))
    }

    #[test]
    fn pure_arithmetic() {
        let service = service();
        assert_eq!(service.add(2.0, 3.0), 5.0);
        assert_eq!(service.subtract(10.0, 4.0), 6.0);
        assert_eq!(service.multiply(6.0, 7.0), 42.0);
        assert_eq!(service.divide(10.0, 4.0).unwrap(), 2.5);
        assert_eq!(service.power(2.0, 10.0), 1024.0);
        assert_eq!(service.percentage(200.0, 15.0), 30.0);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let service = service();
        let err = service.divide(10.0, 0.0).unwrap_err();
        assert!(matches!(err, CoreError::DivisionByZero));
    }

    #[test]
    fn perform_dispatches_case_insensitively() {
        let service = service();
        assert_eq!(service.perform(2.0, 3.0, "add").unwrap(), 5.0);
        assert_eq!(service.perform(2.0, 3.0, "MULTIPLY").unwrap(), 6.0);
        let err = service.perform(2.0, 3.0, "modulo").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn history_defaults_to_newest_first() {
        let service = service();
        for (a, b) in [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)] {
            service
                .log_calculation(CalculationDraft::new(a, b, Operation::Add))
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let page = service
            .history(&CalculationFilter::new(), &PageRequest::new())
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].operand1, 3.0);
        assert_eq!(page.items[2].operand1, 1.0);
    }

    #[tokio::test]
    async fn history_respects_an_explicit_sort() {
        let service = service();
        for (a, b) in [(9.0, 1.0), (1.0, 1.0), (5.0, 1.0)] {
            service
                .log_calculation(CalculationDraft::new(a, b, Operation::Add))
                .await
                .unwrap();
        }

        let request = PageRequest::new().with_sort("result");
        let page = service
            .history(&CalculationFilter::new(), &request)
            .await
            .unwrap();
        assert_eq!(page.items[0].operand1, 1.0);
        assert_eq!(page.items[2].operand1, 9.0);
    }

    #[tokio::test]
    async fn history_filters_by_operation_and_result_range() {
        let service = service();
        service
            .log_calculation(CalculationDraft::new(2.0, 3.0, Operation::Add))
            .await
            .unwrap();
        service
            .log_calculation(CalculationDraft::new(2.0, 30.0, Operation::Multiply))
            .await
            .unwrap();

        let filter = CalculationFilter::new().with_operation(Operation::Multiply);
        let page = service.history(&filter, &PageRequest::new()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].result, 60.0);

        let filter = CalculationFilter::new().with_min_result(10.0);
        let page = service.history(&filter, &PageRequest::new()).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn count_caches_are_evicted_by_logging() {
        let service = service();
        service
            .log_calculation(CalculationDraft::new(2.0, 3.0, Operation::Add))
            .await
            .unwrap();
        assert_eq!(service.count().await.unwrap(), 1);
        assert_eq!(service.count_by_operation(Operation::Add).await.unwrap(), 1);

        service
            .log_calculation(CalculationDraft::new(4.0, 5.0, Operation::Add))
            .await
            .unwrap();
        assert_eq!(service.count().await.unwrap(), 2);
        assert_eq!(service.count_by_operation(Operation::Add).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn averages_and_recent() {
        let service = service();
        service
            .log_calculation(CalculationDraft::new(2.0, 4.0, Operation::Add))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        service
            .log_calculation(CalculationDraft::new(4.0, 8.0, Operation::Add))
            .await
            .unwrap();

        let averages = service.averages().await.unwrap();
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].operation, Operation::Add);
        assert_eq!(averages[0].average_result, 9.0);

        let recent = service.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].operand1, 4.0);
    }

    #[tokio::test]
    async fn purge_removes_old_history() {
        let service = service();
        service
            .log_calculation(CalculationDraft::new(2.0, 3.0, Operation::Add))
            .await
            .unwrap();

        let future_cutoff = OffsetDateTime::now_utc() + time::Duration::hours(1);
        assert_eq!(service.purge_older_than(future_cutoff).await.unwrap(), 1);
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let service = service();
        let err = service.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
