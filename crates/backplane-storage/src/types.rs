//! Pagination and filter types shared by all entity stores.

use backplane_core::{CalculationRecord, Module, Operation};
use serde::{Deserialize, Serialize};

/// Default page size when none is requested.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Sort direction for paged reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_descending(&self) -> bool {
        matches!(self, Self::Desc)
    }

    /// Parses a direction tag case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// A page request: zero-based page number, page size and an optional
/// sort field. Stores sort by identifier ascending when no field is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
    pub sort: Option<String>,
    pub direction: SortDirection,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: None,
            direction: SortDirection::Asc,
        }
    }
}

impl PageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Number of rows to skip before this page starts.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

/// One page of results together with the total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: usize,
    pub size: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            size: request.size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Total number of pages for this page size.
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total.div_ceil(self.size as u64)
    }

    pub fn has_more(&self) -> bool {
        ((self.page as u64) + 1) < self.total_pages()
    }

    /// Converts the page items, keeping the paging envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}

/// Optional filters for module search. Unset filters are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleFilter {
    /// Case-insensitive name fragment.
    pub name: Option<String>,
    /// Exact access level tag, matched case-insensitively.
    pub access_level: Option<String>,
}

impl ModuleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, fragment: impl Into<String>) -> Self {
        self.name = Some(fragment.into());
        self
    }

    #[must_use]
    pub fn with_access_level(mut self, access_level: impl Into<String>) -> Self {
        self.access_level = Some(access_level.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.access_level.is_none()
    }

    pub fn matches(&self, module: &Module) -> bool {
        if let Some(fragment) = &self.name
            && !module
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase())
        {
            return false;
        }
        if let Some(level) = &self.access_level {
            match &module.access_level {
                Some(tag) if tag.eq_ignore_ascii_case(level) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Optional filters for calculation history. Unset filters are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationFilter {
    pub operation: Option<Operation>,
    pub min_result: Option<f64>,
    pub max_result: Option<f64>,
}

impl CalculationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    #[must_use]
    pub fn with_min_result(mut self, min_result: f64) -> Self {
        self.min_result = Some(min_result);
        self
    }

    #[must_use]
    pub fn with_max_result(mut self, max_result: f64) -> Self {
        self.max_result = Some(max_result);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operation.is_none() && self.min_result.is_none() && self.max_result.is_none()
    }

    pub fn matches(&self, record: &CalculationRecord) -> bool {
        if let Some(operation) = self.operation
            && record.operation != operation
        {
            return false;
        }
        if let Some(min) = self.min_result
            && record.result < min
        {
            return false;
        }
        if let Some(max) = self.max_result
            && record.result > max
        {
            return false;
        }
        true
    }
}

/// Grouped average of calculation results per operation tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationAverage {
    pub operation: Operation,
    pub average_result: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use backplane_core::{CalculationDraft, ModuleDraft};

    #[test]
    fn test_page_request_defaults() {
        let request = PageRequest::new();
        assert_eq!(request.page, 0);
        assert_eq!(request.size, DEFAULT_PAGE_SIZE);
        assert!(request.sort.is_none());
        assert_eq!(request.direction, SortDirection::Asc);
    }

    #[test]
    fn test_page_request_offset() {
        let request = PageRequest::new().with_page(2).with_size(20);
        assert_eq!(request.offset(), 40);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("asc"), Some(SortDirection::Asc));
        assert_eq!(SortDirection::parse("DESC"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::parse("sideways"), None);
    }

    #[test]
    fn test_page_math() {
        let request = PageRequest::new().with_size(20);
        let page = Page::new(vec![1u32; 20], 45, &request);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_more());

        let last = Page::new(vec![1u32; 5], 45, &request.with_page(2));
        assert_eq!(last.len(), 5);
        assert!(!last.has_more());
    }

    #[test]
    fn test_page_map_keeps_envelope() {
        let request = PageRequest::new().with_page(1).with_size(2);
        let page = Page::new(vec![1u32, 2], 10, &request).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 10);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn test_module_filter_name_fragment() {
        let module = backplane_core::Module::from_draft(ModuleDraft::new("Billing")).unwrap();
        assert!(ModuleFilter::new().with_name("ill").matches(&module));
        assert!(ModuleFilter::new().with_name("BILL").matches(&module));
        assert!(!ModuleFilter::new().with_name("audit").matches(&module));
        assert!(ModuleFilter::new().matches(&module));
    }

    #[test]
    fn test_module_filter_access_level() {
        let module = backplane_core::Module::from_draft(
            ModuleDraft::new("Billing").with_access_level("ADMIN"),
        )
        .unwrap();
        assert!(ModuleFilter::new().with_access_level("admin").matches(&module));
        assert!(!ModuleFilter::new().with_access_level("user").matches(&module));

        let untagged = backplane_core::Module::from_draft(ModuleDraft::new("Audit")).unwrap();
        assert!(!ModuleFilter::new().with_access_level("admin").matches(&untagged));
    }

    #[test]
    fn test_calculation_filter_bounds() {
        let record = backplane_core::CalculationRecord::from_draft(CalculationDraft::new(
            6.0,
            7.0,
            Operation::Multiply,
        ))
        .unwrap();

        assert!(CalculationFilter::new().matches(&record));
        assert!(CalculationFilter::new()
            .with_operation(Operation::Multiply)
            .with_min_result(40.0)
            .with_max_result(50.0)
            .matches(&record));
        assert!(!CalculationFilter::new().with_min_result(43.0).matches(&record));
        assert!(!CalculationFilter::new().with_max_result(41.0).matches(&record));
        assert!(!CalculationFilter::new()
            .with_operation(Operation::Add)
            .matches(&record));
    }

    #[test]
    fn test_sort_direction_serde() {
        assert_eq!(
            serde_json::to_string(&SortDirection::Desc).unwrap(),
            "\"desc\""
        );
        let direction: SortDirection = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(direction, SortDirection::Asc);
    }
}
