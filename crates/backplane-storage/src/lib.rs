//! # backplane-storage
//!
//! Entity store abstraction for the backplane server.
//!
//! This crate defines the traits and types that all store backends must
//! implement. It does not contain any implementations; the in-memory
//! reference backend lives in `backplane-db-memory`.
//!
//! The main traits are [`ModuleStore`] and [`CalculationStore`], which
//! define the persistence contract for:
//! - CRUD with optimistic concurrency (version counter per row)
//! - Paged and filtered reads
//! - Derived lookups (by name, by tag, by date window, by threshold)
//! - Bulk flag updates and bulk deletes by age

pub mod traits;
pub mod types;

pub use traits::{CalculationStore, ModuleStore};
pub use types::{
    CalculationFilter, DEFAULT_PAGE_SIZE, ModuleFilter, OperationAverage, Page, PageRequest,
    SortDirection,
};
