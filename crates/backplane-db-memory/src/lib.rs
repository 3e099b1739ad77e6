//! In-memory storage backend for the backplane server.
//!
//! This crate implements the entity store traits from
//! `backplane-storage` and the auth store traits from `backplane-auth`,
//! using papaya lock-free HashMaps for concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use backplane_core::ModuleDraft;
//! use backplane_db_memory::InMemoryModuleStore;
//! use backplane_storage::ModuleStore;
//!
//! let store = InMemoryModuleStore::new();
//! let module = store
//!     .create(ModuleDraft::new("Billing").with_description("Invoices"))
//!     .await?;
//! ```

pub mod calculation;
pub mod module;
pub mod role;
pub mod session;
pub mod user;

// Re-export the store traits for convenience
pub use backplane_auth::storage::{RoleStore, SessionStore, UserStore};
pub use backplane_storage::{CalculationStore, ModuleStore};

pub use calculation::InMemoryCalculationStore;
pub use module::InMemoryModuleStore;
pub use role::InMemoryRoleStore;
pub use session::InMemorySessionStore;
pub use user::InMemoryUserStore;

/// Type alias for a shareable ModuleStore instance.
pub type DynModuleStore = std::sync::Arc<dyn ModuleStore>;

/// Type alias for a shareable CalculationStore instance.
pub type DynCalculationStore = std::sync::Arc<dyn CalculationStore>;

/// Creates a new in-memory ModuleStore instance.
#[must_use]
pub fn create_module_store() -> DynModuleStore {
    std::sync::Arc::new(InMemoryModuleStore::new())
}

/// Creates a new in-memory CalculationStore instance.
#[must_use]
pub fn create_calculation_store() -> DynCalculationStore {
    std::sync::Arc::new(InMemoryCalculationStore::new())
}
