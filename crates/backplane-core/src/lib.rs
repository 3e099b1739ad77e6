pub mod calculation;
pub mod error;
pub mod module;

pub use calculation::{CalculationDraft, CalculationPatch, CalculationRecord, Operation};
pub use error::{CoreError, ErrorCategory, Result};
pub use module::{Module, ModuleDraft, ModulePatch};
