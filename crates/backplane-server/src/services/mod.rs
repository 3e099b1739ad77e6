//! Domain services layered between the HTTP handlers and the stores.

pub mod calculator;
pub mod module;

pub use calculator::CalculatorService;
pub use module::ModuleService;
