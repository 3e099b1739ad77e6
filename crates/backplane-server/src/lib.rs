pub mod cache;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod services;
pub mod state;

pub use cache::{CacheBackend, EntityCache};
pub use config::{
    AppConfig, AuthSettings, CacheConfig, LoggingConfig, OAuthSettings, PaginationConfig,
    ServerConfig, SessionSettings,
};
pub use observability::init_tracing;
pub use server::{BackplaneServer, build_app};
pub use services::{CalculatorService, ModuleService};
pub use state::{AppState, AuthComponents};
