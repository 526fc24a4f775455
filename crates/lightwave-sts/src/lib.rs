pub mod config;
pub mod directory;
pub mod observability;
pub mod server;

pub use config::{StsConfig, TenantConfig};
pub use directory::{DirectoryError, StaticDirectory};
pub use observability::init_tracing;
pub use server::{ServerBuilder, StsServer, build_app};
