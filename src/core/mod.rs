pub mod config;
pub mod error;

pub use config::{OrchestratorConfig, RegistryConfig, RuntimeConfig};
pub use error::{CoreError, Result};
