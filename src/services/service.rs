use crate::core::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Licensed product edition, ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Edition {
    #[default]
    Community,
    Basic,
    SmallBusiness,
    Enterprise,
}

impl Edition {
    /// Whether a feature requiring `required` may run under this edition.
    pub fn permits(&self, required: Edition) -> bool {
        required <= *self
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edition::Community => write!(f, "Community"),
            Edition::Basic => write!(f, "Basic"),
            Edition::SmallBusiness => write!(f, "Small Business"),
            Edition::Enterprise => write!(f, "Enterprise"),
        }
    }
}

/// What a service sees while it initializes.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    name: String,
    edition: Edition,
    settings: Arc<HashMap<String, String>>,
}

impl ServiceContext {
    pub fn new(name: &str, edition: Edition, settings: Arc<HashMap<String, String>>) -> Self {
        Self {
            name: name.to_string(),
            edition,
            settings,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.name
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// A pluggable subsystem brought up by the orchestrator.
///
/// `initialize` returning `Ok(false)` and returning `Err` are treated alike:
/// both count as a failed attempt against the retry budget.
#[async_trait]
pub trait Service: Send + Sync {
    async fn initialize(&mut self, ctx: &ServiceContext) -> Result<bool>;

    /// Called once after the service is running.
    async fn initialized(&mut self) {}

    async fn shutdown(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    /// A vital service that cannot start terminates the process.
    fn is_vital(&self) -> bool {
        false
    }

    fn retry_count(&self) -> u32 {
        DEFAULT_RETRY_COUNT
    }

    fn retry_delay(&self) -> Duration {
        DEFAULT_RETRY_DELAY
    }

    fn required_edition(&self) -> Edition {
        Edition::Community
    }

    /// Long-running services expose their background loop here.
    fn background(&mut self) -> Option<&mut dyn BackgroundService> {
        None
    }
}

/// Background loop of a long-running service.
#[async_trait]
pub trait BackgroundService: Send + Sync {
    fn run_on_startup(&self) -> bool {
        true
    }

    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;
}
