use super::Service;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type ServiceFactory = Arc<dyn Fn() -> Box<dyn Service> + Send + Sync>;

/// Effective start settings: descriptor overrides, else the service's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPolicy {
    pub vital: bool,
    pub retry_count: u32,
    pub retry_delay: Duration,
}

/// Catalog entry for one startable service implementation.
#[derive(Clone)]
pub struct ServiceDescriptor {
    name: String,
    factory: ServiceFactory,
    depends_on: Option<String>,
    vital: Option<bool>,
    retry_count: Option<u32>,
    retry_delay: Option<Duration>,
    storage_layer: bool,
}

impl ServiceDescriptor {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Service> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            depends_on: None,
            vital: None,
            retry_count: None,
            retry_delay: None,
            storage_layer: false,
        }
    }

    /// Descriptor for a service constructed with `Default`.
    pub fn of<S>(name: impl Into<String>) -> Self
    where
        S: Service + Default + 'static,
    {
        Self::new(name, || Box::new(S::default()))
    }

    /// Declare the service this one must start after.
    pub fn depends_on(mut self, service: impl Into<String>) -> Self {
        self.depends_on = Some(service.into());
        self
    }

    pub fn vital(mut self, vital: bool) -> Self {
        self.vital = Some(vital);
        self
    }

    pub fn retries(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = Some(count);
        self.retry_delay = Some(delay);
        self
    }

    /// Restarting this service re-scans the type registry.
    pub fn storage_layer(mut self) -> Self {
        self.storage_layer = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependency(&self) -> Option<&str> {
        self.depends_on.as_deref()
    }

    pub fn is_storage_layer(&self) -> bool {
        self.storage_layer
    }

    pub fn instantiate(&self) -> Box<dyn Service> {
        (self.factory)()
    }

    pub fn start_policy(&self, service: &dyn Service) -> StartPolicy {
        StartPolicy {
            vital: self.vital.unwrap_or_else(|| service.is_vital()),
            retry_count: self.retry_count.unwrap_or_else(|| service.retry_count()),
            retry_delay: self.retry_delay.unwrap_or_else(|| service.retry_delay()),
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("vital", &self.vital)
            .field("retry_count", &self.retry_count)
            .field("retry_delay", &self.retry_delay)
            .field("storage_layer", &self.storage_layer)
            .finish()
    }
}
