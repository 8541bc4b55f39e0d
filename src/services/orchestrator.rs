use super::{Service, ServiceContext, ServiceDescriptor};
use crate::core::{CoreError, OrchestratorConfig, Result};
use crate::schema::TypeRegistry;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;
use tracing::{Instrument, Level, event, info_span};

/// Dependency chains deeper than this are clamped when ordering start-up.
pub const MAX_DEPENDENCY_DEPTH: usize = 10;

/// Invoked when a vital service cannot be started.
pub type AbortHandler = Arc<dyn Fn(&str, &CoreError) + Send + Sync>;

/// Result of one start request that did not abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// The licensed edition is below what the service requires.
    NotPermitted,
    /// Initialized, but the service did not report itself running.
    NotRunning,
    /// Retry budget exhausted on a non-vital service.
    Failed,
}

/// Administrative lifecycle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    Start,
    Stop,
    Restart,
}

impl FromStr for ServiceCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ServiceCommand::Start),
            "stop" => Ok(ServiceCommand::Stop),
            "restart" => Ok(ServiceCommand::Restart),
            _ => Err(CoreError::UnknownCommand(s.to_string())),
        }
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceCommand::Start => write!(f, "start"),
            ServiceCommand::Stop => write!(f, "stop"),
            ServiceCommand::Restart => write!(f, "restart"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Start(StartOutcome),
    /// `true` if a running instance was shut down.
    Stop(bool),
}

fn exit_process(service: &str, cause: &CoreError) {
    event!(Level::ERROR, service, error = %cause, "vital service failed, terminating process");
    std::process::exit(1);
}

fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

async fn stop_instance(name: &str, service: &mut dyn Service) {
    if let Some(background) = service.background() {
        if let Err(err) = background.stop().await {
            event!(Level::WARN, service = %name, error = %err, "background loop failed to stop");
        }
    }
    if let Err(err) = service.shutdown().await {
        event!(Level::WARN, service = %name, error = %err, "service shutdown reported an error");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "initialize panicked".to_string()
    }
}

/// Brings configured services up in dependency order and tears them down in
/// reverse.
///
/// The catalog is filled during bring-up through `&mut self`; everything after
/// that works through `&self`, so the orchestrator can be shared behind an
/// `Arc` by an administrative surface. Start, stop and restart of one name
/// are serialized on a per-name lifecycle lock; different names proceed
/// concurrently.
pub struct ServiceOrchestrator {
    config: OrchestratorConfig,
    settings: Arc<HashMap<String, String>>,
    catalog: HashMap<String, ServiceDescriptor>,
    lifecycle: HashMap<String, Mutex<()>>,
    running: Mutex<HashMap<String, Box<dyn Service>>>,
    abort_handler: AbortHandler,
    type_registry: Option<Arc<TypeRegistry>>,
}

impl ServiceOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let settings = Arc::new(config.settings.clone());
        Self {
            config,
            settings,
            catalog: HashMap::new(),
            lifecycle: HashMap::new(),
            running: Mutex::new(HashMap::new()),
            abort_handler: Arc::new(exit_process),
            type_registry: None,
        }
    }

    /// Replace the process-exit abort path, e.g. to observe aborts in tests.
    pub fn with_abort_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &CoreError) + Send + Sync + 'static,
    {
        self.abort_handler = Arc::new(handler);
        self
    }

    /// Registry re-scanned when a storage-layer service restarts.
    pub fn with_type_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.type_registry = Some(registry);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn register_service_type(&mut self, descriptor: ServiceDescriptor) {
        let name = descriptor.name().to_string();
        self.lifecycle.entry(name.clone()).or_default();
        if self.catalog.insert(name.clone(), descriptor).is_some() {
            event!(Level::WARN, service = %name, "service type re-registered, replacing previous descriptor");
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.catalog.get(name)
    }

    /// Length of the declared dependency chain, clamped at `MAX_DEPENDENCY_DEPTH`.
    pub fn dependency_depth(&self, name: &str) -> usize {
        let mut depth = 0;
        let mut current = self.catalog.get(name).and_then(ServiceDescriptor::dependency);
        while let Some(dependency) = current {
            if depth == MAX_DEPENDENCY_DEPTH {
                break;
            }
            depth += 1;
            current = self
                .catalog
                .get(dependency)
                .and_then(ServiceDescriptor::dependency);
        }
        depth
    }

    /// Configured services ordered by dependency depth, configuration order
    /// breaking ties. Unknown names are skipped.
    pub fn resolve_configured_start_order(&self) -> Vec<String> {
        let mut order = Vec::new();
        for name in self.config.configured_service_names() {
            if self.catalog.contains_key(&name) {
                order.push(name);
            } else {
                event!(Level::WARN, service = %name, "configured service is not registered, skipping");
            }
        }
        order.sort_by_key(|name| self.dependency_depth(name));
        order
    }

    /// Start every configured service in order.
    ///
    /// # Errors
    /// Stops at the first vital service that aborts.
    pub async fn start_all(&self) -> Result<Vec<(String, StartOutcome)>> {
        let order = self.resolve_configured_start_order();
        event!(Level::INFO, count = order.len(), "starting configured services");
        let mut outcomes = Vec::with_capacity(order.len());
        for name in order {
            let outcome = self.start_service(&name).await?;
            outcomes.push((name, outcome));
        }
        Ok(outcomes)
    }

    /// Instantiate, initialize and cache one service.
    ///
    /// # Errors
    /// `ServiceNotFound` for an unregistered name, `ServiceAborted` when a
    /// vital service exhausts its retries and the abort handler returns.
    pub async fn start_service(&self, name: &str) -> Result<StartOutcome> {
        let descriptor = self
            .catalog
            .get(name)
            .ok_or_else(|| CoreError::ServiceNotFound(name.to_string()))?;
        let _guard = self.lifecycle_guard(name).await;
        self.start_locked(descriptor).await
    }

    async fn lifecycle_guard(&self, name: &str) -> Option<MutexGuard<'_, ()>> {
        match self.lifecycle.get(name) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    async fn start_locked(&self, descriptor: &ServiceDescriptor) -> Result<StartOutcome> {
        let name = descriptor.name();
        if self.running.lock().await.contains_key(name) {
            event!(Level::DEBUG, service = %name, "service already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let span = info_span!("services.start", service = %name);
        self.start_instance(descriptor).instrument(span).await
    }

    async fn start_instance(&self, descriptor: &ServiceDescriptor) -> Result<StartOutcome> {
        let name = descriptor.name();
        let mut service = descriptor.instantiate();

        let required = service.required_edition();
        if !self.config.edition.permits(required) {
            event!(
                Level::INFO,
                required = %required,
                licensed = %self.config.edition,
                "service not permitted by licensed edition"
            );
            return Ok(StartOutcome::NotPermitted);
        }

        let policy = descriptor.start_policy(service.as_ref());
        let ctx = ServiceContext::new(name, self.config.edition, Arc::clone(&self.settings));
        let mut remaining = policy.retry_count.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            event!(Level::DEBUG, attempt, "initializing service");

            let result = AssertUnwindSafe(service.initialize(&ctx)).catch_unwind().await;
            let cause = match result {
                Ok(Ok(true)) => return Ok(self.finish_start(name, service).await),
                Ok(Ok(false)) => CoreError::ServiceInitFailed(
                    name.to_string(),
                    "initialize reported failure".to_string(),
                ),
                Ok(Err(err)) => CoreError::ServiceInitFailed(name.to_string(), err.to_string()),
                Err(payload) => CoreError::ServiceInitFailed(
                    name.to_string(),
                    panic_message(payload.as_ref()),
                ),
            };

            remaining -= 1;
            if remaining == 0 {
                if policy.vital {
                    event!(Level::ERROR, attempt, error = %cause, "vital service exhausted its retries");
                    (self.abort_handler)(name, &cause);
                    return Err(CoreError::ServiceAborted(name.to_string(), cause.to_string()));
                }
                event!(Level::WARN, attempt, error = %cause, "giving up on service");
                return Ok(StartOutcome::Failed);
            }

            event!(
                Level::WARN,
                attempt,
                remaining,
                delay_ms = delay_millis(policy.retry_delay),
                error = %cause,
                "service initialization failed, retrying"
            );
            sleep(policy.retry_delay).await;
        }
    }

    async fn finish_start(&self, name: &str, mut service: Box<dyn Service>) -> StartOutcome {
        if let Some(background) = service.background() {
            if background.run_on_startup() {
                if let Err(err) = background.start().await {
                    event!(Level::WARN, error = %err, "background loop failed to start");
                }
            }
        }

        if !service.is_running() {
            event!(Level::WARN, "service initialized but is not running");
            // Never cached, so nothing else would ever stop it.
            stop_instance(name, service.as_mut()).await;
            return StartOutcome::NotRunning;
        }

        service.initialized().await;
        self.running.lock().await.insert(name.to_string(), service);
        event!(Level::INFO, "service started");
        StartOutcome::Started
    }

    /// Stop one running service. Returns `false` if it was not running.
    pub async fn shutdown_service(&self, name: &str) -> bool {
        let _guard = self.lifecycle_guard(name).await;
        self.shutdown_locked(name).await
    }

    async fn shutdown_locked(&self, name: &str) -> bool {
        let Some(mut service) = self.running.lock().await.remove(name) else {
            return false;
        };
        stop_instance(name, service.as_mut()).await;
        event!(Level::INFO, service = %name, "service stopped");
        true
    }

    /// Stop services in reverse start order, then anything started ad hoc.
    pub async fn shutdown_all(&self) {
        for name in self.resolve_configured_start_order().iter().rev() {
            self.shutdown_service(name).await;
        }
        for name in self.running_services().await {
            self.shutdown_service(&name).await;
        }
    }

    pub async fn is_ready(&self, name: &str) -> bool {
        self.running
            .lock()
            .await
            .get(name)
            .is_some_and(|service| service.is_running())
    }

    /// Names of the cached running services, sorted.
    pub async fn running_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.running.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Shut down and start again; a storage-layer restart re-scans type metadata.
    pub async fn restart_service(&self, name: &str) -> Result<StartOutcome> {
        let descriptor = self
            .catalog
            .get(name)
            .ok_or_else(|| CoreError::ServiceNotFound(name.to_string()))?;

        let _guard = self.lifecycle_guard(name).await;
        self.shutdown_locked(name).await;
        let outcome = self.start_locked(descriptor).await?;

        if descriptor.is_storage_layer() && outcome == StartOutcome::Started {
            if let Some(registry) = &self.type_registry {
                let scanned = registry.rescan();
                event!(Level::INFO, service = %name, scanned, "type metadata re-scanned");
            }
        }
        Ok(outcome)
    }

    pub async fn execute(&self, name: &str, command: ServiceCommand) -> Result<CommandOutcome> {
        if !self.catalog.contains_key(name) {
            return Err(CoreError::ServiceNotFound(name.to_string()));
        }
        event!(Level::INFO, service = %name, command = %command, "service command");
        match command {
            ServiceCommand::Start => self.start_service(name).await.map(CommandOutcome::Start),
            ServiceCommand::Stop => Ok(CommandOutcome::Stop(self.shutdown_service(name).await)),
            ServiceCommand::Restart => self.restart_service(name).await.map(CommandOutcome::Start),
        }
    }
}
