/// Service orchestrator tests
///
/// Dependency ordering, retry budgets, vital-service aborts, administrative
/// commands and storage-layer restarts.
/// Run with: cargo test --test service_orchestrator_tests

use async_trait::async_trait;
use graphweave::schema::{PropertyKey, PropertyType, TypeDescriptor, TypeRegistry};
use graphweave::services::{
    CommandOutcome, Service, ServiceCommand, ServiceContext, ServiceDescriptor,
    ServiceOrchestrator, StartOutcome,
};
use graphweave::{CoreError, OrchestratorConfig, Result, Runtime, RuntimeConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records lifecycle calls into a shared journal.
struct Recorder {
    name: &'static str,
    journal: Arc<Mutex<Vec<String>>>,
    running: bool,
}

impl Recorder {
    fn descriptor(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> ServiceDescriptor {
        let journal = Arc::clone(journal);
        ServiceDescriptor::new(name, move || {
            Box::new(Recorder {
                name,
                journal: Arc::clone(&journal),
                running: false,
            })
        })
    }
}

#[async_trait]
impl Service for Recorder {
    async fn initialize(&mut self, ctx: &ServiceContext) -> Result<bool> {
        assert_eq!(ctx.service_name(), self.name);
        self.running = true;
        self.journal.lock().unwrap().push(format!("start {}", self.name));
        Ok(true)
    }

    async fn initialized(&mut self) {
        self.journal.lock().unwrap().push(format!("ready {}", self.name));
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.running = false;
        self.journal.lock().unwrap().push(format!("stop {}", self.name));
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Fails every initialize attempt and counts them.
struct AlwaysFails {
    attempts: Arc<AtomicUsize>,
    vital: bool,
}

#[async_trait]
impl Service for AlwaysFails {
    async fn initialize(&mut self, _ctx: &ServiceContext) -> Result<bool> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt % 2 == 0 {
            Err(CoreError::ConfigError("storage unreachable".to_string()))
        } else {
            Ok(false)
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        false
    }

    fn is_vital(&self) -> bool {
        self.vital
    }

    fn retry_count(&self) -> u32 {
        2
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(1)
    }
}

fn failing_descriptor(name: &str, attempts: &Arc<AtomicUsize>, vital: bool) -> ServiceDescriptor {
    let attempts = Arc::clone(attempts);
    ServiceDescriptor::new(name, move || {
        Box::new(AlwaysFails {
            attempts: Arc::clone(&attempts),
            vital,
        })
    })
}

/// Succeeds on the third attempt.
struct Flaky {
    attempts: Arc<AtomicUsize>,
    running: bool,
}

#[async_trait]
impl Service for Flaky {
    async fn initialize(&mut self, _ctx: &ServiceContext) -> Result<bool> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.running = attempt >= 3;
        Ok(self.running)
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Takes a while to initialize and counts live instances.
struct Slow {
    live: Arc<AtomicUsize>,
    running: bool,
}

#[async_trait]
impl Service for Slow {
    async fn initialize(&mut self, _ctx: &ServiceContext) -> Result<bool> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.live.fetch_add(1, Ordering::SeqCst);
        self.running = true;
        Ok(true)
    }

    async fn shutdown(&mut self) -> Result<()> {
        if self.running {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

fn abc_orchestrator(journal: &Arc<Mutex<Vec<String>>>) -> ServiceOrchestrator {
    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("C, A B"));
    orchestrator.register_service_type(Recorder::descriptor("A", journal));
    orchestrator.register_service_type(Recorder::descriptor("B", journal).depends_on("A"));
    orchestrator.register_service_type(Recorder::descriptor("C", journal).depends_on("B"));
    orchestrator
}

#[test]
fn test_start_order_follows_dependencies() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = abc_orchestrator(&journal);
    assert_eq!(orchestrator.resolve_configured_start_order(), vec!["A", "B", "C"]);
}

#[test]
fn test_start_order_is_stable_and_skips_unknown() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut orchestrator =
        ServiceOrchestrator::new(OrchestratorConfig::new("Mail,Ghost,Cron,Index"));
    orchestrator.register_service_type(Recorder::descriptor("Mail", &journal));
    orchestrator.register_service_type(Recorder::descriptor("Cron", &journal));
    orchestrator.register_service_type(Recorder::descriptor("Index", &journal).depends_on("Mail"));

    assert_eq!(
        orchestrator.resolve_configured_start_order(),
        vec!["Mail", "Cron", "Index"]
    );
}

#[tokio::test]
async fn test_start_all_and_shutdown_all() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = abc_orchestrator(&journal);

    let outcomes = orchestrator.start_all().await.unwrap();
    assert!(outcomes.iter().all(|(_, outcome)| *outcome == StartOutcome::Started));
    assert_eq!(orchestrator.running_services().await, vec!["A", "B", "C"]);
    assert!(orchestrator.is_ready("B").await);

    orchestrator.shutdown_all().await;
    assert!(orchestrator.running_services().await.is_empty());

    let journal = journal.lock().unwrap().clone();
    assert_eq!(
        journal,
        vec![
            "start A", "ready A", "start B", "ready B", "start C", "ready C", "stop C",
            "stop B", "stop A",
        ]
    );
}

#[tokio::test]
async fn test_vital_service_aborts_after_exactly_retry_count_attempts() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let aborted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&aborted);

    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("Storage"))
        .with_abort_handler(move |name: &str, _cause: &CoreError| {
            sink.lock().unwrap().push(name.to_string());
        });
    orchestrator.register_service_type(failing_descriptor("Storage", &attempts, true));

    let result = orchestrator.start_service("Storage").await;

    match result {
        Err(CoreError::ServiceAborted(name, cause)) => {
            assert_eq!(name, "Storage");
            // The last attempt's own error is carried into the abort.
            assert!(cause.contains("storage unreachable"), "{cause}");
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(*aborted.lock().unwrap(), vec!["Storage".to_string()]);
    assert!(!orchestrator.is_ready("Storage").await);
}

#[tokio::test]
async fn test_vital_abort_stops_start_all() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let journal = Arc::new(Mutex::new(Vec::new()));
    let aborts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&aborts);

    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("Storage Mail"))
        .with_abort_handler(move |_: &str, _: &CoreError| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    orchestrator.register_service_type(failing_descriptor("Storage", &attempts, true));
    orchestrator.register_service_type(Recorder::descriptor("Mail", &journal));

    assert!(orchestrator.start_all().await.is_err());
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    assert!(journal.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_vital_failure_gives_up_without_abort() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let aborts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&aborts);

    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("Thumbnails"))
        .with_abort_handler(move |_: &str, _: &CoreError| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    orchestrator.register_service_type(failing_descriptor("Thumbnails", &attempts, false));

    assert_eq!(
        orchestrator.start_service("Thumbnails").await.unwrap(),
        StartOutcome::Failed
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(aborts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retry_until_success() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("Flaky"));
    orchestrator.register_service_type(
        ServiceDescriptor::new("Flaky", move || {
            Box::new(Flaky {
                attempts: Arc::clone(&counter),
                running: false,
            })
        })
        .retries(3, Duration::from_millis(1)),
    );

    assert_eq!(orchestrator.start_service("Flaky").await.unwrap(), StartOutcome::Started);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(orchestrator.is_ready("Flaky").await);
}

#[tokio::test]
async fn test_zero_retry_budget_still_attempts_once() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("Thumbnails"));
    orchestrator.register_service_type(
        failing_descriptor("Thumbnails", &attempts, false).retries(0, Duration::from_millis(1)),
    );

    assert_eq!(
        orchestrator.start_service("Thumbnails").await.unwrap(),
        StartOutcome::Failed
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_execute_commands() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = abc_orchestrator(&journal);

    let start: ServiceCommand = "start".parse().unwrap();
    assert_eq!(
        orchestrator.execute("A", start).await.unwrap(),
        CommandOutcome::Start(StartOutcome::Started)
    );
    assert_eq!(
        orchestrator.execute("A", ServiceCommand::Restart).await.unwrap(),
        CommandOutcome::Start(StartOutcome::Started)
    );
    assert_eq!(
        orchestrator.execute("A", ServiceCommand::Stop).await.unwrap(),
        CommandOutcome::Stop(true)
    );
    assert_eq!(
        orchestrator.execute("A", ServiceCommand::Stop).await.unwrap(),
        CommandOutcome::Stop(false)
    );
    assert!(matches!(
        "pause".parse::<ServiceCommand>(),
        Err(CoreError::UnknownCommand(_))
    ));

    let journal = journal.lock().unwrap().clone();
    assert_eq!(journal, vec!["start A", "ready A", "stop A", "start A", "ready A", "stop A"]);
}

#[tokio::test]
async fn test_storage_layer_restart_rescans_type_metadata() {
    let registry = Arc::new(TypeRegistry::default());
    registry.register_type(
        TypeDescriptor::concrete("Folder").property(PropertyKey::new("name", PropertyType::String)),
    );
    registry.scan_all();

    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("Storage"))
        .with_type_registry(Arc::clone(&registry));
    orchestrator.register_service_type(Recorder::descriptor("Storage", &journal).storage_layer());
    orchestrator.start_service("Storage").await.unwrap();

    // A type registered after bring-up becomes visible once storage restarts.
    registry.register_type(
        TypeDescriptor::concrete("File").property(PropertyKey::new("size", PropertyType::Integer)),
    );
    assert!(registry.get_property_keys("File").is_empty());

    assert_eq!(
        orchestrator.restart_service("Storage").await.unwrap(),
        StartOutcome::Started
    );
    assert_eq!(registry.get_property_keys("File").len(), 1);
    assert_eq!(registry.get_property_keys("Folder").len(), 1);
}

#[tokio::test]
async fn test_runtime_bring_up_from_json_config() {
    let config = RuntimeConfig::from_json_str(
        r#"{
            "registry": { "name_cache_capacity": 16 },
            "services": {
                "configured_services": "Index, Storage",
                "edition": "Enterprise",
                "settings": { "storage.path": "/var/lib/graph" }
            }
        }"#,
    )
    .unwrap();

    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut runtime = Runtime::new(config);
    runtime
        .registry()
        .register_type(TypeDescriptor::concrete("Folder"));
    runtime
        .orchestrator_mut()
        .register_service_type(Recorder::descriptor("Storage", &journal).storage_layer());
    runtime
        .orchestrator_mut()
        .register_service_type(Recorder::descriptor("Index", &journal).depends_on("Storage"));

    let outcomes = runtime.bring_up().await.unwrap();
    let order: Vec<&str> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(order, vec!["Storage", "Index"]);
    assert_eq!(runtime.registry().entity_type_for_raw_name("folders"), Some("Folder".to_string()));

    runtime.shutdown().await;
    assert!(runtime.orchestrator().running_services().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_starts_of_one_service_create_one_instance() {
    let live = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&live);
    let mut orchestrator = ServiceOrchestrator::new(OrchestratorConfig::new("Index"));
    orchestrator.register_service_type(ServiceDescriptor::new("Index", move || {
        Box::new(Slow {
            live: Arc::clone(&counter),
            running: false,
        })
    }));

    let (first, second) = tokio::join!(
        orchestrator.start_service("Index"),
        orchestrator.start_service("Index"),
    );
    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|outcome| *outcome != StartOutcome::Started);
    assert_eq!(outcomes, vec![StartOutcome::Started, StartOutcome::AlreadyRunning]);
    assert_eq!(live.load(Ordering::SeqCst), 1);

    orchestrator.shutdown_all().await;
    assert_eq!(live.load(Ordering::SeqCst), 0);
    assert!(orchestrator.running_services().await.is_empty());
}
