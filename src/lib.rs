// ============================================================================
// Graphweave Library
// ============================================================================

pub mod core;
pub mod relationship;
pub mod schema;
pub mod services;
pub mod transaction;

// Re-export main types for convenience
pub use core::{CoreError, OrchestratorConfig, RegistryConfig, Result, RuntimeConfig};
pub use relationship::{NamedRelation, RelationshipResolver};
pub use schema::{PropertyKey, PropertyType, TypeDescriptor, TypeRegistry};
pub use services::{
    Edition, Service, ServiceCommand, ServiceDescriptor, ServiceOrchestrator, StartOutcome,
};
pub use transaction::{ChangeSet, MutationAspect, NodeRef, RelationshipRef, Transaction};

use std::sync::Arc;
use tracing::{Level, event};

// ============================================================================
// Runtime Bundle
// ============================================================================

/// The shared runtime built from one configuration document.
///
/// Type descriptors and service descriptors are registered first, then
/// [`Runtime::bring_up`] scans metadata and starts the configured services.
///
/// # Examples
///
/// ```
/// use graphweave::{Runtime, RuntimeConfig, TypeDescriptor};
///
/// # fn main() -> graphweave::Result<()> {
/// let mut runtime = Runtime::new(RuntimeConfig::from_json_str(
///     r#"{ "services": { "configured_services": "" } }"#,
/// )?);
/// runtime.registry().register_type(TypeDescriptor::concrete("Folder"));
/// assert_eq!(runtime.registry().normalize_entity_name("folders"), "Folder");
/// # Ok(())
/// # }
/// ```
pub struct Runtime {
    registry: Arc<TypeRegistry>,
    resolver: RelationshipResolver,
    orchestrator: ServiceOrchestrator,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let registry = Arc::new(TypeRegistry::new(config.registry));
        let resolver = RelationshipResolver::new(Arc::clone(&registry));
        let orchestrator =
            ServiceOrchestrator::new(config.services).with_type_registry(Arc::clone(&registry));
        Self {
            registry,
            resolver,
            orchestrator,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &RelationshipResolver {
        &self.resolver
    }

    pub fn orchestrator(&self) -> &ServiceOrchestrator {
        &self.orchestrator
    }

    /// Mutable access for registering service descriptors before bring-up.
    pub fn orchestrator_mut(&mut self) -> &mut ServiceOrchestrator {
        &mut self.orchestrator
    }

    /// Scan all registered types, then start the configured services.
    ///
    /// ```
    /// use graphweave::{Runtime, RuntimeConfig};
    ///
    /// # tokio_test::block_on(async {
    /// let runtime = Runtime::new(RuntimeConfig::default());
    /// let outcomes = runtime.bring_up().await.unwrap();
    /// assert!(outcomes.is_empty());
    /// # });
    /// ```
    ///
    /// # Errors
    /// Returns the abort error of the first vital service that cannot start.
    pub async fn bring_up(&self) -> Result<Vec<(String, StartOutcome)>> {
        let scanned = self.registry.scan_all();
        event!(Level::INFO, scanned, "type metadata scanned");
        self.orchestrator.start_all().await
    }

    pub async fn shutdown(&self) {
        self.orchestrator.shutdown_all().await;
    }
}
