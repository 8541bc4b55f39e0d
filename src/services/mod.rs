// ============================================================================
// Service Orchestration Module
// ============================================================================
//
// Pluggable subsystems are registered as descriptors, started in dependency
// order with a bounded retry budget, and stopped in reverse. A vital service
// that cannot start aborts bring-up.
//
// ============================================================================

pub mod descriptor;
pub mod orchestrator;
pub mod service;

pub use descriptor::{ServiceDescriptor, ServiceFactory, StartPolicy};
pub use orchestrator::{
    AbortHandler, CommandOutcome, MAX_DEPENDENCY_DEPTH, ServiceCommand, ServiceOrchestrator,
    StartOutcome,
};
pub use service::{
    BackgroundService, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY, Edition, Service, ServiceContext,
};
