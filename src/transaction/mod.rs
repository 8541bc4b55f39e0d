// ============================================================================
// Transaction Module
// ============================================================================
//
// Change tracking for a single unit of work:
// - entity: node and relationship references, identified by id
// - changeset: created/modified/deleted queues plus aspect and propagation queues
// - state: transaction lifecycle and nested-transaction merging
//
// ============================================================================

pub mod changeset;
pub mod entity;
pub mod state;

pub use changeset::{ChangeSet, ChangeSetStats, IS_AT, MutationAspect, OWNS, SECURITY};
pub use entity::{NodeRef, RelationshipRef};
pub use state::{Transaction, TransactionId, TransactionState};
