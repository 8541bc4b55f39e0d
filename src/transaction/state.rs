// ============================================================================
// Transaction State Management
// ============================================================================
//
// Each unit of work moves through Active -> Committed/Aborted and owns one
// ChangeSet. A nested transaction is begun from its parent, finished on the
// same thread, and its changes are folded into the parent on success.
//
// ============================================================================

use super::ChangeSet;
use crate::core::{CoreError, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Level, event};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Next id from the process-wide counter.
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state
///
/// State transitions:
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// A unit of work and the changes it has accumulated.
///
/// # Thread Safety
/// Owned by one thread at a time; nested transactions are merged back by the
/// thread that finishes them.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    parent: Option<TransactionId>,
    state: TransactionState,
    changes: ChangeSet,
    started_at: DateTime<Utc>,
}

impl Transaction {
    /// Begin a top-level transaction
    pub fn begin() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<TransactionId>) -> Self {
        Self {
            id: TransactionId::new(),
            parent,
            state: TransactionState::Active,
            changes: ChangeSet::new(),
            started_at: Utc::now(),
        }
    }

    /// Begin a transaction nested in this one
    pub fn begin_nested(&self) -> Self {
        Self::with_parent(Some(self.id))
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn parent(&self) -> Option<TransactionId> {
        self.parent
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Mutable access for mutation interception
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn changes_mut(&mut self) -> Result<&mut ChangeSet> {
        if !self.state.is_active() {
            return Err(CoreError::TransactionError(format!(
                "Cannot record change: transaction {} is {}",
                self.id, self.state
            )));
        }
        Ok(&mut self.changes)
    }

    /// Consume a finished transaction and hand its changes to the notifier
    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }

    /// Mark transaction as committed
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn commit(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(CoreError::TransactionError(format!(
                "Cannot commit: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Mark transaction as aborted and discard changes
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn rollback(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(CoreError::TransactionError(format!(
                "Cannot rollback: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.changes.clear();
        self.state = TransactionState::Aborted;
        Ok(())
    }

    /// Fold a finished nested transaction into this one.
    ///
    /// A committed child contributes its changes; an aborted child is dropped.
    ///
    /// # Errors
    /// Returns error if this transaction is not active, the child is still
    /// active, or the child was not begun from this transaction.
    pub fn merge_nested(&mut self, nested: Transaction) -> Result<()> {
        if !self.state.is_active() {
            return Err(CoreError::TransactionError(format!(
                "Cannot merge into transaction {}: it is {}",
                self.id, self.state
            )));
        }
        if nested.parent != Some(self.id) {
            return Err(CoreError::TransactionError(format!(
                "Transaction {} is not nested in {}",
                nested.id, self.id
            )));
        }

        match nested.state {
            TransactionState::Active => Err(CoreError::TransactionError(format!(
                "Cannot merge transaction {}: it is still ACTIVE",
                nested.id
            ))),
            TransactionState::Aborted => {
                event!(Level::DEBUG, parent = %self.id, nested = %nested.id, "nested transaction discarded");
                Ok(())
            }
            TransactionState::Committed => {
                self.changes.include(&nested.changes);
                let stats = self.changes.stats();
                event!(
                    Level::DEBUG,
                    parent = %self.id,
                    nested = %nested.id,
                    created_nodes = stats.created_nodes,
                    modified_nodes = stats.modified_nodes,
                    deleted_nodes = stats.deleted_nodes,
                    "nested transaction merged"
                );
                Ok(())
            }
        }
    }
}
