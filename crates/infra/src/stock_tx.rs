//! Stock transaction manager: the only path that mutates stock quantities.
//!
//! Each call is one optimistic read-decide-commit unit on a single stock row:
//! 1. read the row (and its version)
//! 2. let the domain decide the change (`StockRow::plan_change`)
//! 3. commit row + ledger entry against the version read in step 1
//!
//! A version conflict re-runs the whole unit from a fresh read, so the decision is
//! always based on the committed state it is applied to. Other failures are returned
//! as-is and write nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use bloomledger_core::{BranchName, ExpectedVersion, HistoryEntryId, ItemId, OperatorId};
use bloomledger_inventory::{
    ChangeRejected, ChangeType, LedgerMetadata, StockHistoryEntry, StockKey, StockRow,
};

use crate::context::{Clock, OperatorIdentity};
use crate::store::{StockCommit, StockStore, StoreError};

#[derive(Debug, Error)]
pub enum StockError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("item {item_id} has no stock row at branch {branch}")]
    ItemNotFound { item_id: ItemId, branch: BranchName },

    #[error(
        "insufficient stock for {item_name} at {branch}: current stock {current_stock}, requested {requested}"
    )]
    InsufficientStock {
        item_name: String,
        branch: BranchName,
        current_stock: i64,
        requested: i64,
    },

    #[error("stock row {item_id}@{branch} kept changing; gave up after {attempts} attempts")]
    ConcurrencyExhausted {
        item_id: ItemId,
        branch: BranchName,
        attempts: u32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StockError {
    fn rejected(key: &StockKey, rejected: ChangeRejected) -> Self {
        match rejected {
            ChangeRejected::InsufficientStock {
                item_name,
                current_stock,
                requested,
            } => StockError::InsufficientStock {
                item_name,
                branch: key.branch.clone(),
                current_stock,
                requested,
            },
            ChangeRejected::Invalid(msg) => StockError::Validation(msg),
        }
    }
}

/// One relative stock change as requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChangeRequest {
    pub key: StockKey,
    /// Signed: positive for `In`, negative for `Out`.
    pub delta: i64,
    pub change_type: ChangeType,
    pub metadata: LedgerMetadata,
}

/// What a committed change did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub from_stock: i64,
    pub to_stock: i64,
    pub entry_id: HistoryEntryId,
    /// 1 when the first attempt committed.
    pub attempts: u32,
}

/// How the delta of one attempt is derived from the row read in that attempt.
#[derive(Debug, Clone, Copy)]
enum Target {
    Relative(i64),
    Absolute(i64),
}

impl Target {
    fn delta(self, row: &StockRow) -> Option<i64> {
        match self {
            Target::Relative(delta) => Some(delta),
            Target::Absolute(quantity) => quantity.checked_sub(row.quantity),
        }
    }
}

pub struct StockTransactionManager<S> {
    store: S,
    identity: Arc<dyn OperatorIdentity>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl<S> StockTransactionManager<S>
where
    S: StockStore,
{
    pub fn new(
        store: S,
        identity: Arc<dyn OperatorIdentity>,
        clock: Arc<dyn Clock>,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            identity,
            clock,
            max_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Resolve the operator for a mutation: explicit metadata wins, then the identity provider.
    pub fn resolve_operator(&self, explicit: Option<&OperatorId>) -> Result<OperatorId, StockError> {
        explicit
            .cloned()
            .or_else(|| self.identity.current_operator())
            .ok_or_else(|| StockError::Validation("no operator identity for stock change".to_string()))
    }

    /// Apply a signed delta to one row, recording one ledger entry.
    ///
    /// - `In`/`Out` never let the quantity drop below zero (`InsufficientStock`).
    /// - `ManualUpdate` takes any delta whose result is non-negative; prefer
    ///   `set_stock_level` when the target is an absolute count.
    /// - A missing row is `ItemNotFound`.
    /// - Version conflicts are retried up to the configured bound, then
    ///   `ConcurrencyExhausted`; nothing is written in that case.
    #[instrument(skip(self, request), fields(key = %request.key, delta = request.delta, change_type = request.change_type.as_str()))]
    pub fn apply_stock_change(&self, request: StockChangeRequest) -> Result<AppliedChange, StockError> {
        let StockChangeRequest {
            key,
            delta,
            change_type,
            metadata,
        } = request;
        self.run(&key, change_type, Target::Relative(delta), metadata)
    }

    /// Set one row to an absolute quantity with a `manual_update` entry.
    ///
    /// The delta is recomputed from each fresh read, so a concurrent change in between
    /// cannot make the final quantity differ from `new_quantity`.
    #[instrument(skip(self, metadata), fields(key = %key))]
    pub fn set_stock_level(
        &self,
        key: &StockKey,
        new_quantity: i64,
        metadata: LedgerMetadata,
    ) -> Result<AppliedChange, StockError> {
        if new_quantity < 0 {
            return Err(StockError::Validation(format!(
                "new quantity cannot be negative (got {new_quantity})"
            )));
        }
        self.run(key, ChangeType::ManualUpdate, Target::Absolute(new_quantity), metadata)
    }

    fn run(
        &self,
        key: &StockKey,
        change_type: ChangeType,
        target: Target,
        metadata: LedgerMetadata,
    ) -> Result<AppliedChange, StockError> {
        let operator = self.resolve_operator(metadata.operator.as_ref())?;
        let max_attempts = self.max_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            let row = self.store.stock_row(key)?.ok_or_else(|| StockError::ItemNotFound {
                item_id: key.item_id.clone(),
                branch: key.branch.clone(),
            })?;

            let delta = target
                .delta(&row)
                .ok_or_else(|| StockError::Validation("stock quantity overflow".to_string()))?;
            let planned = row
                .plan_change(change_type, delta)
                .map_err(|rejected| StockError::rejected(key, rejected))?;

            let entry = StockHistoryEntry::for_change(
                &row,
                &planned,
                operator.clone(),
                metadata.clone(),
                self.clock.now(),
            );
            let entry_id = entry.id;

            let commit = StockCommit {
                key: key.clone(),
                expected_version: ExpectedVersion::Exact(row.version),
                entry,
            };
            match self.store.commit(commit) {
                Ok(committed) => {
                    tracing::info!(
                        from_stock = planned.from_stock,
                        to_stock = planned.to_stock,
                        version = committed.version,
                        attempt,
                        "stock change committed"
                    );
                    return Ok(AppliedChange {
                        from_stock: planned.from_stock,
                        to_stock: planned.to_stock,
                        entry_id,
                        attempts: attempt,
                    });
                }
                Err(StoreError::Conflict(reason)) => {
                    tracing::debug!(attempt, %reason, "stock row changed underneath; retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        tracing::warn!(attempts = max_attempts, "stock change abandoned after repeated conflicts");
        Err(StockError::ConcurrencyExhausted {
            item_id: key.item_id.clone(),
            branch: key.branch.clone(),
            attempts: max_attempts,
        })
    }
}
