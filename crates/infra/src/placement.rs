//! Order placement: persist the order, then consume stock line by line.
//!
//! ## Flow
//!
//! 1. Validate the draft and both branch names (nothing written on failure).
//! 2. Preflight every line against the current stock rows. Missing items are skipped or
//!    rejected per `MissingItemPolicy`; a line set that cannot be covered is rejected
//!    with `InsufficientStock` before the order is stored.
//! 3. Persist the order (status `processing`).
//! 4. Apply one stock-out per line, sequentially. Each line is its own atomic unit; there
//!    is no cross-line transaction.
//! 5. If a line still fails (stock moved after preflight, hot row, store outage), the
//!    `PartialFailurePolicy` decides: `Compensate` writes a compensating stock-in for every
//!    applied line and cancels the order; `Preserve` leaves applied lines in place.
//! 6. Publish `OrderPlaced` / `StockDepleted` (best-effort).
//!
//! A caller that abandons the call mid-way leaves the same footprint as step 5 with
//! `Preserve`; `OrderStockAudit` finds such orders from the ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::instrument;

use bloomledger_core::{HistoryEntryId, ItemId, OperatorId, OrderId};
use bloomledger_events::{Event, EventBus, EventEnvelope};
use bloomledger_inventory::{ChangeType, InventoryEvent, LedgerMetadata, StockKey};
use bloomledger_sales::{Order, OrderDraft, OrderEvent, OrderStatus};

use crate::config::{EngineConfig, MissingItemPolicy, PartialFailurePolicy};
use crate::context::BranchDirectory;
use crate::stock_tx::{StockChangeRequest, StockError, StockTransactionManager};
use crate::store::{OrderStore, StockStore, StoreError};

/// Why a line did not touch stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NonPositiveQuantity,
    MissingItemId,
    /// No stock row for the item at the order's branch (`MissingItemPolicy::Skip`).
    ItemNotFound,
    /// An earlier line failed, so this one was never attempted.
    NotAttempted,
}

/// Per-line result of a placement, in line order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LineOutcome {
    Applied {
        line_index: usize,
        item_id: ItemId,
        from_stock: i64,
        to_stock: i64,
        entry_id: HistoryEntryId,
    },
    Skipped {
        line_index: usize,
        reason: SkipReason,
    },
    Failed {
        line_index: usize,
        error: String,
    },
}

impl LineOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, LineOutcome::Applied { .. })
    }
}

/// Successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementReceipt {
    pub order_id: OrderId,
    pub outcomes: Vec<LineOutcome>,
}

impl PlacementReceipt {
    pub fn applied_lines(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn skipped_lines(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, LineOutcome::Skipped { .. }))
            .count()
    }
}

/// What happened to the applied lines of an order whose placement failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compensation {
    /// `PartialFailurePolicy::Preserve`: applied lines stay consumed.
    Preserved,
    /// Every applied line was restored and the order canceled.
    RolledBack,
    /// The rollback did not finish. `unrestored` items still carry the order's stock-out;
    /// when `order_canceled` is false the order is still live and reconciliation counts it.
    Incomplete {
        unrestored: Vec<ItemId>,
        order_canceled: bool,
    },
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Refused during preflight; nothing was written.
    #[error(transparent)]
    Rejected(StockError),

    /// A line failed after the order was stored.
    #[error("order {order_id}, line {line_index}: {source}")]
    LineFailed {
        order_id: OrderId,
        line_index: usize,
        #[source]
        source: StockError,
        outcomes: Vec<LineOutcome>,
        compensation: Compensation,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PlacementError {
    /// The stock error behind the failure, if any (for rendering item name and stock).
    pub fn stock_error(&self) -> Option<&StockError> {
        match self {
            PlacementError::Rejected(e) => Some(e),
            PlacementError::LineFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether retrying the whole placement from scratch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.stock_error(),
            Some(StockError::ConcurrencyExhausted { .. } | StockError::Store(StoreError::Unavailable(_)))
        ) || matches!(self, PlacementError::Store(StoreError::Unavailable(_)))
    }
}

#[derive(Debug, Clone)]
enum LinePlan {
    Skip(SkipReason),
    Consume { key: StockKey, quantity: i64 },
}

pub struct OrderPlacementCoordinator<S, B> {
    stock: StockTransactionManager<S>,
    branches: Arc<dyn BranchDirectory>,
    bus: B,
    config: EngineConfig,
}

impl<S, B> OrderPlacementCoordinator<S, B>
where
    S: StockStore + OrderStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        stock: StockTransactionManager<S>,
        branches: Arc<dyn BranchDirectory>,
        bus: B,
        config: EngineConfig,
    ) -> Self {
        Self {
            stock,
            branches,
            bus,
            config,
        }
    }

    /// Place an order on behalf of `operator` (or the signed-in operator when `None`).
    #[instrument(skip(self, draft, operator), fields(branch = %draft.branch_name, lines = draft.lines.len()))]
    pub fn place_order(
        &self,
        draft: OrderDraft,
        operator: Option<OperatorId>,
    ) -> Result<PlacementReceipt, PlacementError> {
        let created_by = self
            .stock
            .resolve_operator(operator.as_ref())
            .map_err(|e| PlacementError::Validation(e.to_string()))?;
        let now = self.stock.clock().now();
        let order = draft
            .into_order(OrderId::new(), now, created_by.clone())
            .map_err(|e| PlacementError::Validation(e.to_string()))?;

        self.check_branches(&order)?;
        let plan = self.preflight(&order)?;

        self.stock.store().insert_order(order.clone())?;
        tracing::info!(order_id = %order.id, total = order.summary.total, "order stored");

        let mut outcomes = Vec::with_capacity(plan.len());
        for (line_index, line_plan) in plan.iter().enumerate() {
            let (key, quantity) = match line_plan {
                LinePlan::Skip(reason) => {
                    tracing::debug!(line_index, ?reason, "line skipped");
                    outcomes.push(LineOutcome::Skipped {
                        line_index,
                        reason: *reason,
                    });
                    continue;
                }
                LinePlan::Consume { key, quantity } => (key, *quantity),
            };

            let line = &order.lines[line_index];
            let metadata = LedgerMetadata {
                operator: Some(created_by.clone()),
                unit_price: Some(line.price),
                total_amount: line.line_total(),
                order_id: Some(order.id),
                ..LedgerMetadata::default()
            };
            let request = StockChangeRequest {
                key: key.clone(),
                delta: -quantity,
                change_type: ChangeType::Out,
                metadata,
            };

            match self.stock.apply_stock_change(request) {
                Ok(applied) => outcomes.push(LineOutcome::Applied {
                    line_index,
                    item_id: key.item_id.clone(),
                    from_stock: applied.from_stock,
                    to_stock: applied.to_stock,
                    entry_id: applied.entry_id,
                }),
                Err(source) => {
                    outcomes.push(LineOutcome::Failed {
                        line_index,
                        error: source.to_string(),
                    });
                    outcomes.extend((line_index + 1..plan.len()).map(|idx| LineOutcome::Skipped {
                        line_index: idx,
                        reason: SkipReason::NotAttempted,
                    }));
                    return Err(self.fail(&order, &created_by, line_index, source, outcomes));
                }
            }
        }

        self.publish_placed(&order, &outcomes);

        Ok(PlacementReceipt {
            order_id: order.id,
            outcomes,
        })
    }

    fn check_branches(&self, order: &Order) -> Result<(), PlacementError> {
        if !self.branches.is_known(&order.branch_name) {
            return Err(PlacementError::Validation(format!(
                "unknown branch '{}'",
                order.branch_name
            )));
        }
        if let Some(process_branch) = order.transfer_info.as_ref().and_then(|t| t.process_branch()) {
            if !self.branches.is_known(process_branch) {
                return Err(PlacementError::Validation(format!(
                    "unknown process branch '{process_branch}'"
                )));
            }
        }
        Ok(())
    }

    /// Classify every line and check the summed demand per item against current stock.
    fn preflight(&self, order: &Order) -> Result<Vec<LinePlan>, PlacementError> {
        let mut plan = Vec::with_capacity(order.lines.len());
        let mut demand: BTreeMap<StockKey, (i64, i64, String)> = BTreeMap::new();

        for line in &order.lines {
            if line.quantity <= 0 {
                plan.push(LinePlan::Skip(SkipReason::NonPositiveQuantity));
                continue;
            }
            let Some(item_id) = line.item_id.clone() else {
                plan.push(LinePlan::Skip(SkipReason::MissingItemId));
                continue;
            };
            let key = StockKey::new(item_id, order.branch_name.clone());

            let Some(row) = self.stock.store().stock_row(&key)? else {
                match self.config.missing_item_policy {
                    MissingItemPolicy::Skip => {
                        tracing::warn!(item_id = %key.item_id, branch = %key.branch, "order line item has no stock row; skipped");
                        plan.push(LinePlan::Skip(SkipReason::ItemNotFound));
                        continue;
                    }
                    MissingItemPolicy::Reject => {
                        return Err(PlacementError::Rejected(StockError::ItemNotFound {
                            item_id: key.item_id,
                            branch: key.branch,
                        }));
                    }
                }
            };

            let slot = demand
                .entry(key.clone())
                .or_insert((0, row.quantity, row.item_name.clone()));
            slot.0 = slot.0.saturating_add(line.quantity);
            plan.push(LinePlan::Consume {
                key,
                quantity: line.quantity,
            });
        }

        for (key, (requested, current_stock, item_name)) in demand {
            if requested > current_stock {
                return Err(PlacementError::Rejected(StockError::InsufficientStock {
                    item_name,
                    branch: key.branch,
                    current_stock,
                    requested,
                }));
            }
        }

        Ok(plan)
    }

    fn fail(
        &self,
        order: &Order,
        operator: &OperatorId,
        line_index: usize,
        source: StockError,
        outcomes: Vec<LineOutcome>,
    ) -> PlacementError {
        tracing::warn!(order_id = %order.id, line_index, error = %source, "order line failed after earlier lines were applied");

        let compensation = match self.config.partial_failure_policy {
            PartialFailurePolicy::Preserve => Compensation::Preserved,
            PartialFailurePolicy::Compensate => self.compensate(order, operator, &outcomes),
        };

        PlacementError::LineFailed {
            order_id: order.id,
            line_index,
            source,
            outcomes,
            compensation,
        }
    }

    /// Restore every applied line with a stock-in tied to the order, then cancel it.
    fn compensate(&self, order: &Order, operator: &OperatorId, outcomes: &[LineOutcome]) -> Compensation {
        let mut unrestored = Vec::new();

        for outcome in outcomes {
            let LineOutcome::Applied {
                item_id,
                from_stock,
                to_stock,
                ..
            } = outcome
            else {
                continue;
            };
            let request = StockChangeRequest {
                key: StockKey::new(item_id.clone(), order.branch_name.clone()),
                delta: from_stock - to_stock,
                change_type: ChangeType::In,
                metadata: LedgerMetadata::by(operator.clone())
                    .for_order(order.id)
                    .with_memo(format!("compensation for failed order {}", order.id)),
            };
            if let Err(e) = self.stock.apply_stock_change(request) {
                tracing::error!(order_id = %order.id, %item_id, error = %e, "compensating stock-in failed");
                unrestored.push(item_id.clone());
            }
        }

        let order_canceled = match self.stock.store().set_order_status(order.id, OrderStatus::Canceled) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "failed to cancel order after compensation");
                false
            }
        };

        if unrestored.is_empty() && order_canceled {
            tracing::info!(order_id = %order.id, "applied lines restored; order canceled");
            Compensation::RolledBack
        } else {
            Compensation::Incomplete {
                unrestored,
                order_canceled,
            }
        }
    }

    fn publish_placed(&self, order: &Order, outcomes: &[LineOutcome]) {
        let now = self.stock.clock().now();
        let placed = OrderEvent::OrderPlaced {
            order_id: order.id,
            branch: order.branch_name.clone(),
            process_branch: order
                .revenue_transfer()
                .and_then(|t| t.process_branch())
                .cloned(),
            total: order.summary.total,
            applied_lines: outcomes.iter().filter(|o| o.is_applied()).count(),
            skipped_lines: outcomes
                .iter()
                .filter(|o| matches!(o, LineOutcome::Skipped { .. }))
                .count(),
            occurred_at: now,
        };
        self.publish(&placed);

        for outcome in outcomes {
            if let LineOutcome::Applied {
                line_index,
                item_id,
                to_stock: 0,
                ..
            } = outcome
            {
                self.publish(&InventoryEvent::StockDepleted {
                    item_id: item_id.clone(),
                    branch: order.branch_name.clone(),
                    item_name: order.lines[*line_index].name.clone(),
                    occurred_at: now,
                });
            }
        }
    }

    /// Best-effort: the order is already committed, so failures are only logged.
    fn publish<E>(&self, event: &E)
    where
        E: Event + Serialize,
    {
        match EventEnvelope::<JsonValue>::from_typed(event) {
            Ok(envelope) => {
                if let Err(err) = self.bus.publish(envelope) {
                    tracing::warn!(event_type = event.event_type(), error = ?err, "event publication failed");
                }
            }
            Err(err) => {
                tracing::warn!(event_type = event.event_type(), error = %err, "event serialization failed");
            }
        }
    }
}
