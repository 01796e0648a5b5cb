//! Stock receiving (purchases and deliveries from suppliers).

use std::sync::Arc;

use tracing::instrument;

use bloomledger_core::{Amount, BranchName, ItemId, OperatorId};
use bloomledger_inventory::{ChangeType, ItemType, LedgerMetadata, StockKey, StockRow};

use crate::context::BranchDirectory;
use crate::stock_tx::{AppliedChange, StockChangeRequest, StockError, StockTransactionManager};
use crate::store::{StockStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveStock {
    pub item_id: ItemId,
    pub branch: BranchName,
    /// Used only when the branch has no row for the item yet.
    pub item_name: String,
    pub item_type: ItemType,
    pub quantity: i64,
    pub unit_price: Amount,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub operator: Option<OperatorId>,
    pub memo: Option<String>,
}

pub struct StockReceivingService<S> {
    stock: StockTransactionManager<S>,
    branches: Arc<dyn BranchDirectory>,
}

impl<S> StockReceivingService<S>
where
    S: StockStore,
{
    pub fn new(stock: StockTransactionManager<S>, branches: Arc<dyn BranchDirectory>) -> Self {
        Self { stock, branches }
    }

    /// Record a stock-in, creating the branch's row on first receipt.
    ///
    /// The ledger entry carries unit price, supplier and `unit_price * quantity`.
    #[instrument(skip(self, command), fields(item_id = %command.item_id, branch = %command.branch, quantity = command.quantity))]
    pub fn receive(&self, command: ReceiveStock) -> Result<AppliedChange, StockError> {
        if command.quantity <= 0 {
            return Err(StockError::Validation(format!(
                "received quantity must be positive (got {})",
                command.quantity
            )));
        }
        if command.unit_price < 0 {
            return Err(StockError::Validation("unit price cannot be negative".to_string()));
        }
        if !self.branches.is_known(&command.branch) {
            return Err(StockError::Validation(format!("unknown branch '{}'", command.branch)));
        }
        let total_amount = command
            .unit_price
            .checked_mul(command.quantity)
            .ok_or_else(|| StockError::Validation("received amount overflows".to_string()))?;

        let key = StockKey::new(command.item_id.clone(), command.branch.clone());
        if self.stock.store().stock_row(&key)?.is_none() {
            let row = StockRow {
                supplier: command.supplier.clone(),
                category: command.category.clone(),
                ..StockRow::new(
                    command.item_id,
                    command.branch,
                    command.item_name,
                    command.item_type,
                    command.unit_price,
                )
            };
            match self.stock.store().create_row(row) {
                Ok(_) => tracing::info!("stock row created on first receipt"),
                // Created concurrently by another receipt; apply on top of it.
                Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.stock.apply_stock_change(StockChangeRequest {
            key,
            delta: command.quantity,
            change_type: ChangeType::In,
            metadata: LedgerMetadata {
                operator: command.operator,
                unit_price: Some(command.unit_price),
                supplier: command.supplier,
                total_amount: Some(total_amount),
                order_id: None,
                memo: command.memo,
            },
        })
    }
}
