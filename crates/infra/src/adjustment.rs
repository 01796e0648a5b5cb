//! Manual stock adjustment (physical counts, corrections).

use std::sync::Arc;

use tracing::instrument;

use bloomledger_core::{BranchName, ItemId, OperatorId};
use bloomledger_inventory::{LedgerMetadata, StockKey};

use crate::context::BranchDirectory;
use crate::stock_tx::{AppliedChange, StockError, StockTransactionManager};
use crate::store::StockStore;

/// Operator request to set an item's stock at a branch to an absolute count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStockLevel {
    pub item_id: ItemId,
    pub branch: BranchName,
    pub new_quantity: i64,
    pub operator: Option<OperatorId>,
    pub memo: Option<String>,
}

pub struct ManualAdjustmentService<S> {
    stock: StockTransactionManager<S>,
    branches: Arc<dyn BranchDirectory>,
}

impl<S> ManualAdjustmentService<S>
where
    S: StockStore,
{
    pub fn new(stock: StockTransactionManager<S>, branches: Arc<dyn BranchDirectory>) -> Self {
        Self { stock, branches }
    }

    /// Overwrite the quantity, recording a `manual_update` entry with the difference.
    ///
    /// A negative target is rejected with `Validation` before anything is read.
    #[instrument(skip(self, command), fields(item_id = %command.item_id, branch = %command.branch, new_quantity = command.new_quantity))]
    pub fn set_stock(&self, command: SetStockLevel) -> Result<AppliedChange, StockError> {
        if command.new_quantity < 0 {
            return Err(StockError::Validation(format!(
                "new quantity cannot be negative (got {})",
                command.new_quantity
            )));
        }
        if !self.branches.is_known(&command.branch) {
            return Err(StockError::Validation(format!("unknown branch '{}'", command.branch)));
        }

        let metadata = LedgerMetadata {
            operator: command.operator,
            memo: command.memo,
            ..LedgerMetadata::default()
        };
        let key = StockKey::new(command.item_id, command.branch);
        let applied = self.stock.set_stock_level(&key, command.new_quantity, metadata)?;

        tracing::info!(
            from_stock = applied.from_stock,
            to_stock = applied.to_stock,
            "stock level set manually"
        );
        Ok(applied)
    }
}
