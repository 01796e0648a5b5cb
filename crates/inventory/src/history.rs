//! Stock history ledger entries.
//!
//! One entry per committed stock mutation of one item. Entries are never updated or
//! deleted; corrections are new entries (a manual update, or a compensating stock-in).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomledger_core::{
    Amount, BranchName, DomainError, DomainResult, HistoryEntryId, ItemId, OperatorId, OrderId,
};

use crate::stock::{ItemType, PlannedChange, StockRow};

/// Kind of stock mutation recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Stock received (purchase, transfer-in, compensation of a failed order).
    In,
    /// Stock consumed by an order.
    Out,
    /// Physical-count correction to an absolute value.
    ManualUpdate,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::In => "in",
            ChangeType::Out => "out",
            ChangeType::ManualUpdate => "manual_update",
        }
    }
}

/// Caller-supplied attribution for a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerMetadata {
    /// Operator identity; `None` means "ask the identity provider".
    pub operator: Option<OperatorId>,
    pub unit_price: Option<Amount>,
    pub supplier: Option<String>,
    pub total_amount: Option<Amount>,
    /// Order that caused the mutation (stock-out and its compensation).
    pub order_id: Option<OrderId>,
    pub memo: Option<String>,
}

impl LedgerMetadata {
    pub fn by(operator: OperatorId) -> Self {
        Self {
            operator: Some(operator),
            ..Self::default()
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Immutable audit record of a single stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistoryEntry {
    pub id: HistoryEntryId,
    pub timestamp: DateTime<Utc>,
    pub change_type: ChangeType,
    pub item_type: ItemType,
    pub item_id: ItemId,
    pub item_name: String,
    /// Magnitude of the change (always >= 0); the sign follows from the stock columns.
    pub quantity: i64,
    pub from_stock: i64,
    pub to_stock: i64,
    pub resulting_stock: i64,
    pub branch: BranchName,
    pub operator: OperatorId,
    pub unit_price: Option<Amount>,
    pub supplier: Option<String>,
    pub total_amount: Option<Amount>,
    pub order_id: Option<OrderId>,
    pub memo: Option<String>,
}

impl StockHistoryEntry {
    /// Build the entry that accompanies `change` on `row`.
    pub fn for_change(
        row: &StockRow,
        change: &PlannedChange,
        operator: OperatorId,
        metadata: LedgerMetadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryEntryId::new(),
            timestamp,
            change_type: change.change_type,
            item_type: row.item_type,
            item_id: row.item_id.clone(),
            item_name: row.item_name.clone(),
            quantity: change.signed_delta().abs(),
            from_stock: change.from_stock,
            to_stock: change.to_stock,
            resulting_stock: change.to_stock,
            branch: row.branch.clone(),
            operator,
            unit_price: metadata.unit_price,
            supplier: metadata.supplier,
            total_amount: metadata.total_amount,
            order_id: metadata.order_id,
            memo: metadata.memo,
        }
    }

    /// Signed change applied by this entry.
    pub fn signed_delta(&self) -> i64 {
        match self.change_type {
            ChangeType::In => self.quantity,
            ChangeType::Out => -self.quantity,
            ChangeType::ManualUpdate => self.to_stock - self.from_stock,
        }
    }

    /// Check the ledger arithmetic of this entry.
    ///
    /// `to_stock == from_stock + signed_delta`, `to_stock == resulting_stock`,
    /// and neither stock column is negative.
    pub fn verify(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::invariant("ledger quantity cannot be negative"));
        }
        if self.from_stock < 0 || self.to_stock < 0 {
            return Err(DomainError::invariant("ledger stock columns cannot be negative"));
        }
        if self.to_stock != self.resulting_stock {
            return Err(DomainError::invariant("to_stock must equal resulting_stock"));
        }
        if (self.to_stock - self.from_stock).abs() != self.quantity {
            return Err(DomainError::invariant("quantity must equal |to_stock - from_stock|"));
        }
        if self.to_stock != self.from_stock + self.signed_delta() {
            return Err(DomainError::invariant(format!(
                "{} entry moves stock in the wrong direction ({} -> {})",
                self.change_type.as_str(),
                self.from_stock,
                self.to_stock
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(quantity: i64) -> StockRow {
        StockRow {
            quantity,
            ..StockRow::new(
                ItemId::parse("M1").unwrap(),
                BranchName::parse("A").unwrap(),
                "Red rose",
                ItemType::Material,
                1_500,
            )
        }
    }

    fn operator() -> OperatorId {
        OperatorId::parse("staff@florist.example").unwrap()
    }

    #[test]
    fn out_entry_records_magnitude_and_stock_columns() {
        let r = row(10);
        let planned = r.plan_change(ChangeType::Out, -3).unwrap();
        let entry = StockHistoryEntry::for_change(&r, &planned, operator(), LedgerMetadata::default(), Utc::now());

        assert_eq!(entry.change_type, ChangeType::Out);
        assert_eq!(entry.quantity, 3);
        assert_eq!(entry.from_stock, 10);
        assert_eq!(entry.to_stock, 7);
        assert_eq!(entry.resulting_stock, 7);
        assert_eq!(entry.signed_delta(), -3);
        entry.verify().unwrap();
    }

    #[test]
    fn manual_no_op_entry_is_valid() {
        let r = row(7);
        let planned = r.plan_change(ChangeType::ManualUpdate, 0).unwrap();
        let entry = StockHistoryEntry::for_change(&r, &planned, operator(), LedgerMetadata::default(), Utc::now());

        assert_eq!(entry.quantity, 0);
        assert_eq!(entry.from_stock, 7);
        assert_eq!(entry.to_stock, 7);
        entry.verify().unwrap();
    }

    #[test]
    fn verify_rejects_tampered_entries() {
        let r = row(10);
        let planned = r.plan_change(ChangeType::Out, -3).unwrap();
        let mut entry = StockHistoryEntry::for_change(&r, &planned, operator(), LedgerMetadata::default(), Utc::now());

        entry.resulting_stock = 8;
        assert!(matches!(entry.verify(), Err(DomainError::InvariantViolation(_))));

        entry.resulting_stock = 7;
        entry.change_type = ChangeType::In;
        assert!(matches!(entry.verify(), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn metadata_is_carried_into_the_entry() {
        let r = row(10);
        let planned = r.plan_change(ChangeType::Out, -2).unwrap();
        let order_id = OrderId::new();
        let metadata = LedgerMetadata {
            total_amount: Some(3_000),
            ..LedgerMetadata::by(operator()).for_order(order_id)
        };
        let entry = StockHistoryEntry::for_change(&r, &planned, operator(), metadata, Utc::now());

        assert_eq!(entry.order_id, Some(order_id));
        assert_eq!(entry.total_amount, Some(3_000));
    }

    #[test]
    fn change_type_serializes_in_snake_case() {
        let json = serde_json::to_string(&ChangeType::ManualUpdate).unwrap();
        assert_eq!(json, "\"manual_update\"");
    }
}
