use serde::{Deserialize, Serialize};
use thiserror::Error;

use bloomledger_core::{Amount, BranchName, ItemId, Versioned};

use crate::history::ChangeType;

/// Identity of a stock row: the same item has independent rows per branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub item_id: ItemId,
    pub branch: BranchName,
}

impl StockKey {
    pub fn new(item_id: ItemId, branch: BranchName) -> Self {
        Self { item_id, branch }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.item_id, self.branch)
    }
}

/// What kind of catalog entry a stock row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Sellable arrangement or product.
    Product,
    /// Raw material (flowers, ribbon, wrapping) consumed by products.
    Material,
}

/// Authoritative current quantity of one item at one branch.
///
/// Only the stock transaction path mutates `quantity`; every committed mutation
/// bumps `version` by one and is paired with exactly one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub item_id: ItemId,
    pub branch: BranchName,
    pub item_name: String,
    pub item_type: ItemType,
    pub quantity: i64,
    /// Unit price in the smallest currency unit.
    pub unit_price: Amount,
    pub supplier: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub version: u64,
}

/// Result of a successful stock decision, not yet committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedChange {
    pub change_type: ChangeType,
    pub from_stock: i64,
    pub to_stock: i64,
}

impl PlannedChange {
    pub fn signed_delta(&self) -> i64 {
        self.to_stock - self.from_stock
    }
}

/// Why a stock decision was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeRejected {
    #[error("insufficient stock for {item_name}: current {current_stock}, requested {requested}")]
    InsufficientStock {
        item_name: String,
        current_stock: i64,
        requested: i64,
    },

    #[error("invalid stock change: {0}")]
    Invalid(String),
}

impl StockRow {
    /// Create a fresh row with zero stock (catalog add / first stock-in).
    pub fn new(
        item_id: ItemId,
        branch: BranchName,
        item_name: impl Into<String>,
        item_type: ItemType,
        unit_price: Amount,
    ) -> Self {
        Self {
            item_id,
            branch,
            item_name: item_name.into(),
            item_type,
            quantity: 0,
            unit_price,
            supplier: None,
            category: None,
            version: 0,
        }
    }

    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.item_id.clone(), self.branch.clone())
    }

    /// Decide the outcome of applying `delta` with the given change type.
    ///
    /// - `In` requires a positive delta.
    /// - `Out` requires a negative delta and never lets the quantity drop below zero.
    /// - `ManualUpdate` accepts any delta (including zero) as long as the result is >= 0.
    ///
    /// Pure: the row is not modified.
    pub fn plan_change(&self, change_type: ChangeType, delta: i64) -> Result<PlannedChange, ChangeRejected> {
        match change_type {
            ChangeType::In if delta <= 0 => {
                return Err(ChangeRejected::Invalid(format!(
                    "stock-in delta must be positive (got {delta})"
                )));
            }
            ChangeType::Out if delta >= 0 => {
                return Err(ChangeRejected::Invalid(format!(
                    "stock-out delta must be negative (got {delta})"
                )));
            }
            _ => {}
        }

        let to_stock = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| ChangeRejected::Invalid("stock quantity overflow".to_string()))?;

        if to_stock < 0 {
            return Err(match change_type {
                ChangeType::ManualUpdate => {
                    ChangeRejected::Invalid("new quantity cannot be negative".to_string())
                }
                _ => ChangeRejected::InsufficientStock {
                    item_name: self.item_name.clone(),
                    current_stock: self.quantity,
                    requested: -delta,
                },
            });
        }

        Ok(PlannedChange {
            change_type,
            from_stock: self.quantity,
            to_stock,
        })
    }

    /// The row as it looks once `change` is committed.
    pub fn committed(&self, change: &PlannedChange) -> Self {
        Self {
            quantity: change.to_stock,
            version: self.version + 1,
            ..self.clone()
        }
    }
}

impl Versioned for StockRow {
    type Key = StockKey;

    fn key(&self) -> Self::Key {
        self.stock_key()
    }

    fn version(&self) -> u64 {
        self.version
    }
}
