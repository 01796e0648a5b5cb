//! Inventory domain module: per-branch stock rows and the stock history ledger.
//!
//! This crate contains the stock rules (non-negative quantities, ledger arithmetic)
//! as deterministic domain logic (no IO, no storage, no retries).

pub mod events;
pub mod history;
pub mod stock;

pub use events::InventoryEvent;
pub use history::{ChangeType, LedgerMetadata, StockHistoryEntry};
pub use stock::{ChangeRejected, ItemType, PlannedChange, StockKey, StockRow};
