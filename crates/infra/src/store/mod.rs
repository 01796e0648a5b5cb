//! Storage boundary for stock rows, the stock ledger, orders and daily aggregates.
//!
//! The traits make no storage assumptions: the in-memory implementation backs tests
//! and the CLI, and a document/SQL backend only has to honour the same contracts.

pub mod in_memory;
pub mod query;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use bloomledger_core::{ExpectedVersion, OrderId};
use bloomledger_inventory::{StockHistoryEntry, StockKey, StockRow};
use bloomledger_reporting::DailyStat;
use bloomledger_sales::{Order, OrderStatus};

pub use in_memory::InMemoryStore;
pub use query::{HistoryFilter, HistoryQuery, HistoryQueryResult, Pagination};

/// Storage operation error.
///
/// These are **infrastructure errors** (availability, concurrency, write guards) as
/// opposed to domain errors (validation, insufficient stock).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed; the caller may re-read and retry.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// The write would break a ledger invariant and was refused.
    #[error("invalid write: {0}")]
    InvalidWrite(String),

    /// Backend unreachable, lock poisoned, or similar.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Unavailable("lock poisoned".to_string())
    }
}

/// A single-row read-modify-write unit.
///
/// The entry's `to_stock` becomes the row quantity; `commit` writes the row and
/// appends the entry together or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockCommit {
    pub key: StockKey,
    /// Version the decision was based on (normally `Exact(row.version)`).
    pub expected_version: ExpectedVersion,
    pub entry: StockHistoryEntry,
}

/// Authoritative per-branch stock rows.
///
/// Implementations must:
/// - check `expected_version` against the committed row inside the same critical
///   section that writes it
/// - bump the row version by exactly one per commit
/// - persist the row update and the ledger entry atomically
/// - refuse any write that leaves the quantity negative
pub trait StockStore: Send + Sync {
    fn stock_row(&self, key: &StockKey) -> Result<Option<StockRow>, StoreError>;

    /// Insert a new row (catalog add / first stock-in). Fails with `AlreadyExists`.
    fn create_row(&self, row: StockRow) -> Result<StockRow, StoreError>;

    /// Commit one stock change; returns the row as committed.
    fn commit(&self, commit: StockCommit) -> Result<StockRow, StoreError>;
}

/// Append-only stock ledger (read side; entries are only written via `StockStore::commit`).
pub trait HistoryStore: Send + Sync {
    /// Entries matching `filter`, newest first.
    fn history(&self, filter: &HistoryFilter) -> Result<Vec<StockHistoryEntry>, StoreError>;

    /// Entries written on behalf of one order, oldest first.
    fn history_for_order(&self, order_id: OrderId) -> Result<Vec<StockHistoryEntry>, StoreError>;
}

/// Order records.
pub trait OrderStore: Send + Sync {
    fn insert_order(&self, order: Order) -> Result<(), StoreError>;

    fn order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), StoreError>;

    /// Orders with `start <= order_date < end`, ordered by `order_date`.
    fn orders_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
}

/// Derived per-date aggregates.
pub trait DailyStatStore: Send + Sync {
    fn daily_stat(&self, date: &str) -> Result<Option<DailyStat>, StoreError>;

    /// Replace the record for `stat.date` as a whole (never a partial merge).
    fn overwrite_daily_stat(&self, stat: DailyStat) -> Result<(), StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn stock_row(&self, key: &StockKey) -> Result<Option<StockRow>, StoreError> {
        (**self).stock_row(key)
    }

    fn create_row(&self, row: StockRow) -> Result<StockRow, StoreError> {
        (**self).create_row(row)
    }

    fn commit(&self, commit: StockCommit) -> Result<StockRow, StoreError> {
        (**self).commit(commit)
    }
}

impl<S> HistoryStore for Arc<S>
where
    S: HistoryStore + ?Sized,
{
    fn history(&self, filter: &HistoryFilter) -> Result<Vec<StockHistoryEntry>, StoreError> {
        (**self).history(filter)
    }

    fn history_for_order(&self, order_id: OrderId) -> Result<Vec<StockHistoryEntry>, StoreError> {
        (**self).history_for_order(order_id)
    }
}

impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        (**self).insert_order(order)
    }

    fn order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).order(order_id)
    }

    fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        (**self).set_order_status(order_id, status)
    }

    fn orders_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        (**self).orders_between(start, end)
    }
}

impl<S> DailyStatStore for Arc<S>
where
    S: DailyStatStore + ?Sized,
{
    fn daily_stat(&self, date: &str) -> Result<Option<DailyStat>, StoreError> {
        (**self).daily_stat(date)
    }

    fn overwrite_daily_stat(&self, stat: DailyStat) -> Result<(), StoreError> {
        (**self).overwrite_daily_stat(stat)
    }
}
