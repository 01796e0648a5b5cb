//! Infrastructure layer: storage boundary, configuration and the services that
//! drive the inventory ledger and revenue reconciliation.
//!
//! - `stock_tx`: the single mutation path for stock rows (optimistic, retried)
//! - `placement`, `adjustment`, `receiving`: the write entry points built on it
//! - `reconciliation`: rebuilds daily revenue aggregates from orders
//! - `audit`: finds orders whose stock effects are only partly applied

pub mod adjustment;
pub mod audit;
pub mod config;
pub mod context;
pub mod placement;
pub mod receiving;
pub mod reconciliation;
pub mod stock_tx;
pub mod store;


pub use adjustment::{ManualAdjustmentService, SetStockLevel};
pub use audit::{AuditError, AuditStatus, ItemAudit, OrderAudit, OrderStockAudit};
pub use config::{EngineConfig, MissingItemPolicy, PartialFailurePolicy};
pub use context::{
    Anonymous, BranchDirectory, BranchInfo, Clock, FixedClock, InMemoryBranchDirectory,
    OpenBranchDirectory, OperatorIdentity, StaticOperator, SystemClock,
};
pub use placement::{
    Compensation, LineOutcome, OrderPlacementCoordinator, PlacementError, PlacementReceipt, SkipReason,
};
pub use receiving::{ReceiveStock, StockReceivingService};
pub use reconciliation::{ReconcileError, ReconcileReport, RevenueReconciliationJob};
pub use stock_tx::{AppliedChange, StockChangeRequest, StockError, StockTransactionManager};
pub use store::{
    DailyStatStore, HistoryFilter, HistoryQuery, HistoryQueryResult, HistoryStore, InMemoryStore,
    OrderStore, Pagination, StockCommit, StockStore, StoreError,
};
