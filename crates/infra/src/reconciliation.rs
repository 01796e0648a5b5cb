//! Revenue reconciliation job: rebuild a date's `DailyStat` from the order records.
//!
//! The job is the only writer of daily aggregates. It scans the day's orders, folds
//! them through `DailyStatBuilder` and overwrites the stored record in one write at the
//! end, so a failed scan leaves the previous record untouched and a repeated run yields
//! the same figures.

use std::sync::Arc;

use chrono::FixedOffset;
use thiserror::Error;
use tracing::instrument;

use bloomledger_reporting::{Accrual, BusinessDay, DailyStat, DailyStatBuilder};

use crate::context::Clock;
use crate::store::{DailyStatStore, OrderStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters of one run, for logs and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub accrued: usize,
    pub canceled: usize,
    pub process_branch_missing: usize,
}

pub struct RevenueReconciliationJob<S> {
    store: S,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl<S> RevenueReconciliationJob<S>
where
    S: OrderStore + DailyStatStore,
{
    pub fn new(store: S, offset: FixedOffset, clock: Arc<dyn Clock>) -> Self {
        Self { store, offset, clock }
    }

    /// Recompute and overwrite the aggregate for `date` (`YYYY-MM-DD`, business-local).
    pub fn reconcile(&self, date: &str) -> Result<DailyStat, ReconcileError> {
        let day = BusinessDay::parse(date, self.offset)
            .map_err(|e| ReconcileError::InvalidDate(e.to_string()))?;
        self.reconcile_day(day).map(|(stat, _)| stat)
    }

    /// Reconcile every day from `from` to `to`, both inclusive.
    ///
    /// Stops at the first failing day; days before it are already overwritten.
    pub fn reconcile_range(&self, from: &str, to: &str) -> Result<Vec<DailyStat>, ReconcileError> {
        let first = BusinessDay::parse(from, self.offset)
            .map_err(|e| ReconcileError::InvalidDate(e.to_string()))?;
        let last = BusinessDay::parse(to, self.offset)
            .map_err(|e| ReconcileError::InvalidDate(e.to_string()))?;
        if last.date() < first.date() {
            return Err(ReconcileError::InvalidDate(format!("range end {to} precedes start {from}")));
        }

        let mut stats = Vec::new();
        let mut day = Some(first);
        while let Some(current) = day.filter(|d| d.date() <= last.date()) {
            stats.push(self.reconcile_day(current)?.0);
            day = current.next();
        }
        Ok(stats)
    }

    #[instrument(skip(self), fields(date = %day.key()))]
    pub fn reconcile_day(&self, day: BusinessDay) -> Result<(DailyStat, ReconcileReport), ReconcileError> {
        let orders = self.store.orders_between(day.start(), day.end())?;

        let mut builder = DailyStatBuilder::new(day);
        let mut report = ReconcileReport {
            scanned: orders.len(),
            ..ReconcileReport::default()
        };
        for order in &orders {
            match builder.accrue(order) {
                Accrual::Accrued { .. } => report.accrued += 1,
                Accrual::Canceled => report.canceled += 1,
                Accrual::ProcessBranchMissing { shares, .. } => {
                    report.accrued += 1;
                    report.process_branch_missing += 1;
                    tracing::warn!(
                        order_id = %order.id,
                        unattributed = shares.process_branch,
                        "transferred order has no process branch; its share is not attributed"
                    );
                }
                Accrual::OutsideWindow => {
                    tracing::debug!(order_id = %order.id, "store returned an order outside the window");
                }
            }
        }

        let stat = builder.finish(self.clock.now());
        self.store.overwrite_daily_stat(stat.clone())?;

        tracing::info!(
            total_revenue = stat.total_revenue,
            total_settled_amount = stat.total_settled_amount,
            total_order_count = stat.total_order_count,
            scanned = report.scanned,
            canceled = report.canceled,
            "daily stat recomputed"
        );
        Ok((stat, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FixedClock;
    use crate::store::InMemoryStore;
    use bloomledger_core::{BranchName, OperatorId, OrderId};
    use bloomledger_sales::{
        AmountSplit, Order, OrderStatus, OrderSummary, Orderer, Payment, PaymentStatus, TransferInfo,
        TransferStatus,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        kst().with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().with_timezone(&Utc)
    }

    fn order(branch: &str, total: i64, date: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::new(),
            order_date: date,
            branch_name: BranchName::parse(branch).unwrap(),
            orderer: Orderer {
                name: "Lee".to_string(),
                contact: None,
            },
            lines: vec![],
            payment: Payment {
                method: "card".to_string(),
                status: PaymentStatus::Paid,
            },
            summary: OrderSummary {
                subtotal: total,
                delivery_fee: 0,
                total,
            },
            status: OrderStatus::Completed,
            transfer_info: None,
            created_by: OperatorId::parse("staff").unwrap(),
        }
    }

    fn job(store: Arc<InMemoryStore>) -> RevenueReconciliationJob<Arc<InMemoryStore>> {
        RevenueReconciliationJob::new(store, kst(), Arc::new(FixedClock(at(2024, 5, 2, 4))))
    }

    #[test]
    fn window_follows_local_midnight() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_order(order("A", 1_000, at(2024, 5, 1, 0))).unwrap();
        store.insert_order(order("A", 2_000, at(2024, 5, 1, 23))).unwrap();
        store.insert_order(order("A", 4_000, at(2024, 5, 2, 0))).unwrap();

        let stat = job(store).reconcile("2024-05-01").unwrap();
        assert_eq!(stat.total_revenue, 3_000);
        assert_eq!(stat.total_order_count, 2);
    }

    #[test]
    fn transfer_split_and_missing_process_branch() {
        let store = Arc::new(InMemoryStore::new());
        let mut split = order("A", 10_000, at(2024, 5, 1, 10));
        split.transfer_info = Some(TransferInfo {
            is_transferred: true,
            status: TransferStatus::Accepted,
            process_branch_name: Some(BranchName::parse("B").unwrap()),
            amount_split: Some(AmountSplit::new(70, 30).unwrap()),
        });
        let mut orphan = order("A", 1_000, at(2024, 5, 1, 11));
        orphan.transfer_info = Some(TransferInfo {
            is_transferred: true,
            status: TransferStatus::Completed,
            process_branch_name: None,
            amount_split: Some(AmountSplit::new(50, 50).unwrap()),
        });
        store.insert_order(split).unwrap();
        store.insert_order(orphan).unwrap();

        let (stat, report) = job(store)
            .reconcile_day(BusinessDay::parse("2024-05-01", kst()).unwrap())
            .unwrap();
        assert_eq!(report.process_branch_missing, 1);
        assert_eq!(stat.branch(&BranchName::parse("A").unwrap()).unwrap().revenue, 7_500);
        assert_eq!(stat.branch(&BranchName::parse("B").unwrap()).unwrap().revenue, 3_000);
        assert_eq!(stat.total_order_count, 2);
    }

    #[test]
    fn invalid_date_is_rejected_without_writing() {
        let store = Arc::new(InMemoryStore::new());
        assert!(matches!(
            job(store.clone()).reconcile("2024-13-01"),
            Err(ReconcileError::InvalidDate(_))
        ));
        assert!(store.daily_stat("2024-13-01").unwrap().is_none());
    }

    #[test]
    fn range_writes_one_record_per_day() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_order(order("A", 1_000, at(2024, 5, 1, 9))).unwrap();
        store.insert_order(order("B", 2_000, at(2024, 5, 3, 9))).unwrap();

        let stats = job(store.clone()).reconcile_range("2024-05-01", "2024-05-03").unwrap();
        let dates: Vec<_> = stats.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(dates, ["2024-05-01", "2024-05-02", "2024-05-03"]);
        assert_eq!(store.daily_stat("2024-05-02").unwrap().unwrap().total_revenue, 0);

        assert!(job(store).reconcile_range("2024-05-03", "2024-05-01").is_err());
    }
}
