//! Per-date revenue aggregate.
//!
//! A `DailyStat` is always rebuilt from scratch out of the day's orders and then
//! overwrites the stored record; it is never adjusted in place. Feeding the same
//! orders twice therefore yields the same figures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomledger_core::{Amount, BranchName};
use bloomledger_sales::{Order, RevenueShares};

use crate::window::BusinessDay;

/// Figures of one branch for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchStat {
    pub revenue: Amount,
    pub settled_amount: Amount,
    pub order_count: u64,
}

/// Derived daily summary, keyed by its `YYYY-MM-DD` date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: String,
    pub total_revenue: Amount,
    pub total_settled_amount: Amount,
    pub total_order_count: u64,
    /// Keyed by `BranchName::storage_key()`; ordered so serialization is stable.
    pub branches: BTreeMap<String, BranchStat>,
    pub recomputed_at: DateTime<Utc>,
}

impl DailyStat {
    /// Look up a branch the same way the builder stored it.
    pub fn branch(&self, name: &BranchName) -> Option<&BranchStat> {
        self.branches.get(&name.storage_key())
    }

    /// Equal in every figure, ignoring when it was recomputed.
    pub fn same_figures(&self, other: &DailyStat) -> bool {
        self.date == other.date
            && self.total_revenue == other.total_revenue
            && self.total_settled_amount == other.total_settled_amount
            && self.total_order_count == other.total_order_count
            && self.branches == other.branches
    }
}

/// What happened to one order fed into the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accrual {
    /// Canceled orders contribute nothing.
    Canceled,
    /// The order date lies outside the day being built.
    OutsideWindow,
    /// Shares were accrued to the origin (and fulfilling) branch.
    Accrued { shares: RevenueShares, settled: bool },
    /// Transferred order without a fulfilling branch: only the origin share was accrued.
    ProcessBranchMissing { shares: RevenueShares, settled: bool },
}

/// Accumulates one day's orders into a `DailyStat`.
#[derive(Debug, Clone)]
pub struct DailyStatBuilder {
    day: BusinessDay,
    branches: BTreeMap<String, BranchStat>,
}

impl DailyStatBuilder {
    pub fn new(day: BusinessDay) -> Self {
        Self {
            day,
            branches: BTreeMap::new(),
        }
    }

    pub fn day(&self) -> BusinessDay {
        self.day
    }

    /// Accrue one order.
    ///
    /// The origin branch receives its share and one order count; the fulfilling branch
    /// of an accepted/completed transfer receives the remainder but no order count.
    /// Settled payments add the same shares to `settled_amount`.
    pub fn accrue(&mut self, order: &Order) -> Accrual {
        if order.is_canceled() {
            return Accrual::Canceled;
        }
        if !self.day.contains(order.order_date) {
            return Accrual::OutsideWindow;
        }

        let shares = order.revenue_shares();
        let settled = order.payment.status.is_settled();

        let origin = self.entry(&order.branch_name);
        origin.revenue += shares.order_branch;
        origin.order_count += 1;
        if settled {
            origin.settled_amount += shares.order_branch;
        }

        let Some(transfer) = order.revenue_transfer() else {
            return Accrual::Accrued { shares, settled };
        };
        let Some(process_branch) = transfer.process_branch() else {
            return Accrual::ProcessBranchMissing { shares, settled };
        };

        let process = self.entry(process_branch);
        process.revenue += shares.process_branch;
        if settled {
            process.settled_amount += shares.process_branch;
        }

        Accrual::Accrued { shares, settled }
    }

    /// Sum branch figures into the day totals.
    pub fn finish(self, recomputed_at: DateTime<Utc>) -> DailyStat {
        let mut total_revenue = 0;
        let mut total_settled_amount = 0;
        let mut total_order_count = 0;
        for stat in self.branches.values() {
            total_revenue += stat.revenue;
            total_settled_amount += stat.settled_amount;
            total_order_count += stat.order_count;
        }

        DailyStat {
            date: self.day.key(),
            total_revenue,
            total_settled_amount,
            total_order_count,
            branches: self.branches,
            recomputed_at,
        }
    }

    fn entry(&mut self, branch: &BranchName) -> &mut BranchStat {
        self.branches.entry(branch.storage_key()).or_default()
    }
}
