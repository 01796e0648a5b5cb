//! Revenue reporting domain module.
//!
//! Derives the per-date, per-branch revenue aggregate (`DailyStat`) from order records.
//! Everything here is a pure function of its inputs; loading orders and overwriting
//! the stored aggregate is the reconciliation job's business (infra crate).

pub mod daily_stat;
pub mod window;

pub use daily_stat::{Accrual, BranchStat, DailyStat, DailyStatBuilder};
pub use window::{BusinessDay, parse_date};
