//! Order transfer between branches and the resulting revenue split.

use serde::{Deserialize, Serialize};

use bloomledger_core::{Amount, BranchName, DomainError, DomainResult, round_half_up_percent};

/// Lifecycle of a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Completed,
    Canceled,
}

/// Percent of the order amount attributed to each side. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountSplit {
    pub order_branch: i64,
    pub process_branch: i64,
}

impl Default for AmountSplit {
    fn default() -> Self {
        Self {
            order_branch: 100,
            process_branch: 0,
        }
    }
}

impl AmountSplit {
    pub fn new(order_branch: i64, process_branch: i64) -> DomainResult<Self> {
        let split = Self {
            order_branch,
            process_branch,
        };
        split.validate()?;
        Ok(split)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !(0..=100).contains(&self.order_branch) || !(0..=100).contains(&self.process_branch) {
            return Err(DomainError::validation("split percentages must be within 0..=100"));
        }
        if self.order_branch + self.process_branch != 100 {
            return Err(DomainError::validation(format!(
                "split percentages must sum to 100 (got {} + {})",
                self.order_branch, self.process_branch
            )));
        }
        Ok(())
    }
}

/// Reassignment of fulfilment from the originating branch to another branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInfo {
    pub is_transferred: bool,
    pub status: TransferStatus,
    #[serde(default)]
    pub process_branch_name: Option<BranchName>,
    #[serde(default)]
    pub amount_split: Option<AmountSplit>,
}

impl TransferInfo {
    /// Whether the split applies: the transfer happened and the fulfilling branch took it.
    pub fn splits_revenue(&self) -> bool {
        self.is_transferred && matches!(self.status, TransferStatus::Accepted | TransferStatus::Completed)
    }

    /// The fulfilling branch, ignoring blank names.
    pub fn process_branch(&self) -> Option<&BranchName> {
        self.process_branch_name.as_ref().filter(|b| !b.is_blank())
    }

    pub fn split(&self) -> AmountSplit {
        self.amount_split.unwrap_or_default()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let Some(split) = &self.amount_split {
            split.validate()?;
        }
        if self.is_transferred && self.process_branch().is_none() {
            return Err(DomainError::validation("transferred order needs a process branch"));
        }
        Ok(())
    }
}

/// Revenue attributed to the originating and fulfilling branch for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevenueShares {
    pub order_branch: Amount,
    pub process_branch: Amount,
}

/// Split `amount` by `split`; the two shares always add up to `amount` exactly.
///
/// The origin share is rounded half-up and the process branch receives the remainder.
/// Stored splits outside 0..=100 are clamped rather than rejected.
pub fn split_amount(amount: Amount, split: AmountSplit) -> RevenueShares {
    let percent = split.order_branch.clamp(0, 100);
    let order_branch = round_half_up_percent(amount, percent);
    RevenueShares {
        order_branch,
        process_branch: amount - order_branch,
    }
}
