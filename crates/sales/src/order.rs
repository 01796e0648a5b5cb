use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomledger_core::{Amount, BranchName, DomainError, DomainResult, ItemId, OperatorId, OrderId};

use crate::transfer::{RevenueShares, TransferInfo, split_amount};

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
    Completed,
    Canceled,
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Completed,
    Refunded,
}

impl PaymentStatus {
    /// Money has actually been collected for the order.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Free-form method label ("card", "cash", "account_transfer", ...).
    pub method: String,
    pub status: PaymentStatus,
}

/// Money summary, in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub subtotal: Amount,
    pub delivery_fee: Amount,
    pub total: Amount,
}

/// One line of an order.
///
/// `item_id` is optional: lines typed in by hand (custom arrangements) have no
/// catalog entry and therefore no stock effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: Option<ItemId>,
    pub name: String,
    pub quantity: i64,
    /// Unit price in the smallest currency unit.
    pub price: Amount,
}

impl OrderLine {
    /// `price × quantity`, or `None` when it does not fit in an `Amount`.
    pub fn line_total(&self) -> Option<Amount> {
        self.price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orderer {
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_date: DateTime<Utc>,
    /// Originating branch (where the order was taken and whose stock it consumes).
    pub branch_name: BranchName,
    pub orderer: Orderer,
    pub lines: Vec<OrderLine>,
    pub payment: Payment,
    pub summary: OrderSummary,
    pub status: OrderStatus,
    #[serde(default)]
    pub transfer_info: Option<TransferInfo>,
    pub created_by: OperatorId,
}

impl Order {
    pub fn is_canceled(&self) -> bool {
        self.status == OrderStatus::Canceled
    }

    /// Active transfer that splits this order's revenue, if any.
    pub fn revenue_transfer(&self) -> Option<&TransferInfo> {
        self.transfer_info.as_ref().filter(|t| t.splits_revenue())
    }

    /// How `summary.total` is attributed between origin and fulfilling branch.
    pub fn revenue_shares(&self) -> RevenueShares {
        let amount = self.summary.total;
        match self.revenue_transfer() {
            Some(transfer) => split_amount(amount, transfer.split()),
            None => RevenueShares {
                order_branch: amount,
                process_branch: 0,
            },
        }
    }
}

/// Order as submitted by the order-entry screen, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
    pub branch_name: String,
    pub orderer_name: String,
    #[serde(default)]
    pub orderer_contact: Option<String>,
    pub lines: Vec<OrderLine>,
    pub payment: Payment,
    #[serde(default)]
    pub delivery_fee: Amount,
    /// Explicit summary (discounts, manual totals). Computed from lines when absent.
    #[serde(default)]
    pub summary: Option<OrderSummary>,
    #[serde(default)]
    pub transfer_info: Option<TransferInfo>,
}

impl OrderDraft {
    /// Validate required fields and turn the draft into an order.
    ///
    /// Fails with `Validation` when the orderer name or branch is missing, when a
    /// transfer is malformed, or when money fields are negative.
    pub fn into_order(self, id: OrderId, now: DateTime<Utc>, created_by: OperatorId) -> DomainResult<Order> {
        if self.orderer_name.trim().is_empty() {
            return Err(DomainError::validation("orderer name is required"));
        }
        let branch_name = BranchName::parse(&self.branch_name)
            .map_err(|_| DomainError::validation("branch name is required"))?;

        if self.delivery_fee < 0 {
            return Err(DomainError::validation("delivery fee cannot be negative"));
        }
        if let Some(line) = self.lines.iter().find(|l| l.price < 0) {
            return Err(DomainError::validation(format!("line '{}' has a negative price", line.name)));
        }
        let mut subtotal: Amount = 0;
        for line in self.lines.iter().filter(|l| l.quantity > 0) {
            subtotal = line
                .line_total()
                .and_then(|total| subtotal.checked_add(total))
                .ok_or_else(|| DomainError::validation(format!("line '{}' total is out of range", line.name)))?;
        }
        if let Some(transfer) = &self.transfer_info {
            transfer.validate()?;
            if transfer.process_branch() == Some(&branch_name) {
                return Err(DomainError::validation("an order cannot be transferred to its own branch"));
            }
        }

        let summary = match self.summary {
            Some(summary) => summary,
            None => OrderSummary {
                subtotal,
                delivery_fee: self.delivery_fee,
                total: subtotal
                    .checked_add(self.delivery_fee)
                    .ok_or_else(|| DomainError::validation("order total is out of range"))?,
            },
        };
        if summary.total < 0 {
            return Err(DomainError::validation("order total cannot be negative"));
        }

        Ok(Order {
            id,
            order_date: self.order_date.unwrap_or(now),
            branch_name,
            orderer: Orderer {
                name: self.orderer_name.trim().to_string(),
                contact: self.orderer_contact,
            },
            lines: self.lines,
            payment: self.payment,
            summary,
            status: OrderStatus::Processing,
            transfer_info: self.transfer_info,
            created_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{AmountSplit, TransferStatus};

    fn operator() -> OperatorId {
        OperatorId::parse("staff@florist.example").unwrap()
    }

    fn line(item: &str, quantity: i64, price: Amount) -> OrderLine {
        OrderLine {
            item_id: Some(ItemId::parse(item).unwrap()),
            name: item.to_string(),
            quantity,
            price,
        }
    }

    fn draft() -> OrderDraft {
        OrderDraft {
            order_date: None,
            branch_name: "Gangnam".to_string(),
            orderer_name: "Kim".to_string(),
            orderer_contact: None,
            lines: vec![line("P1", 2, 3_000), line("P2", 1, 4_000)],
            payment: Payment {
                method: "card".to_string(),
                status: PaymentStatus::Paid,
            },
            delivery_fee: 2_500,
            summary: None,
            transfer_info: None,
        }
    }

    #[test]
    fn summary_is_computed_from_lines() {
        let order = draft().into_order(OrderId::new(), Utc::now(), operator()).unwrap();
        assert_eq!(order.summary.subtotal, 10_000);
        assert_eq!(order.summary.delivery_fee, 2_500);
        assert_eq!(order.summary.total, 12_500);
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[test]
    fn oversized_line_total_is_a_validation_error() {
        let mut d = draft();
        d.lines = vec![line("P1", i64::MAX / 2, 3)];
        assert!(matches!(
            d.into_order(OrderId::new(), Utc::now(), operator()),
            Err(DomainError::Validation(_))
        ));

        let mut d = draft();
        d.lines = vec![line("P1", 1, i64::MAX - 10), line("P2", 1, 20)];
        assert!(matches!(
            d.into_order(OrderId::new(), Utc::now(), operator()),
            Err(DomainError::Validation(_))
        ));

        let mut d = draft();
        d.lines = vec![line("P1", 1, i64::MAX - 10)];
        d.delivery_fee = 20;
        assert!(d.into_order(OrderId::new(), Utc::now(), operator()).is_err());
    }

    #[test]
    fn explicit_summary_wins() {
        let mut d = draft();
        d.summary = Some(OrderSummary {
            subtotal: 10_000,
            delivery_fee: 0,
            total: 9_000,
        });
        let order = d.into_order(OrderId::new(), Utc::now(), operator()).unwrap();
        assert_eq!(order.summary.total, 9_000);
    }

    #[test]
    fn missing_orderer_name_is_a_validation_error() {
        let mut d = draft();
        d.orderer_name = "  ".to_string();
        let err = d.into_order(OrderId::new(), Utc::now(), operator()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("orderer")));
    }

    #[test]
    fn missing_branch_is_a_validation_error() {
        let mut d = draft();
        d.branch_name = String::new();
        let err = d.into_order(OrderId::new(), Utc::now(), operator()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("branch")));
    }

    #[test]
    fn transfer_to_own_branch_is_rejected() {
        let mut d = draft();
        d.transfer_info = Some(TransferInfo {
            is_transferred: true,
            status: TransferStatus::Pending,
            process_branch_name: Some(BranchName::parse("Gangnam").unwrap()),
            amount_split: Some(AmountSplit::new(50, 50).unwrap()),
        });
        assert!(d.into_order(OrderId::new(), Utc::now(), operator()).is_err());
    }

    #[test]
    fn revenue_shares_follow_active_transfer_only() {
        let mut order = draft().into_order(OrderId::new(), Utc::now(), operator()).unwrap();
        order.summary.total = 10_000;
        assert_eq!(order.revenue_shares().order_branch, 10_000);

        order.transfer_info = Some(TransferInfo {
            is_transferred: true,
            status: TransferStatus::Pending,
            process_branch_name: Some(BranchName::parse("Mapo").unwrap()),
            amount_split: Some(AmountSplit::new(70, 30).unwrap()),
        });
        assert_eq!(order.revenue_shares().process_branch, 0);

        if let Some(t) = order.transfer_info.as_mut() {
            t.status = TransferStatus::Completed;
        }
        let shares = order.revenue_shares();
        assert_eq!(shares.order_branch, 7_000);
        assert_eq!(shares.process_branch, 3_000);
    }

    #[test]
    fn payment_settlement_states() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Completed.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::Refunded.is_settled());
    }

    #[test]
    fn order_round_trips_through_camel_case_json() {
        let order = draft().into_order(OrderId::new(), Utc::now(), operator()).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("orderDate").is_some());
        assert!(json.get("branchName").is_some());
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
