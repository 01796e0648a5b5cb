use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomledger_core::{Amount, BranchName, OrderId};
use bloomledger_events::Event;

/// Notifications raised by order placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderEvent {
    /// The order was persisted and all of its stock effects were applied.
    OrderPlaced {
        order_id: OrderId,
        branch: BranchName,
        process_branch: Option<BranchName>,
        total: Amount,
        applied_lines: usize,
        skipped_lines: usize,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced { .. } => "sales.order.placed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced { occurred_at, .. } => *occurred_at,
        }
    }

    fn subject_id(&self) -> String {
        match self {
            OrderEvent::OrderPlaced { order_id, .. } => order_id.to_string(),
        }
    }
}
