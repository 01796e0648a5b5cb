use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomledger_core::{BranchName, ItemId};
use bloomledger_events::Event;

/// Notifications raised by stock mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryEvent {
    /// A stock-out left the row at zero.
    StockDepleted {
        item_id: ItemId,
        branch: BranchName,
        item_name: String,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockDepleted { .. } => "inventory.stock.depleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockDepleted { occurred_at, .. } => *occurred_at,
        }
    }

    fn subject_id(&self) -> String {
        match self {
            InventoryEvent::StockDepleted { item_id, branch, .. } => format!("{item_id}@{branch}"),
        }
    }
}
