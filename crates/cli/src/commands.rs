use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use bloomledger_core::OperatorId;
use bloomledger_events::{EventEnvelope, InMemoryEventBus};
use bloomledger_infra::{
    Compensation, EngineConfig, InMemoryStore, OpenBranchDirectory, OrderPlacementCoordinator, OrderStore,
    PlacementError, PlacementReceipt, RevenueReconciliationJob, StaticOperator, StockTransactionManager,
    SystemClock,
};
use bloomledger_inventory::StockRow;
use bloomledger_reporting::DailyStat;
use bloomledger_sales::{Order, OrderDraft};

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn reconcile(
    orders: Vec<Order>,
    from: &str,
    to: Option<&str>,
    config: &EngineConfig,
) -> anyhow::Result<Vec<DailyStat>> {
    let store = Arc::new(InMemoryStore::new());
    let loaded = orders.len();
    for order in orders {
        let id = order.id;
        store
            .insert_order(order)
            .with_context(|| format!("loading order {id}"))?;
    }
    tracing::info!(orders = loaded, "orders loaded");

    let job = RevenueReconciliationJob::new(store, config.business_offset(), Arc::new(SystemClock));
    let stats = job.reconcile_range(from, to.unwrap_or(from))?;
    Ok(stats)
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PlacementResult {
    Placed(PlacementReceipt),
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        compensation: Option<Compensation>,
    },
}

#[derive(Debug, Serialize)]
pub struct PlacementRun {
    pub placements: Vec<PlacementResult>,
    pub stock: Vec<StockRow>,
    pub ledger_entries: usize,
}

/// Place every draft in file order against `rows`. A failed draft does not stop the run.
pub fn place(
    rows: Vec<StockRow>,
    drafts: Vec<OrderDraft>,
    operator: OperatorId,
    config: EngineConfig,
) -> anyhow::Result<PlacementRun> {
    let store = Arc::new(InMemoryStore::new());
    for row in rows {
        let key = row.stock_key();
        store
            .seed_row(row)
            .with_context(|| format!("seeding stock row {key}"))?;
    }

    let stm = StockTransactionManager::new(
        store.clone(),
        Arc::new(StaticOperator(operator)),
        Arc::new(SystemClock),
        config.max_stock_retries,
    );
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
    let coordinator = OrderPlacementCoordinator::new(stm, Arc::new(OpenBranchDirectory), bus, config);

    let placements = drafts
        .into_iter()
        .map(|draft| match coordinator.place_order(draft, None) {
            Ok(receipt) => PlacementResult::Placed(receipt),
            Err(err) => {
                tracing::warn!(error = %err, "draft not placed");
                let compensation = match &err {
                    PlacementError::LineFailed { compensation, .. } => Some(compensation.clone()),
                    _ => None,
                };
                PlacementResult::Failed {
                    error: err.to_string(),
                    compensation,
                }
            }
        })
        .collect();

    Ok(PlacementRun {
        placements,
        stock: store.rows()?,
        ledger_entries: store.ledger_len()?,
    })
}
