use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use bloomledger_core::{HistoryEntryId, OrderId, Versioned};
use bloomledger_inventory::{StockHistoryEntry, StockKey, StockRow};
use bloomledger_reporting::DailyStat;
use bloomledger_sales::{Order, OrderStatus};

use super::query::{HistoryFilter, HistoryQuery, HistoryQueryResult, Pagination};
use super::{DailyStatStore, HistoryStore, OrderStore, StockCommit, StockStore, StoreError};

/// In-memory store implementing every storage trait of the engine.
///
/// Intended for tests, benchmarks and the CLI. Row commits take the row lock and then
/// the ledger lock, so a row update and its entry become visible together.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<HashMap<StockKey, StockRow>>,
    ledger: RwLock<Vec<StockHistoryEntry>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    daily_stats: RwLock<BTreeMap<String, DailyStat>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row as-is (fixtures, snapshots). Overwrites any existing row.
    pub fn seed_row(&self, row: StockRow) -> Result<(), StoreError> {
        reject_negative(&row)?;
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        rows.insert(row.key(), row);
        Ok(())
    }

    /// Every stock row, ordered by key.
    pub fn rows(&self) -> Result<Vec<StockRow>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        let mut all: Vec<_> = rows.values().cloned().collect();
        all.sort_by(|a, b| a.stock_key().cmp(&b.stock_key()));
        Ok(all)
    }

    /// Number of ledger entries written so far.
    pub fn ledger_len(&self) -> Result<usize, StoreError> {
        Ok(self.ledger.read().map_err(|_| StoreError::poisoned())?.len())
    }

    fn newest_first(mut entries: Vec<StockHistoryEntry>) -> Vec<StockHistoryEntry> {
        // Stable sort keeps append order for equal timestamps; reverse puts the latest append first.
        entries.sort_by_key(|e| e.timestamp);
        entries.reverse();
        entries
    }
}

fn reject_negative(row: &StockRow) -> Result<(), StoreError> {
    if row.quantity < 0 {
        return Err(StoreError::InvalidWrite(format!(
            "{} cannot start with negative stock",
            row.key()
        )));
    }
    Ok(())
}

impl StockStore for InMemoryStore {
    fn stock_row(&self, key: &StockKey) -> Result<Option<StockRow>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned())?;
        Ok(rows.get(key).cloned())
    }

    fn create_row(&self, row: StockRow) -> Result<StockRow, StoreError> {
        reject_negative(&row)?;
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let key = row.key();
        if rows.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        let created = StockRow { version: 0, ..row };
        rows.insert(key, created.clone());
        Ok(created)
    }

    fn commit(&self, commit: StockCommit) -> Result<StockRow, StoreError> {
        let StockCommit {
            key,
            expected_version,
            entry,
        } = commit;

        entry
            .verify()
            .map_err(|e| StoreError::InvalidWrite(e.to_string()))?;
        if entry.item_id != key.item_id || entry.branch != key.branch {
            return Err(StoreError::InvalidWrite(format!(
                "ledger entry for {}@{} committed against {key}",
                entry.item_id, entry.branch
            )));
        }

        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned())?;
        let row = rows
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        expected_version
            .check(row.version())
            .map_err(|e| StoreError::Conflict(format!("{key}: {e}")))?;
        if entry.from_stock != row.quantity {
            return Err(StoreError::InvalidWrite(format!(
                "{key}: entry starts from {} but row holds {}",
                entry.from_stock, row.quantity
            )));
        }

        let mut ledger = self.ledger.write().map_err(|_| StoreError::poisoned())?;
        row.quantity = entry.to_stock;
        row.version += 1;
        ledger.push(entry);

        Ok(row.clone())
    }
}

impl HistoryStore for InMemoryStore {
    fn history(&self, filter: &HistoryFilter) -> Result<Vec<StockHistoryEntry>, StoreError> {
        let ledger = self.ledger.read().map_err(|_| StoreError::poisoned())?;
        let matching = ledger.iter().filter(|e| filter.matches(e)).cloned().collect();
        Ok(Self::newest_first(matching))
    }

    fn history_for_order(&self, order_id: OrderId) -> Result<Vec<StockHistoryEntry>, StoreError> {
        let ledger = self.ledger.read().map_err(|_| StoreError::poisoned())?;
        Ok(ledger
            .iter()
            .filter(|e| e.order_id == Some(order_id))
            .cloned()
            .collect())
    }
}

impl OrderStore for InMemoryStore {
    fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(|_| StoreError::poisoned())?;
        if orders.contains_key(&order.id) {
            return Err(StoreError::AlreadyExists(format!("order {}", order.id)));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    fn order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().map_err(|_| StoreError::poisoned())?;
        Ok(orders.get(&order_id).cloned())
    }

    fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(|_| StoreError::poisoned())?;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        order.status = status;
        Ok(())
    }

    fn orders_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(|_| StoreError::poisoned())?;
        let mut window: Vec<_> = orders
            .values()
            .filter(|o| o.order_date >= start && o.order_date < end)
            .cloned()
            .collect();
        window.sort_by(|a, b| a.order_date.cmp(&b.order_date).then(a.id.cmp(&b.id)));
        Ok(window)
    }
}

impl DailyStatStore for InMemoryStore {
    fn daily_stat(&self, date: &str) -> Result<Option<DailyStat>, StoreError> {
        let stats = self.daily_stats.read().map_err(|_| StoreError::poisoned())?;
        Ok(stats.get(date).cloned())
    }

    fn overwrite_daily_stat(&self, stat: DailyStat) -> Result<(), StoreError> {
        let mut stats = self.daily_stats.write().map_err(|_| StoreError::poisoned())?;
        stats.insert(stat.date.clone(), stat);
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistoryQuery for InMemoryStore {
    async fn query_history(
        &self,
        filter: HistoryFilter,
        pagination: Pagination,
    ) -> Result<HistoryQueryResult, StoreError> {
        let matching = self.history(&filter)?;
        Ok(HistoryQueryResult::paginate(matching, pagination))
    }

    async fn history_entry(&self, id: HistoryEntryId) -> Result<Option<StockHistoryEntry>, StoreError> {
        let ledger = self.ledger.read().map_err(|_| StoreError::poisoned())?;
        Ok(ledger.iter().find(|e| e.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloomledger_core::{BranchName, ExpectedVersion, ItemId, OperatorId};
    use bloomledger_inventory::{ChangeType, ItemType, LedgerMetadata};
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap()
    }

    fn row(quantity: i64) -> StockRow {
        StockRow {
            quantity,
            ..StockRow::new(
                ItemId::parse("M1").unwrap(),
                BranchName::parse("A").unwrap(),
                "Red rose",
                ItemType::Material,
                1_500,
            )
        }
    }

    fn out_commit(current: &StockRow, n: i64) -> StockCommit {
        let planned = current.plan_change(ChangeType::Out, -n).unwrap();
        let entry = StockHistoryEntry::for_change(
            current,
            &planned,
            OperatorId::parse("staff").unwrap(),
            LedgerMetadata::default(),
            test_time(),
        );
        StockCommit {
            key: current.stock_key(),
            expected_version: ExpectedVersion::Exact(current.version),
            entry,
        }
    }

    #[test]
    fn commit_updates_row_and_appends_entry_together() {
        let store = InMemoryStore::new();
        let created = store.create_row(row(10)).unwrap();

        let committed = store.commit(out_commit(&created, 3)).unwrap();
        assert_eq!(committed.quantity, 7);
        assert_eq!(committed.version, 1);
        assert_eq!(store.ledger_len().unwrap(), 1);
        assert_eq!(store.stock_row(&created.stock_key()).unwrap().unwrap().quantity, 7);
    }

    #[test]
    fn stale_version_is_a_conflict_and_writes_nothing() {
        let store = InMemoryStore::new();
        let created = store.create_row(row(10)).unwrap();
        store.commit(out_commit(&created, 3)).unwrap();

        // Decision based on the version-0 snapshot.
        let err = store.commit(out_commit(&created, 2)).unwrap_err();
        match err {
            StoreError::Conflict(msg) => assert!(msg.contains("actual: 1"), "{msg}"),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.ledger_len().unwrap(), 1);
        assert_eq!(store.stock_row(&created.stock_key()).unwrap().unwrap().quantity, 7);
    }

    #[test]
    fn negative_rows_are_refused_on_every_entry_path() {
        let store = InMemoryStore::new();
        assert!(matches!(store.seed_row(row(-5)), Err(StoreError::InvalidWrite(_))));
        assert!(matches!(store.create_row(row(-1)), Err(StoreError::InvalidWrite(_))));
        assert!(store.stock_row(&row(0).stock_key()).unwrap().is_none());

        store.seed_row(row(0)).unwrap();
        assert_eq!(store.stock_row(&row(0).stock_key()).unwrap().unwrap().quantity, 0);
    }

    #[test]
    fn create_row_rejects_duplicates() {
        let store = InMemoryStore::new();
        store.create_row(row(0)).unwrap();
        assert!(matches!(store.create_row(row(5)), Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn commit_refuses_entries_that_do_not_continue_the_row() {
        let store = InMemoryStore::new();
        let created = store.create_row(row(10)).unwrap();
        let mut commit = out_commit(&created, 3);
        commit.expected_version = ExpectedVersion::Any;
        commit.entry.from_stock = 9;
        commit.entry.to_stock = 6;
        commit.entry.resulting_stock = 6;
        assert!(matches!(store.commit(commit), Err(StoreError::InvalidWrite(_))));
        assert_eq!(store.ledger_len().unwrap(), 0);
    }

    #[test]
    fn commit_against_missing_row_is_not_found() {
        let store = InMemoryStore::new();
        let detached = row(4);
        assert!(matches!(store.commit(out_commit(&detached, 1)), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn overwrite_replaces_the_whole_daily_stat() {
        let store = InMemoryStore::new();
        let mut stat = DailyStat {
            date: "2024-05-01".to_string(),
            total_revenue: 100,
            total_settled_amount: 0,
            total_order_count: 1,
            branches: BTreeMap::new(),
            recomputed_at: test_time(),
        };
        store.overwrite_daily_stat(stat.clone()).unwrap();
        stat.total_revenue = 40;
        store.overwrite_daily_stat(stat.clone()).unwrap();
        assert_eq!(store.daily_stat("2024-05-01").unwrap(), Some(stat));
    }
}
