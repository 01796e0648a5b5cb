//! Stock history query interface for the history/audit screens.
//!
//! Read-only and paginated by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomledger_core::{BranchName, HistoryEntryId, ItemId, OrderId};
use bloomledger_inventory::{ChangeType, ItemType, StockHistoryEntry};

use super::StoreError;

/// Pagination parameters for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50),
            offset: offset.unwrap_or(0),
        }
        .capped()
    }

    /// The same page with `limit` clamped to `MAX_LIMIT`.
    pub fn capped(self) -> Self {
        Self {
            limit: self.limit.min(Self::MAX_LIMIT),
            ..self
        }
    }
}

/// Filter criteria for history queries. Every criterion is optional and they combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Entries at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Entries strictly before this instant.
    pub to: Option<DateTime<Utc>>,
    pub branch: Option<BranchName>,
    pub item_type: Option<ItemType>,
    pub change_type: Option<ChangeType>,
    pub item_id: Option<ItemId>,
    /// Case-insensitive substring of the item name.
    pub item_name: Option<String>,
    pub order_id: Option<OrderId>,
}

impl HistoryFilter {
    pub fn for_branch(branch: BranchName) -> Self {
        Self {
            branch: Some(branch),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &StockHistoryEntry) -> bool {
        if self.from.is_some_and(|from| entry.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.timestamp >= to) {
            return false;
        }
        if self.branch.as_ref().is_some_and(|b| *b != entry.branch) {
            return false;
        }
        if self.item_type.is_some_and(|t| t != entry.item_type) {
            return false;
        }
        if self.change_type.is_some_and(|c| c != entry.change_type) {
            return false;
        }
        if self.item_id.as_ref().is_some_and(|id| *id != entry.item_id) {
            return false;
        }
        if self.order_id.is_some_and(|id| entry.order_id != Some(id)) {
            return false;
        }
        match self.item_name.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => entry
                .item_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

/// Paginated history query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQueryResult {
    /// The entries on this page, newest first.
    pub entries: Vec<StockHistoryEntry>,
    /// Total number of entries matching the filter (across all pages).
    pub total: u64,
    /// Pagination parameters used.
    pub pagination: Pagination,
    /// Whether there are more entries available.
    pub has_more: bool,
}

impl HistoryQueryResult {
    /// Cut one page out of the full, already ordered match list.
    ///
    /// Struct-literal or deserialized pagination is capped here as well.
    pub fn paginate(matching: Vec<StockHistoryEntry>, pagination: Pagination) -> Self {
        let pagination = pagination.capped();
        let total = matching.len() as u64;
        let entries: Vec<_> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        let has_more = u64::from(pagination.offset) + (entries.len() as u64) < total;
        Self {
            entries,
            total,
            pagination,
            has_more,
        }
    }
}

/// Async query interface over the stock ledger.
#[async_trait::async_trait]
pub trait HistoryQuery: Send + Sync {
    /// Query entries with optional filters and pagination, newest first.
    async fn query_history(
        &self,
        filter: HistoryFilter,
        pagination: Pagination,
    ) -> Result<HistoryQueryResult, StoreError>;

    /// Entries for one item at one branch.
    async fn item_history(
        &self,
        item_id: ItemId,
        branch: BranchName,
        pagination: Option<Pagination>,
    ) -> Result<HistoryQueryResult, StoreError> {
        let filter = HistoryFilter {
            item_id: Some(item_id),
            branch: Some(branch),
            ..Default::default()
        };
        self.query_history(filter, pagination.unwrap_or_default()).await
    }

    /// Get a single entry by its ID.
    async fn history_entry(&self, id: HistoryEntryId) -> Result<Option<StockHistoryEntry>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloomledger_core::OperatorId;
    use chrono::TimeZone;

    fn entry(name: &str, branch: &str, change_type: ChangeType, hour: u32) -> StockHistoryEntry {
        StockHistoryEntry {
            id: HistoryEntryId::new(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            change_type,
            item_type: ItemType::Material,
            item_id: ItemId::parse(name.to_lowercase().replace(' ', "-")).unwrap(),
            item_name: name.to_string(),
            quantity: 1,
            from_stock: 5,
            to_stock: 4,
            resulting_stock: 4,
            branch: BranchName::parse(branch).unwrap(),
            operator: OperatorId::parse("staff").unwrap(),
            unit_price: None,
            supplier: None,
            total_amount: None,
            order_id: None,
            memo: None,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(HistoryFilter::default().matches(&entry("Red rose", "A", ChangeType::Out, 3)));
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let filter = HistoryFilter {
            item_name: Some("ROSE".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&entry("Red rose", "A", ChangeType::Out, 3)));
        assert!(!filter.matches(&entry("Tulip", "A", ChangeType::Out, 3)));
    }

    #[test]
    fn criteria_combine_with_and() {
        let filter = HistoryFilter {
            branch: Some(BranchName::parse("A").unwrap()),
            change_type: Some(ChangeType::In),
            ..Default::default()
        };
        assert!(filter.matches(&entry("Tulip", "A", ChangeType::In, 3)));
        assert!(!filter.matches(&entry("Tulip", "A", ChangeType::Out, 3)));
        assert!(!filter.matches(&entry("Tulip", "B", ChangeType::In, 3)));
    }

    #[test]
    fn date_range_is_half_open() {
        let filter = HistoryFilter {
            from: Some(Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2024, 5, 1, 5, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(filter.matches(&entry("Tulip", "A", ChangeType::In, 3)));
        assert!(filter.matches(&entry("Tulip", "A", ChangeType::In, 4)));
        assert!(!filter.matches(&entry("Tulip", "A", ChangeType::In, 5)));
        assert!(!filter.matches(&entry("Tulip", "A", ChangeType::In, 2)));
    }

    #[test]
    fn pagination_caps_limit_and_reports_has_more() {
        assert_eq!(Pagination::new(Some(5_000), None).limit, 1000);

        let entries: Vec<_> = (0..5).map(|h| entry("Tulip", "A", ChangeType::In, h)).collect();
        let page = HistoryQueryResult::paginate(entries.clone(), Pagination::new(Some(2), Some(2)));
        assert_eq!(page.total, 5);
        assert_eq!(page.entries.len(), 2);
        assert!(page.has_more);

        let last = HistoryQueryResult::paginate(entries, Pagination::new(Some(2), Some(4)));
        assert_eq!(last.entries.len(), 1);
        assert!(!last.has_more);
    }

    #[test]
    fn paginate_caps_limits_that_bypass_the_constructor() {
        let entries: Vec<_> = (0..1_200)
            .map(|i| entry("Tulip", "A", ChangeType::In, (i % 24) as u32))
            .collect();

        let literal = Pagination { limit: 5_000, offset: 0 };
        let page = HistoryQueryResult::paginate(entries.clone(), literal);
        assert_eq!(page.entries.len(), 1_000);
        assert_eq!(page.pagination.limit, Pagination::MAX_LIMIT);
        assert!(page.has_more);

        let decoded: Pagination = serde_json::from_str(r#"{"limit": 4000000000, "offset": 100}"#).unwrap();
        let page = HistoryQueryResult::paginate(entries, decoded);
        assert_eq!(page.entries.len(), 1_000);
        assert!(page.has_more);
    }
}
