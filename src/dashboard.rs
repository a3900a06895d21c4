use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{InventoryItem, ItemStatus, Request};
use crate::SupplyOffice;

const RECENT_REQUESTS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DashboardTotals {
    pub total: i64,
    pub available: i64,
    pub borrowed: i64,
    pub damaged: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCharts {
    pub category_counts: BTreeMap<String, i64>,
    pub status_counts: BTreeMap<String, i64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub totals: DashboardTotals,
    pub charts: DashboardCharts,
    pub low_stock: Vec<InventoryItem>,
    pub recent_requests: Vec<Request>,
}

impl SupplyOffice {
    pub fn compute_dashboard_stats(&self) -> Result<DashboardStats> {
        self.require_user()?;
        let items = self.storage.inventory();
        let requests = self.storage.requests();
        Ok(dashboard_stats(
            &items,
            &requests,
            self.config.low_stock_threshold,
            self.config.dashboard_low_stock_limit,
        ))
    }
}

pub fn dashboard_stats(
    items: &[InventoryItem],
    requests: &[Request],
    low_stock_threshold: i64,
    low_stock_limit: usize,
) -> DashboardStats {
    let qty_with = |status: ItemStatus| -> i64 {
        items
            .iter()
            .filter(|i| i.status == status)
            .fold(0_i64, |acc, i| acc.saturating_add(i.qty))
    };
    let totals = DashboardTotals {
        total: items.iter().fold(0_i64, |acc, i| acc.saturating_add(i.qty)),
        available: qty_with(ItemStatus::Available),
        borrowed: qty_with(ItemStatus::Borrowed),
        damaged: qty_with(ItemStatus::Damaged),
    };

    let mut category_counts = BTreeMap::new();
    let mut status_counts: BTreeMap<String, i64> = [
        ItemStatus::Available,
        ItemStatus::Borrowed,
        ItemStatus::Damaged,
    ]
    .iter()
    .map(|s| (s.label().to_string(), 0))
    .collect();
    for item in items {
        let category = if item.category.trim().is_empty() {
            "Unknown".to_string()
        } else {
            item.category.clone()
        };
        let count = category_counts.entry(category).or_insert(0_i64);
        *count = count.saturating_add(item.qty);
        if let Some(count) = status_counts.get_mut(item.status.label()) {
            *count = count.saturating_add(item.qty);
        }
    }

    let low_stock = items
        .iter()
        .filter(|i| i.qty <= low_stock_threshold)
        .take(low_stock_limit)
        .cloned()
        .collect();
    let recent_requests = requests
        .iter()
        .rev()
        .take(RECENT_REQUESTS)
        .cloned()
        .collect();

    DashboardStats {
        totals,
        charts: DashboardCharts {
            category_counts,
            status_counts,
        },
        low_stock,
        recent_requests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RequestStatus;

    fn item(id: i64, category: &str, qty: i64, status: ItemStatus) -> InventoryItem {
        InventoryItem {
            id,
            name: format!("item-{id}"),
            category: category.to_string(),
            sub_category: String::new(),
            qty,
            borrowed_qty: 0,
            status,
        }
    }

    fn request(id: i64) -> Request {
        Request {
            id,
            item_id: None,
            item_name: "Pens".to_string(),
            category: "Office Supplies".to_string(),
            item_type: "Consumables".to_string(),
            qty: 1,
            purpose: "class".to_string(),
            requester: "user".to_string(),
            role: "user".to_string(),
            status: RequestStatus::Pending,
            created_at: None,
            processed_at: None,
            processed_by: None,
            reject_reason: String::new(),
        }
    }

    #[test]
    fn totals_sum_quantity_per_status_and_category() {
        let items = vec![
            item(1, "Equipment", 10, ItemStatus::Available),
            item(2, "Equipment", 0, ItemStatus::Borrowed),
            item(3, "", 2, ItemStatus::Damaged),
            item(4, "Office Supplies", 3, ItemStatus::LowStock),
        ];
        let stats = dashboard_stats(&items, &[], 5, 20);
        assert_eq!(
            stats.totals,
            DashboardTotals {
                total: 15,
                available: 10,
                borrowed: 0,
                damaged: 2,
            }
        );
        assert_eq!(stats.charts.category_counts["Equipment"], 10);
        assert_eq!(stats.charts.category_counts["Unknown"], 2);
        assert_eq!(stats.charts.status_counts.len(), 3);
        assert_eq!(stats.charts.status_counts["Damaged"], 2);
        assert_eq!(
            stats.low_stock.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn recent_requests_are_last_five_newest_first() {
        let requests: Vec<Request> = (1..=7).map(request).collect();
        let stats = dashboard_stats(&[], &requests, 5, 20);
        assert_eq!(
            stats.recent_requests.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![7, 6, 5, 4, 3]
        );
    }

    #[test]
    fn huge_quantities_saturate_instead_of_wrapping() {
        let items = vec![
            item(1, "Equipment", i64::MAX, ItemStatus::Available),
            item(2, "Equipment", 7, ItemStatus::Available),
        ];
        let stats = dashboard_stats(&items, &[], 5, 20);
        assert_eq!(stats.totals.total, i64::MAX);
        assert_eq!(stats.totals.available, i64::MAX);
        assert_eq!(stats.charts.category_counts["Equipment"], i64::MAX);
        assert_eq!(stats.charts.status_counts["Available"], i64::MAX);
    }

    #[test]
    fn low_stock_list_is_capped() {
        let items: Vec<InventoryItem> = (0..30)
            .map(|id| item(id, "Equipment", 1, ItemStatus::Available))
            .collect();
        assert_eq!(dashboard_stats(&items, &[], 5, 20).low_stock.len(), 20);
    }
}
