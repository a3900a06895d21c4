use chrono::{DateTime, Days, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::model::{InventoryItem, LogRecord, Request, RequestStatus};
use crate::SupplyOffice;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_qty: i64,
    pub low_stock: usize,
    pub categories_tracked: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub in_range: usize,
    pub pending_in_range: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub in_range: usize,
    pub actions: Vec<ActionCount>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub range_days: i64,
    pub inventory: InventorySummary,
    pub requests: RequestSummary,
    pub logs: LogSummary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTable {
    Inventory,
    Requests,
    Logs,
}

impl ExportTable {
    pub fn default_filename(self) -> &'static str {
        match self {
            Self::Inventory => "inventory.csv",
            Self::Requests => "requests.csv",
            Self::Logs => "activity-logs.csv",
        }
    }
}

impl SupplyOffice {
    pub fn compute_reports(&self, days: Option<i64>) -> Result<Report> {
        self.require_admin()?;
        let days = days.unwrap_or(self.config.report_days).max(1);
        Ok(build_report(
            &self.storage.inventory(),
            &self.storage.requests(),
            &self.storage.logs(),
            days,
            self.config.low_stock_threshold,
            Local::now(),
        ))
    }

    pub fn export_csv(&self, table: ExportTable) -> Result<String> {
        self.require_admin()?;
        Ok(match table {
            ExportTable::Inventory => inventory_csv(&self.storage.inventory()),
            ExportTable::Requests => requests_csv(&self.storage.requests()),
            ExportTable::Logs => logs_csv(&self.storage.logs()),
        })
    }
}

/// Window runs from local midnight `days - 1` days before `now` up to `now`.
pub fn report_window<Tz: TimeZone>(now: DateTime<Tz>, days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let back = u64::try_from(days.max(1) - 1).unwrap_or(0);
    let start_day = now
        .date_naive()
        .checked_sub_days(Days::new(back))
        .unwrap_or_else(|| now.date_naive());
    let start = start_day
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| now.timezone().from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc));
    (start, now.with_timezone(&Utc))
}

/// Undated records are never excluded.
fn within(ts: Option<DateTime<Utc>>, window: &(DateTime<Utc>, DateTime<Utc>)) -> bool {
    match ts {
        Some(ts) => ts >= window.0 && ts <= window.1,
        None => true,
    }
}

pub fn build_report<Tz: TimeZone>(
    items: &[InventoryItem],
    requests: &[Request],
    logs: &[LogRecord],
    days: i64,
    low_stock_threshold: i64,
    now: DateTime<Tz>,
) -> Report {
    let window = report_window(now, days);

    let categories: BTreeSet<&str> = items
        .iter()
        .map(|i| {
            if i.category.trim().is_empty() {
                "Uncategorized"
            } else {
                i.category.as_str()
            }
        })
        .collect();
    let inventory = InventorySummary {
        total_qty: items.iter().fold(0_i64, |acc, i| acc.saturating_add(i.qty)),
        low_stock: items.iter().filter(|i| i.qty <= low_stock_threshold).count(),
        categories_tracked: categories.len(),
    };

    let recent_requests: Vec<&Request> = requests
        .iter()
        .filter(|r| within(r.created_at, &window))
        .collect();
    let requests = RequestSummary {
        in_range: recent_requests.len(),
        pending_in_range: recent_requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .count(),
    };

    let recent_logs: Vec<&LogRecord> = logs
        .iter()
        .filter(|l| within(l.timestamp, &window))
        .collect();
    let mut by_action: HashMap<&str, i64> = HashMap::new();
    for log in &recent_logs {
        let weight = if log.quantity == 0 { 1 } else { log.quantity };
        let count = by_action.entry(log.action.as_str()).or_insert(0);
        *count = count.saturating_add(weight);
    }
    let mut actions: Vec<ActionCount> = by_action
        .into_iter()
        .map(|(action, count)| ActionCount {
            action: action.to_string(),
            count,
        })
        .collect();
    actions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.action.cmp(&b.action)));

    Report {
        range_days: days,
        inventory,
        requests,
        logs: LogSummary {
            in_range: recent_logs.len(),
            actions,
        },
    }
}

pub fn inventory_csv(items: &[InventoryItem]) -> String {
    let header = ["id", "name", "category", "subCategory", "qty", "borrowedQty", "status"];
    let rows = items.iter().map(|i| {
        vec![
            i.id.to_string(),
            i.name.clone(),
            i.category.clone(),
            i.sub_category.clone(),
            i.qty.to_string(),
            i.borrowed_qty.to_string(),
            i.status.label().to_string(),
        ]
    });
    rows_to_csv(&header, rows)
}

pub fn requests_csv(requests: &[Request]) -> String {
    let header = [
        "id",
        "itemName",
        "category",
        "itemType",
        "qty",
        "purpose",
        "requester",
        "status",
        "createdAt",
        "processedAt",
        "processedBy",
        "rejectReason",
    ];
    let rows = requests.iter().map(|r| {
        vec![
            r.id.to_string(),
            r.item_name.clone(),
            r.category.clone(),
            r.item_type.clone(),
            r.qty.to_string(),
            r.purpose.clone(),
            r.requester.clone(),
            r.status.label().to_string(),
            r.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            r.processed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            r.processed_by.clone().unwrap_or_default(),
            r.reject_reason.clone(),
        ]
    });
    rows_to_csv(&header, rows)
}

pub fn logs_csv(logs: &[LogRecord]) -> String {
    let header = ["id", "action", "item", "category", "quantity", "performedBy", "role", "timestamp"];
    let rows = logs.iter().map(|l| {
        vec![
            l.id.to_string(),
            l.action.as_str().to_string(),
            l.item.clone(),
            l.category.clone(),
            l.quantity.to_string(),
            l.performed_by.clone(),
            l.role.as_str().to_string(),
            l.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]
    });
    rows_to_csv(&header, rows)
}

fn rows_to_csv(columns: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(
        columns
            .iter()
            .map(|col| csv_escape(col))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        lines.push(
            row.iter()
                .map(|cell| csv_escape(cell.as_str()))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

/// Cells a spreadsheet would run as a formula. Plain numbers such as `-3`
/// are data, not formulas.
fn should_neutralize_csv(value: &str) -> bool {
    let trimmed = value.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('\'') {
        return false;
    }
    if trimmed.trim_end().parse::<f64>().is_ok() {
        return false;
    }
    matches!(
        trimmed.chars().next(),
        Some('=') | Some('+') | Some('-') | Some('@')
    )
}

fn csv_escape(value: &str) -> String {
    let safe = if should_neutralize_csv(value) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if safe.contains(',') || safe.contains('"') || safe.contains('\n') || safe.contains('\r') {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}
