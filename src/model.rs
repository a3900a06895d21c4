use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::OfficeError;

pub const OFFICE_SUPPLIES: &str = "Office Supplies";
pub const CONSUMABLES: &str = "Consumables";
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    Available,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    Borrowed,
    Damaged,
}

impl ItemStatus {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "available" => Some(Self::Available),
            "low stock" => Some(Self::LowStock),
            "out of stock" => Some(Self::OutOfStock),
            "borrowed" => Some(Self::Borrowed),
            "damaged" => Some(Self::Damaged),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::LowStock => "Low Stock",
            Self::OutOfStock => "Out of Stock",
            Self::Borrowed => "Borrowed",
            Self::Damaged => "Damaged",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredItem")]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub sub_category: String,
    pub qty: i64,
    pub borrowed_qty: i64,
    pub status: ItemStatus,
}

/// On-disk shape of an item. Unknown status labels are recomputed from
/// quantity rather than failing the whole document.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    #[serde(default, deserialize_with = "lenient_i64")]
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    sub_category: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    qty: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    borrowed_qty: i64,
    #[serde(default)]
    status: Option<serde_json::Value>,
}

impl From<StoredItem> for InventoryItem {
    fn from(raw: StoredItem) -> Self {
        let status = raw
            .status
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(ItemStatus::from_label)
            .unwrap_or_else(|| {
                derive_status(
                    raw.qty,
                    raw.category.as_str(),
                    raw.sub_category.as_str(),
                    DEFAULT_LOW_STOCK_THRESHOLD,
                )
            });
        Self {
            id: raw.id,
            name: raw.name,
            category: raw.category,
            sub_category: raw.sub_category,
            qty: raw.qty,
            borrowed_qty: raw.borrowed_qty,
            status,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub qty: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub qty: Option<i64>,
    pub borrowed_qty: Option<i64>,
    pub status: Option<ItemStatus>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl From<String> for RequestStatus {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

impl RequestStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub item_type: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub qty: i64,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub requester: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default, deserialize_with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_by: Option<String>,
    #[serde(default)]
    pub reject_reason: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub item_type: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub qty: i64,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogAction {
    AddItem,
    UpdateItem,
    RemoveItem,
    ClearInventory,
    Borrow,
    Return,
    Restock,
    Release,
    ApproveRequest,
    RejectRequest,
    /// Actions written by other tools are kept verbatim.
    Other(String),
}

impl LogAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AddItem => "ADD_ITEM",
            Self::UpdateItem => "UPDATE_ITEM",
            Self::RemoveItem => "REMOVE_ITEM",
            Self::ClearInventory => "CLEAR_INVENTORY",
            Self::Borrow => "BORROW",
            Self::Return => "RETURN",
            Self::Restock => "RESTOCK",
            Self::Release => "RELEASE",
            Self::ApproveRequest => "APPROVE_REQUEST",
            Self::RejectRequest => "REJECT_REQUEST",
            Self::Other(action) => action.as_str(),
        }
    }
}

impl From<String> for LogAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ADD_ITEM" => Self::AddItem,
            "UPDATE_ITEM" => Self::UpdateItem,
            "REMOVE_ITEM" => Self::RemoveItem,
            "CLEAR_INVENTORY" => Self::ClearInventory,
            "BORROW" => Self::Borrow,
            "RETURN" => Self::Return,
            "RESTOCK" => Self::Restock,
            "RELEASE" => Self::Release,
            "APPROVE_REQUEST" => Self::ApproveRequest,
            "REJECT_REQUEST" => Self::RejectRequest,
            _ => Self::Other(value),
        }
    }
}

impl From<LogAction> for String {
    fn from(action: LogAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default = "unknown_action")]
    pub action: LogAction,
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub quantity: i64,
    #[serde(default)]
    pub performed_by: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, deserialize_with = "lenient_time")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

/// Session-safe view of an account; never carries credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            self.name.clone()
        } else if !self.username.trim().is_empty() {
            self.username.clone()
        } else {
            "User".to_string()
        }
    }
}

pub fn is_consumable(category: &str, sub_category: &str) -> bool {
    category == OFFICE_SUPPLIES && sub_category == CONSUMABLES
}

/// Stock status is derived from quantity and category alone.
pub fn derive_status(qty: i64, category: &str, sub_category: &str, low_stock_threshold: i64) -> ItemStatus {
    if is_consumable(category, sub_category) {
        if qty <= 0 {
            ItemStatus::OutOfStock
        } else if qty <= low_stock_threshold {
            ItemStatus::LowStock
        } else {
            ItemStatus::Available
        }
    } else if qty <= 0 {
        ItemStatus::Borrowed
    } else {
        ItemStatus::Available
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Millisecond ids, bumped past `last` so two records created in the same
/// millisecond never collide.
pub fn next_id(last: Option<i64>) -> i64 {
    let now = now_millis();
    match last {
        Some(last) if last >= now => last + 1,
        _ => now,
    }
}

/// Quantity sum that reports overflow as an invalid quantity.
pub(crate) fn add_qty(left: i64, right: i64) -> Result<i64, OfficeError> {
    left.checked_add(right).ok_or(OfficeError::InvalidQty)
}

pub(crate) fn sub_qty(left: i64, right: i64) -> Result<i64, OfficeError> {
    left.checked_sub(right).ok_or(OfficeError::InvalidQty)
}

pub(crate) fn match_key(value: &str) -> String {
    value.trim().to_lowercase()
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_i64(Some(&value)))
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(_) => Some(value_i64(Some(&v))),
        serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }))
}

/// RFC 3339 strings or epoch milliseconds; anything else reads as unknown.
fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Some(serde_json::Value::Number(num)) => num.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

fn unknown_action() -> LogAction {
    LogAction::Other("UNKNOWN".to_string())
}

pub(crate) fn value_i64(value: Option<&serde_json::Value>) -> i64 {
    match value {
        Some(v) => {
            if let Some(num) = v.as_i64() {
                num
            } else if let Some(num) = v.as_u64() {
                i64::try_from(num).unwrap_or(i64::MAX)
            } else if let Some(num) = v.as_f64() {
                num.round() as i64
            } else if let Some(text) = v.as_str() {
                text.trim().parse::<i64>().unwrap_or(0)
            } else {
                0
            }
        }
        None => 0,
    }
}
