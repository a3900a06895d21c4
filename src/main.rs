#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use supply_office::auth::{LoginRequest, SignupRequest};
use supply_office::config::{data_dir_override, LOG_FILTER_ENV};
use supply_office::crypto::CryptoEnvelope;
use supply_office::dashboard::DashboardStats;
use supply_office::model::{InventoryItem, ItemPatch, LogRecord, NewItem, NewRequest, Request, User};
use supply_office::reports::{ExportTable, Report};
use supply_office::routes::RouteDecision;
use supply_office::{OfficeConfig, SupplyOffice};
use tauri::{AppHandle, Manager};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Deserialize)]
struct IdRequest {
    id: i64,
}

#[derive(Deserialize)]
struct QtyRequest {
    id: i64,
    qty: i64,
}

#[derive(Deserialize)]
struct BatchQtyRequest {
    ids: Vec<i64>,
    qty: i64,
}

#[derive(Deserialize)]
struct UpdateItemRequest {
    id: i64,
    patch: ItemPatch,
}

#[derive(Deserialize)]
struct RejectRequest {
    id: i64,
    reason: String,
}

#[derive(Deserialize)]
struct RouteRequest {
    path: String,
}

#[derive(Deserialize)]
struct ReportRequest {
    days: Option<i64>,
}

#[derive(Deserialize)]
struct ExportCsvRequest {
    table: ExportTable,
    filename: Option<String>,
}

#[derive(Deserialize)]
struct BackupRequest {
    password: String,
}

#[derive(Serialize)]
struct SaveFileResult {
    ok: bool,
    canceled: bool,
    filename: String,
    path: Option<String>,
}

#[derive(Serialize)]
struct StorageInfoResult {
    ok: bool,
    path_label: String,
}

#[tauri::command]
fn app_version(app: AppHandle) -> String {
    app.package_info().version.to_string()
}

#[tauri::command]
fn platform_name() -> String {
    match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        "android" => "android",
        _ => "linux",
    }
    .to_string()
}

#[tauri::command]
fn storage_info(app: AppHandle) -> Result<StorageInfoResult, String> {
    let root = storage_root_dir(&app)?;
    Ok(StorageInfoResult {
        ok: true,
        path_label: root.to_string_lossy().to_string(),
    })
}

#[tauri::command]
fn auth_signup(app: AppHandle, payload: SignupRequest) -> Result<User, String> {
    Ok(office(&app)?.signup(payload)?)
}

#[tauri::command]
fn auth_login(app: AppHandle, payload: LoginRequest) -> Result<User, String> {
    Ok(office(&app)?.login(payload)?)
}

#[tauri::command]
fn auth_logout(app: AppHandle) -> Result<bool, String> {
    office(&app)?.logout()?;
    Ok(true)
}

#[tauri::command]
fn auth_current_user(app: AppHandle) -> Result<Option<User>, String> {
    Ok(office(&app)?.current_user())
}

#[tauri::command]
fn auth_list_users(app: AppHandle) -> Result<Vec<User>, String> {
    Ok(office(&app)?.list_users()?)
}

#[tauri::command]
fn route_resolve(app: AppHandle, payload: RouteRequest) -> Result<RouteDecision, String> {
    Ok(office(&app)?.resolve_route(payload.path.as_str()))
}

#[tauri::command]
fn inventory_list(app: AppHandle) -> Result<Vec<InventoryItem>, String> {
    Ok(office(&app)?.list_inventory()?)
}

#[tauri::command]
fn inventory_add(app: AppHandle, payload: NewItem) -> Result<InventoryItem, String> {
    Ok(office(&app)?.add_item(payload)?)
}

#[tauri::command]
fn inventory_update(app: AppHandle, payload: UpdateItemRequest) -> Result<InventoryItem, String> {
    Ok(office(&app)?.update_item(payload.id, payload.patch)?)
}

#[tauri::command]
fn inventory_remove(app: AppHandle, payload: IdRequest) -> Result<Vec<InventoryItem>, String> {
    Ok(office(&app)?.remove_item(payload.id)?)
}

#[tauri::command]
fn inventory_clear(app: AppHandle) -> Result<bool, String> {
    office(&app)?.clear_all_inventory()?;
    Ok(true)
}

#[tauri::command]
fn equipment_borrow(app: AppHandle, payload: QtyRequest) -> Result<InventoryItem, String> {
    Ok(office(&app)?.borrow_equipment(payload.id, payload.qty)?)
}

#[tauri::command]
fn equipment_return(app: AppHandle, payload: QtyRequest) -> Result<InventoryItem, String> {
    Ok(office(&app)?.return_equipment(payload.id, payload.qty)?)
}

#[tauri::command]
fn supplies_restock(app: AppHandle, payload: BatchQtyRequest) -> Result<Vec<InventoryItem>, String> {
    Ok(office(&app)?.restock_office_supplies(&payload.ids, payload.qty)?)
}

#[tauri::command]
fn supplies_release(app: AppHandle, payload: BatchQtyRequest) -> Result<Vec<InventoryItem>, String> {
    Ok(office(&app)?.release_office_consumables(&payload.ids, payload.qty)?)
}

#[tauri::command]
fn non_consumables_borrow(
    app: AppHandle,
    payload: BatchQtyRequest,
) -> Result<Vec<InventoryItem>, String> {
    Ok(office(&app)?.borrow_non_consumables(&payload.ids, payload.qty)?)
}

#[tauri::command]
fn non_consumables_return(
    app: AppHandle,
    payload: BatchQtyRequest,
) -> Result<Vec<InventoryItem>, String> {
    Ok(office(&app)?.return_non_consumables(&payload.ids, payload.qty)?)
}

#[tauri::command]
fn requests_list(app: AppHandle) -> Result<Vec<Request>, String> {
    Ok(office(&app)?.list_requests()?)
}

#[tauri::command]
fn requests_pending(app: AppHandle) -> Result<Vec<Request>, String> {
    Ok(office(&app)?.pending_requests()?)
}

#[tauri::command]
fn requests_create(app: AppHandle, payload: NewRequest) -> Result<Request, String> {
    Ok(office(&app)?.create_request(payload)?)
}

#[tauri::command]
fn requests_approve(app: AppHandle, payload: IdRequest) -> Result<Request, String> {
    Ok(office(&app)?.approve_request(payload.id)?)
}

#[tauri::command]
fn requests_reject(app: AppHandle, payload: RejectRequest) -> Result<Request, String> {
    Ok(office(&app)?.reject_request(payload.id, payload.reason.as_str())?)
}

#[tauri::command]
fn logs_list(app: AppHandle) -> Result<Vec<LogRecord>, String> {
    Ok(office(&app)?.list_logs()?)
}

#[tauri::command]
fn dashboard_get(app: AppHandle) -> Result<DashboardStats, String> {
    Ok(office(&app)?.compute_dashboard_stats()?)
}

#[tauri::command]
fn reports_get(app: AppHandle, payload: ReportRequest) -> Result<Report, String> {
    Ok(office(&app)?.compute_reports(payload.days)?)
}

#[tauri::command]
fn reports_export_csv(app: AppHandle, payload: ExportCsvRequest) -> Result<SaveFileResult, String> {
    let csv = office(&app)?.export_csv(payload.table)?;
    let filename = sanitize_filename(
        payload
            .filename
            .as_deref()
            .unwrap_or(payload.table.default_filename()),
        payload.table.default_filename(),
    );
    save_with_dialog(filename, csv.as_str())
}

#[tauri::command]
fn backup_export(app: AppHandle, payload: BackupRequest) -> Result<SaveFileResult, String> {
    let envelope = office(&app)?.export_backup(payload.password.as_str())?;
    let content = serde_json::to_string_pretty(&envelope).map_err(|err| err.to_string())?;
    save_with_dialog("supply-office-backup.enc".to_string(), content.as_str())
}

#[tauri::command]
fn backup_import(app: AppHandle, payload: BackupRequest) -> Result<serde_json::Value, String> {
    let path = rfd::FileDialog::new()
        .add_filter("Supply Office Backup", &["enc", "json"])
        .pick_file();
    let Some(path) = path else {
        return Ok(json!({ "ok": false, "canceled": true }));
    };
    let raw = fs::read_to_string(&path).map_err(|err| err.to_string())?;
    let envelope: CryptoEnvelope =
        serde_json::from_str(raw.as_str()).map_err(|_| "BACKUP_DECRYPT_FAILED".to_string())?;
    let summary = office(&app)?.import_backup(&envelope, payload.password.as_str())?;
    Ok(json!({ "ok": true, "canceled": false, "restored": summary }))
}

#[tauri::command]
fn config_get(app: AppHandle) -> Result<OfficeConfig, String> {
    Ok(office(&app)?.config().clone())
}

#[tauri::command]
fn config_set(app: AppHandle, payload: OfficeConfig) -> Result<OfficeConfig, String> {
    let mut guard = office(&app)?;
    guard.save_config(payload)?;
    Ok(guard.config().clone())
}

fn save_with_dialog(default_name: String, content: &str) -> Result<SaveFileResult, String> {
    let path = rfd::FileDialog::new()
        .set_file_name(default_name.as_str())
        .save_file();

    let Some(path) = path else {
        return Ok(SaveFileResult {
            ok: false,
            canceled: true,
            filename: default_name,
            path: None,
        });
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    fs::write(&path, content).map_err(|err| err.to_string())?;
    Ok(SaveFileResult {
        ok: true,
        canceled: false,
        filename: default_name,
        path: Some(path.to_string_lossy().to_string()),
    })
}

fn sanitize_filename(value: &str, fallback: &str) -> String {
    let mut out = String::new();
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        fallback.to_string()
    } else if trimmed.to_lowercase().ends_with(".csv") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.csv")
    }
}

fn storage_root_dir(app: &AppHandle) -> Result<PathBuf, String> {
    static RESOLVED_ROOT: OnceLock<PathBuf> = OnceLock::new();
    if let Some(root) = RESOLVED_ROOT.get() {
        return Ok(root.clone());
    }

    let root = match data_dir_override() {
        Some(root) => root,
        None => app
            .path()
            .app_data_dir()
            .map_err(|err| err.to_string())?
            .join("SupplyOffice"),
    };
    fs::create_dir_all(root.as_path()).map_err(|err| err.to_string())?;
    let _ = RESOLVED_ROOT.set(root.clone());
    Ok(root)
}

fn office(app: &AppHandle) -> Result<MutexGuard<'static, SupplyOffice>, String> {
    static OFFICE: OnceLock<Mutex<SupplyOffice>> = OnceLock::new();
    let cell = match OFFICE.get() {
        Some(cell) => cell,
        None => {
            let root = storage_root_dir(app)?;
            let opened = SupplyOffice::open(root).map_err(|err| {
                error!(error = %err, "failed to open supply office store");
                String::from(err)
            })?;
            OFFICE.get_or_init(|| Mutex::new(opened))
        }
    };
    cell.lock().map_err(|_| "Supply office store is unavailable.".to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "starting supply office");
    tauri::Builder::default()
        .invoke_handler(tauri::generate_handler![
            app_version,
            platform_name,
            storage_info,
            auth_signup,
            auth_login,
            auth_logout,
            auth_current_user,
            auth_list_users,
            route_resolve,
            inventory_list,
            inventory_add,
            inventory_update,
            inventory_remove,
            inventory_clear,
            equipment_borrow,
            equipment_return,
            supplies_restock,
            supplies_release,
            non_consumables_borrow,
            non_consumables_return,
            requests_list,
            requests_pending,
            requests_create,
            requests_approve,
            requests_reject,
            logs_list,
            dashboard_get,
            reports_get,
            reports_export_csv,
            backup_export,
            backup_import,
            config_get,
            config_set
        ])
        .run(tauri::generate_context!())
        .expect("failed to run Supply Office");
}
