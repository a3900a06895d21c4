use chrono::Utc;
use tracing::{info, warn};

use crate::error::{OfficeError, Result};
use crate::model::{
    match_key, next_id, sub_qty, InventoryItem, LogAction, NewRequest, Request, RequestStatus,
};
use crate::session::is_admin;
use crate::SupplyOffice;

impl SupplyOffice {
    /// Admins see every request; everyone else sees their own.
    pub fn list_requests(&self) -> Result<Vec<Request>> {
        let user = self.require_user()?;
        let all = self.storage.requests();
        if is_admin(&user) {
            return Ok(all);
        }
        Ok(all
            .into_iter()
            .filter(|r| r.requester == user.username)
            .collect())
    }

    pub fn pending_requests(&self) -> Result<Vec<Request>> {
        self.require_admin()?;
        Ok(self
            .storage
            .requests()
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect())
    }

    pub fn requests_for(&self, username: &str) -> Result<Vec<Request>> {
        self.require_admin()?;
        Ok(self
            .storage
            .requests()
            .into_iter()
            .filter(|r| r.requester == username)
            .collect())
    }

    pub fn create_request(&self, payload: NewRequest) -> Result<Request> {
        let user = self.require_user()?;
        let item_name = payload.item_name.trim();
        let category = payload.category.trim();
        let item_type = payload.item_type.trim();
        let purpose = payload.purpose.trim();
        if item_name.is_empty()
            || category.is_empty()
            || item_type.is_empty()
            || purpose.is_empty()
            || payload.qty <= 0
        {
            return Err(OfficeError::InvalidRequest);
        }

        let mut requests = self.storage.try_requests()?;
        let req = Request {
            id: next_id(requests.iter().map(|r| r.id).max()),
            item_id: payload.item_id,
            item_name: item_name.to_string(),
            category: category.to_string(),
            item_type: item_type.to_string(),
            qty: payload.qty,
            purpose: purpose.to_string(),
            requester: user.username.clone(),
            role: user.role.as_str().to_string(),
            status: RequestStatus::Pending,
            created_at: Some(Utc::now()),
            processed_at: None,
            processed_by: None,
            reject_reason: String::new(),
        };
        requests.push(req.clone());
        self.storage.save_requests(&requests)?;
        info!(id = req.id, item = %req.item_name, qty = req.qty, requester = %req.requester, "request submitted");
        Ok(req)
    }

    /// Pending → Approved, taking the requested quantity out of stock.
    /// When the request document cannot be written the stock change is
    /// rolled back, so a retry never takes the quantity twice.
    pub fn approve_request(&self, id: i64) -> Result<Request> {
        let admin = self.require_admin()?;
        let mut requests = self.storage.try_requests()?;
        let req = find_pending(&mut requests, id)?;

        let mut inventory = self.storage.try_inventory()?;
        let original = inventory.clone();
        let idx = resolve_item(&inventory, req).ok_or(OfficeError::ItemNotFound)?;
        let mut item = inventory[idx].clone();
        if item.qty < req.qty {
            warn!(id, item = %item.name, available = item.qty, wanted = req.qty, "approval blocked");
            return Err(OfficeError::NotEnoughStock {
                name: item.name,
                available: item.qty,
            });
        }
        item.qty = sub_qty(item.qty, req.qty)?;
        self.auto_status(&mut item);
        inventory[idx] = item.clone();

        req.status = RequestStatus::Approved;
        req.processed_at = Some(Utc::now());
        req.processed_by = Some(admin.display_name());
        req.reject_reason.clear();
        let approved = req.clone();

        self.storage.save_inventory(&inventory)?;
        if let Err(err) = self.storage.save_requests(&requests) {
            warn!(id, error = %err, "request write failed, restoring stock");
            if let Err(restore) = self.storage.save_inventory(&original) {
                warn!(id, error = %restore, "stock rollback failed");
            }
            return Err(err);
        }
        self.log_action(
            LogAction::ApproveRequest,
            item.name.as_str(),
            item.category.as_str(),
            approved.qty,
        )?;
        info!(id, item = %item.name, remaining = item.qty, "request approved");
        Ok(approved)
    }

    pub fn reject_request(&self, id: i64, reason: &str) -> Result<Request> {
        let admin = self.require_admin()?;
        let mut requests = self.storage.try_requests()?;
        let req = find_pending(&mut requests, id)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OfficeError::RejectReasonRequired);
        }

        req.status = RequestStatus::Rejected;
        req.reject_reason = reason.to_string();
        req.processed_at = Some(Utc::now());
        req.processed_by = Some(admin.display_name());
        let rejected = req.clone();

        self.storage.save_requests(&requests)?;
        self.log_action(
            LogAction::RejectRequest,
            rejected.item_name.as_str(),
            rejected.category.as_str(),
            rejected.qty,
        )?;
        info!(id, reason, "request rejected");
        Ok(rejected)
    }
}

fn find_pending(requests: &mut [Request], id: i64) -> Result<&mut Request> {
    let req = requests
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or(OfficeError::RequestNotFound)?;
    if req.status != RequestStatus::Pending {
        return Err(OfficeError::RequestNotPending {
            status: req.status.label().to_string(),
        });
    }
    Ok(req)
}

/// By id first, then by name (case-insensitive) within the same category.
fn resolve_item(inventory: &[InventoryItem], req: &Request) -> Option<usize> {
    if let Some(item_id) = req.item_id {
        if let Some(idx) = inventory.iter().position(|i| i.id == item_id) {
            return Some(idx);
        }
    }
    let name = match_key(req.item_name.as_str());
    inventory
        .iter()
        .position(|i| match_key(i.name.as_str()) == name && i.category == req.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OfficeConfig;
    use crate::model::{ItemStatus, NewItem, Role, User, CONSUMABLES, OFFICE_SUPPLIES};
    use crate::storage::REQUESTS_KEY;
    use tempfile::{tempdir, TempDir};

    fn office() -> (TempDir, SupplyOffice) {
        let dir = tempdir().expect("tempdir");
        let office = SupplyOffice::with_config(
            dir.path(),
            OfficeConfig {
                seed_default_users: false,
                ..OfficeConfig::default()
            },
        )
        .expect("office");
        (dir, office)
    }

    fn sign_in(office: &SupplyOffice, username: &str, role: Role) {
        office
            .storage()
            .set_current_user(&User {
                name: username.to_uppercase(),
                username: username.to_string(),
                role,
            })
            .expect("session");
    }

    fn paper_request(qty: i64) -> NewRequest {
        NewRequest {
            item_id: None,
            item_name: "bond paper".to_string(),
            category: OFFICE_SUPPLIES.to_string(),
            item_type: CONSUMABLES.to_string(),
            qty,
            purpose: "Quarterly exams".to_string(),
        }
    }

    fn seeded() -> (TempDir, SupplyOffice, InventoryItem) {
        let (dir, office) = office();
        sign_in(&office, "admin", Role::Admin);
        let paper = office
            .add_item(NewItem {
                name: "Bond Paper".to_string(),
                category: OFFICE_SUPPLIES.to_string(),
                sub_category: CONSUMABLES.to_string(),
                qty: 10,
            })
            .expect("stock");
        (dir, office, paper)
    }

    #[test]
    fn incomplete_requests_are_refused() {
        let (_dir, office) = office();
        sign_in(&office, "teacher", Role::User);
        assert!(matches!(
            office.create_request(paper_request(0)),
            Err(OfficeError::InvalidRequest)
        ));
        let mut blank = paper_request(1);
        blank.purpose = "   ".to_string();
        assert!(matches!(
            office.create_request(blank),
            Err(OfficeError::InvalidRequest)
        ));
    }

    #[test]
    fn approval_takes_stock_and_is_final() {
        let (_dir, office, paper) = seeded();
        sign_in(&office, "teacher", Role::User);
        let req = office.create_request(paper_request(6)).expect("request");
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(req.requester, "teacher");
        assert!(matches!(office.approve_request(req.id), Err(OfficeError::NotAuthorized)));

        sign_in(&office, "admin", Role::Admin);
        let approved = office.approve_request(req.id).expect("approve");
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.processed_by.as_deref(), Some("ADMIN"));
        assert!(approved.processed_at.is_some());

        let item = office
            .list_inventory()
            .expect("list")
            .into_iter()
            .find(|i| i.id == paper.id)
            .expect("paper");
        assert_eq!(item.qty, 4);
        assert_eq!(item.status, ItemStatus::LowStock);
        assert_eq!(office.storage().logs()[0].action, LogAction::ApproveRequest);

        assert!(matches!(
            office.approve_request(req.id),
            Err(OfficeError::RequestNotPending { .. })
        ));
        assert!(matches!(
            office.reject_request(req.id, "late"),
            Err(OfficeError::RequestNotPending { .. })
        ));
    }

    #[test]
    fn approval_fails_without_stock_and_leaves_request_pending() {
        let (_dir, office, _paper) = seeded();
        let req = office.create_request(paper_request(11)).expect("request");
        let err = office.approve_request(req.id).expect_err("short");
        assert_eq!(err.code(), "NOT_ENOUGH_STOCK:Bond Paper:10");
        assert_eq!(office.pending_requests().expect("pending").len(), 1);
        assert_eq!(office.list_inventory().expect("list")[0].qty, 10);

        let mut unknown = paper_request(1);
        unknown.item_name = "Stapler".to_string();
        let req = office.create_request(unknown).expect("request");
        assert!(matches!(office.approve_request(req.id), Err(OfficeError::ItemNotFound)));
        assert!(matches!(office.approve_request(1), Err(OfficeError::RequestNotFound)));
    }

    #[test]
    fn item_id_takes_precedence_over_name() {
        let (_dir, office, _paper) = seeded();
        let other = office
            .add_item(NewItem {
                name: "Colored Paper".to_string(),
                category: OFFICE_SUPPLIES.to_string(),
                sub_category: CONSUMABLES.to_string(),
                qty: 8,
            })
            .expect("stock");
        let mut by_id = paper_request(2);
        by_id.item_id = Some(other.id);
        let req = office.create_request(by_id).expect("request");
        office.approve_request(req.id).expect("approve");
        let items = office.list_inventory().expect("list");
        assert_eq!(items.iter().find(|i| i.id == other.id).map(|i| i.qty), Some(6));
    }

    #[test]
    fn rejection_needs_a_reason() {
        let (_dir, office, _paper) = seeded();
        let req = office.create_request(paper_request(1)).expect("request");
        assert!(matches!(
            office.reject_request(req.id, "  "),
            Err(OfficeError::RejectReasonRequired)
        ));
        let rejected = office
            .reject_request(req.id, " out of budget ")
            .expect("reject");
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.reject_reason, "out of budget");
        assert_eq!(office.list_inventory().expect("list")[0].qty, 10);

        let log = &office.storage().logs()[0];
        assert_eq!(log.action, LogAction::RejectRequest);
        assert_eq!(log.item, "bond paper");
        assert_eq!(log.category, OFFICE_SUPPLIES);
        assert_eq!(log.quantity, 1);
    }

    #[test]
    fn stale_item_id_falls_back_to_name() {
        let (_dir, office, paper) = seeded();
        let mut stale = paper_request(3);
        stale.item_id = Some(paper.id + 1_000);
        stale.item_name = "BOND PAPER ".to_string();
        let req = office.create_request(stale).expect("request");
        office.approve_request(req.id).expect("approve");
        let item = &office.list_inventory().expect("list")[0];
        assert_eq!(item.id, paper.id);
        assert_eq!(item.qty, 7);

        let mut other_shelf = paper_request(1);
        other_shelf.item_id = Some(paper.id + 2_000);
        other_shelf.category = "office supplies".to_string();
        let req = office.create_request(other_shelf).expect("request");
        assert!(matches!(office.approve_request(req.id), Err(OfficeError::ItemNotFound)));
    }

    #[test]
    fn failed_request_write_rolls_back_stock() {
        let (_dir, office, paper) = seeded();
        let req = office.create_request(paper_request(4)).expect("request");

        office.storage().fail_writes_to(Some(REQUESTS_KEY));
        assert!(matches!(office.approve_request(req.id), Err(OfficeError::Io(_))));
        office.storage().fail_writes_to(None);

        assert_eq!(office.list_inventory().expect("list")[0].qty, paper.qty);
        assert_eq!(office.pending_requests().expect("pending").len(), 1);

        office.approve_request(req.id).expect("retry");
        assert_eq!(office.list_inventory().expect("list")[0].qty, paper.qty - 4);
        assert!(office.pending_requests().expect("pending").is_empty());
    }

    #[test]
    fn damaged_request_document_is_not_overwritten() {
        let (dir, office, _paper) = seeded();
        let path = dir.path().join("requests.json");
        std::fs::write(path.as_path(), "[{\"id\": ").expect("damage");
        assert!(matches!(
            office.create_request(paper_request(1)),
            Err(OfficeError::CorruptDocument { .. })
        ));
        assert_eq!(std::fs::read_to_string(path.as_path()).expect("read"), "[{\"id\": ");
    }

    #[test]
    fn users_only_see_their_own_requests() {
        let (_dir, office, _paper) = seeded();
        office.create_request(paper_request(1)).expect("admin request");
        sign_in(&office, "teacher", Role::User);
        office.create_request(paper_request(2)).expect("teacher request");
        let mine = office.list_requests().expect("list");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].qty, 2);

        sign_in(&office, "admin", Role::Admin);
        assert_eq!(office.list_requests().expect("list").len(), 2);
        assert_eq!(office.requests_for("teacher").expect("for").len(), 1);
    }
}
