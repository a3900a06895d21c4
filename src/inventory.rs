use tracing::{info, warn};

use crate::error::{OfficeError, Result};
use crate::model::{
    add_qty, derive_status, match_key, next_id, sub_qty, InventoryItem, ItemPatch, LogAction,
    NewItem,
};
use crate::SupplyOffice;

impl SupplyOffice {
    pub fn auto_status(&self, item: &mut InventoryItem) {
        item.status = derive_status(
            item.qty,
            item.category.as_str(),
            item.sub_category.as_str(),
            self.config.low_stock_threshold,
        );
    }

    pub fn list_inventory(&self) -> Result<Vec<InventoryItem>> {
        self.require_user()?;
        Ok(self.storage.inventory())
    }

    /// Adds stock, merging into an existing row with the same name,
    /// category and sub-category.
    pub fn add_item(&self, payload: NewItem) -> Result<InventoryItem> {
        self.require_admin()?;
        let name = payload.name.trim();
        let category = payload.category.trim();
        if name.is_empty() || category.is_empty() {
            return Err(OfficeError::CompleteAllFields);
        }
        if payload.qty < 0 {
            return Err(OfficeError::InvalidQty);
        }

        let mut all = self.storage.try_inventory()?;
        let name_key = match_key(name);
        let cat_key = match_key(category);
        let sub_key = match_key(payload.sub_category.as_str());
        let existing = all.iter().position(|i| {
            match_key(i.name.as_str()) == name_key
                && match_key(i.category.as_str()) == cat_key
                && match_key(i.sub_category.as_str()) == sub_key
        });

        let item = match existing {
            Some(idx) => {
                let mut row = all[idx].clone();
                row.qty = add_qty(row.qty, payload.qty)?;
                self.auto_status(&mut row);
                all[idx] = row.clone();
                row
            }
            None => {
                let mut row = InventoryItem {
                    id: next_id(all.iter().map(|i| i.id).max()),
                    name: name.to_string(),
                    category: category.to_string(),
                    sub_category: payload.sub_category.trim().to_string(),
                    qty: payload.qty,
                    borrowed_qty: 0,
                    status: Default::default(),
                };
                self.auto_status(&mut row);
                all.push(row.clone());
                row
            }
        };

        self.storage.save_inventory(&all)?;
        self.log_action(LogAction::AddItem, item.name.as_str(), item.category.as_str(), payload.qty)?;
        info!(id = item.id, name = %item.name, qty = item.qty, merged = existing.is_some(), "item stocked");
        Ok(item)
    }

    /// Merges the provided fields. An explicit status (e.g. `Damaged`) is
    /// kept; otherwise status is recomputed from the new quantity.
    pub fn update_item(&self, id: i64, patch: ItemPatch) -> Result<InventoryItem> {
        self.require_admin()?;
        if patch.qty.is_some_and(|q| q < 0) || patch.borrowed_qty.is_some_and(|q| q < 0) {
            return Err(OfficeError::InvalidQty);
        }
        let mut all = self.storage.try_inventory()?;
        let item = find_mut(&mut all, id)?;
        if let Some(name) = patch.name {
            item.name = name.trim().to_string();
        }
        if let Some(category) = patch.category {
            item.category = category.trim().to_string();
        }
        if let Some(sub_category) = patch.sub_category {
            item.sub_category = sub_category.trim().to_string();
        }
        if let Some(qty) = patch.qty {
            item.qty = qty;
        }
        if let Some(borrowed) = patch.borrowed_qty {
            item.borrowed_qty = borrowed;
        }
        let mut updated = item.clone();
        match patch.status {
            Some(status) => updated.status = status,
            None => self.auto_status(&mut updated),
        }
        *item = updated.clone();

        self.storage.save_inventory(&all)?;
        self.log_action(
            LogAction::UpdateItem,
            updated.name.as_str(),
            updated.category.as_str(),
            updated.qty,
        )?;
        Ok(updated)
    }

    pub fn remove_item(&self, id: i64) -> Result<Vec<InventoryItem>> {
        self.require_admin()?;
        let mut all = self.storage.try_inventory()?;
        let Some(idx) = all.iter().position(|i| i.id == id) else {
            return Err(OfficeError::ItemNotFound);
        };
        let removed = all.remove(idx);
        self.storage.save_inventory(&all)?;
        self.log_action(
            LogAction::RemoveItem,
            removed.name.as_str(),
            removed.category.as_str(),
            removed.qty,
        )?;
        info!(id, name = %removed.name, "item removed");
        Ok(all)
    }

    pub fn clear_all_inventory(&self) -> Result<()> {
        self.require_admin()?;
        let count = self.storage.inventory().len() as i64;
        self.storage.clear_inventory()?;
        self.log_action(LogAction::ClearInventory, "", "", count)?;
        warn!(count, "inventory cleared");
        Ok(())
    }

    pub fn borrow_equipment(&self, id: i64, qty: i64) -> Result<InventoryItem> {
        self.require_admin()?;
        if qty <= 0 {
            return Err(OfficeError::InvalidQty);
        }
        let mut all = self.storage.try_inventory()?;
        let item = find_mut(&mut all, id)?;
        if qty > item.qty {
            return Err(OfficeError::NotEnoughStock {
                name: item.name.clone(),
                available: item.qty,
            });
        }
        item.qty = sub_qty(item.qty, qty)?;
        item.borrowed_qty = add_qty(item.borrowed_qty, qty)?;
        let mut updated = item.clone();
        self.auto_status(&mut updated);
        *item = updated.clone();

        self.storage.save_inventory(&all)?;
        self.log_action(LogAction::Borrow, updated.name.as_str(), updated.category.as_str(), qty)?;
        Ok(updated)
    }

    pub fn return_equipment(&self, id: i64, qty: i64) -> Result<InventoryItem> {
        self.require_admin()?;
        if qty <= 0 {
            return Err(OfficeError::InvalidQty);
        }
        let mut all = self.storage.try_inventory()?;
        let item = find_mut(&mut all, id)?;
        if qty > item.borrowed_qty {
            return Err(OfficeError::NothingToReturn);
        }
        item.qty = add_qty(item.qty, qty)?;
        item.borrowed_qty = sub_qty(item.borrowed_qty, qty)?;
        let mut updated = item.clone();
        self.auto_status(&mut updated);
        *item = updated.clone();

        self.storage.save_inventory(&all)?;
        self.log_action(LogAction::Return, updated.name.as_str(), updated.category.as_str(), qty)?;
        Ok(updated)
    }

    /// Batch operations touch each matching row once, however many times
    /// its id is listed.
    pub fn restock_office_supplies(&self, ids: &[i64], qty: i64) -> Result<Vec<InventoryItem>> {
        self.require_admin()?;
        if qty <= 0 {
            return Err(OfficeError::InvalidQty);
        }
        let mut all = self.storage.try_inventory()?;
        let mut touched = Vec::new();
        for item in all.iter_mut().filter(|i| ids.contains(&i.id)) {
            item.qty = add_qty(item.qty, qty)?;
            self.auto_status(item);
            touched.push((item.name.clone(), item.category.clone(), qty));
        }
        self.storage.save_inventory(&all)?;
        self.log_batch(LogAction::Restock, touched)?;
        Ok(all)
    }

    /// Consumables leave stock for good; quantity never goes below zero.
    pub fn release_office_consumables(&self, ids: &[i64], qty: i64) -> Result<Vec<InventoryItem>> {
        self.require_admin()?;
        if qty <= 0 {
            return Err(OfficeError::InvalidQty);
        }
        let mut all = self.storage.try_inventory()?;
        let mut touched = Vec::new();
        for item in all.iter_mut().filter(|i| ids.contains(&i.id)) {
            let released = qty.min(item.qty.max(0));
            item.qty = item.qty.saturating_sub(qty).max(0);
            self.auto_status(item);
            touched.push((item.name.clone(), item.category.clone(), released));
        }
        self.storage.save_inventory(&all)?;
        self.log_batch(LogAction::Release, touched)?;
        Ok(all)
    }

    /// All-or-nothing: every listed item must have `qty` in stock.
    pub fn borrow_non_consumables(&self, ids: &[i64], qty: i64) -> Result<Vec<InventoryItem>> {
        self.require_admin()?;
        if qty <= 0 {
            return Err(OfficeError::InvalidQty);
        }
        let mut all = self.storage.try_inventory()?;
        if let Some(short) = all.iter().find(|i| ids.contains(&i.id) && qty > i.qty) {
            warn!(name = %short.name, available = short.qty, qty, "borrow rejected");
            return Err(OfficeError::NotEnoughStock {
                name: short.name.clone(),
                available: short.qty,
            });
        }

        let mut touched = Vec::new();
        for item in all.iter_mut().filter(|i| ids.contains(&i.id)) {
            item.qty = sub_qty(item.qty, qty)?;
            item.borrowed_qty = add_qty(item.borrowed_qty, qty)?;
            self.auto_status(item);
            touched.push((item.name.clone(), item.category.clone(), qty));
        }
        self.storage.save_inventory(&all)?;
        self.log_batch(LogAction::Borrow, touched)?;
        Ok(all)
    }

    /// All-or-nothing: at least one item must be out on loan and none may
    /// return more than it has borrowed.
    pub fn return_non_consumables(&self, ids: &[i64], qty: i64) -> Result<Vec<InventoryItem>> {
        self.require_admin()?;
        if qty <= 0 {
            return Err(OfficeError::InvalidQty);
        }
        let mut all = self.storage.try_inventory()?;
        let selected: Vec<&InventoryItem> = all.iter().filter(|i| ids.contains(&i.id)).collect();
        if !selected.iter().any(|i| i.borrowed_qty > 0) {
            return Err(OfficeError::NothingToReturn);
        }
        if let Some(over) = selected.iter().find(|i| qty > i.borrowed_qty) {
            return Err(OfficeError::ReturnTooMuch {
                name: over.name.clone(),
                borrowed: over.borrowed_qty,
            });
        }

        let mut touched = Vec::new();
        for item in all.iter_mut().filter(|i| ids.contains(&i.id)) {
            item.qty = add_qty(item.qty, qty)?;
            item.borrowed_qty = sub_qty(item.borrowed_qty, qty)?;
            self.auto_status(item);
            touched.push((item.name.clone(), item.category.clone(), qty));
        }
        self.storage.save_inventory(&all)?;
        self.log_batch(LogAction::Return, touched)?;
        Ok(all)
    }

    fn log_batch(&self, action: LogAction, touched: Vec<(String, String, i64)>) -> Result<()> {
        for (name, category, qty) in touched {
            self.log_action(action.clone(), name.as_str(), category.as_str(), qty)?;
        }
        Ok(())
    }
}

fn find_mut(items: &mut [InventoryItem], id: i64) -> Result<&mut InventoryItem> {
    items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or(OfficeError::ItemNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OfficeConfig;
    use crate::model::{ItemStatus, Role, User, CONSUMABLES, OFFICE_SUPPLIES};
    use tempfile::{tempdir, TempDir};

    fn admin_office() -> (TempDir, SupplyOffice) {
        let dir = tempdir().expect("tempdir");
        let office = SupplyOffice::with_config(
            dir.path(),
            OfficeConfig {
                seed_default_users: false,
                ..OfficeConfig::default()
            },
        )
        .expect("office");
        office
            .storage()
            .set_current_user(&User {
                name: "Admin".to_string(),
                username: "admin".to_string(),
                role: Role::Admin,
            })
            .expect("session");
        (dir, office)
    }

    fn stock(office: &SupplyOffice, name: &str, category: &str, sub: &str, qty: i64) -> InventoryItem {
        office
            .add_item(NewItem {
                name: name.to_string(),
                category: category.to_string(),
                sub_category: sub.to_string(),
                qty,
            })
            .expect("add item")
    }

    #[test]
    fn adding_a_known_item_merges_quantity() {
        let (_dir, office) = admin_office();
        let first = stock(&office, "Bond Paper", OFFICE_SUPPLIES, CONSUMABLES, 3);
        assert_eq!(first.status, ItemStatus::LowStock);
        let merged = stock(&office, "  bond paper ", "office supplies", "CONSUMABLES", 4);
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.qty, 7);
        assert_eq!(merged.status, ItemStatus::Available);
        assert_eq!(office.list_inventory().expect("list").len(), 1);
        assert_eq!(office.storage().logs().len(), 2);
    }

    #[test]
    fn borrow_and_return_move_quantity() {
        let (_dir, office) = admin_office();
        let projector = stock(&office, "Projector", "School Equipment", "", 2);

        let err = office.borrow_equipment(projector.id, 3).expect_err("too many");
        assert_eq!(err.code(), "NOT_ENOUGH_STOCK:Projector:2");
        assert!(matches!(
            office.borrow_equipment(projector.id, 0),
            Err(OfficeError::InvalidQty)
        ));

        let out = office.borrow_equipment(projector.id, 2).expect("borrow");
        assert_eq!((out.qty, out.borrowed_qty), (0, 2));
        assert_eq!(out.status, ItemStatus::Borrowed);

        assert!(matches!(
            office.return_equipment(projector.id, 3),
            Err(OfficeError::NothingToReturn)
        ));
        let back = office.return_equipment(projector.id, 1).expect("return");
        assert_eq!((back.qty, back.borrowed_qty), (1, 1));
        assert_eq!(back.status, ItemStatus::Available);
        assert!(matches!(
            office.borrow_equipment(999, 1),
            Err(OfficeError::ItemNotFound)
        ));
    }

    #[test]
    fn release_floors_at_zero() {
        let (_dir, office) = admin_office();
        let pens = stock(&office, "Pens", OFFICE_SUPPLIES, CONSUMABLES, 4);
        let all = office
            .release_office_consumables(&[pens.id, 42], 10)
            .expect("release");
        assert_eq!(all[0].qty, 0);
        assert_eq!(all[0].status, ItemStatus::OutOfStock);
        let log = &office.storage().logs()[0];
        assert_eq!(log.action, LogAction::Release);
        assert_eq!(log.quantity, 4);

        let all = office.restock_office_supplies(&[pens.id], 6).expect("restock");
        assert_eq!(all[0].qty, 6);
        assert_eq!(all[0].status, ItemStatus::Available);
    }

    #[test]
    fn batch_borrow_is_all_or_nothing() {
        let (_dir, office) = admin_office();
        let chairs = stock(&office, "Chair", "School Equipment", "", 10);
        let mics = stock(&office, "Microphone", "School Equipment", "", 1);

        let err = office
            .borrow_non_consumables(&[chairs.id, mics.id], 2)
            .expect_err("short");
        assert_eq!(err.code(), "NOT_ENOUGH_STOCK:Microphone:1");
        let untouched = office.list_inventory().expect("list");
        assert!(untouched.iter().all(|i| i.borrowed_qty == 0));

        office
            .borrow_non_consumables(&[chairs.id], 4)
            .expect("borrow");
        let err = office
            .return_non_consumables(&[chairs.id, mics.id], 5)
            .expect_err("over-return");
        assert_eq!(err.code(), "RETURN_TOO_MUCH:Chair:4");
        assert!(matches!(
            office.return_non_consumables(&[mics.id], 1),
            Err(OfficeError::NothingToReturn)
        ));
        let all = office
            .return_non_consumables(&[chairs.id], 4)
            .expect("return");
        let chair = all.iter().find(|i| i.id == chairs.id).expect("chair");
        assert_eq!((chair.qty, chair.borrowed_qty), (10, 0));
    }

    #[test]
    fn explicit_status_survives_update() {
        let (_dir, office) = admin_office();
        let desk = stock(&office, "Desk", "School Equipment", "", 3);
        let damaged = office
            .update_item(
                desk.id,
                ItemPatch {
                    status: Some(ItemStatus::Damaged),
                    ..ItemPatch::default()
                },
            )
            .expect("update");
        assert_eq!(damaged.status, ItemStatus::Damaged);

        let recount = office
            .update_item(
                desk.id,
                ItemPatch {
                    qty: Some(0),
                    ..ItemPatch::default()
                },
            )
            .expect("update");
        assert_eq!(recount.status, ItemStatus::Borrowed);
    }

    #[test]
    fn overflowing_quantities_are_rejected() {
        let (dir, office) = admin_office();
        let pens = stock(&office, "Pens", OFFICE_SUPPLIES, CONSUMABLES, 1);
        let before = std::fs::read_to_string(dir.path().join("inventory.json")).expect("read");

        assert!(matches!(
            office.restock_office_supplies(&[pens.id], i64::MAX),
            Err(OfficeError::InvalidQty)
        ));
        assert!(matches!(
            office.add_item(NewItem {
                name: "Pens".to_string(),
                category: OFFICE_SUPPLIES.to_string(),
                sub_category: CONSUMABLES.to_string(),
                qty: i64::MAX,
            }),
            Err(OfficeError::InvalidQty)
        ));
        let after = std::fs::read_to_string(dir.path().join("inventory.json")).expect("read");
        assert_eq!(before, after);

        let all = office
            .release_office_consumables(&[pens.id], i64::MAX)
            .expect("release");
        assert_eq!(all[0].qty, 0);
    }

    #[test]
    fn repeated_ids_apply_once() {
        let (_dir, office) = admin_office();
        let pens = stock(&office, "Pens", OFFICE_SUPPLIES, CONSUMABLES, 10);
        let all = office
            .restock_office_supplies(&[pens.id, pens.id, pens.id], 2)
            .expect("restock");
        assert_eq!(all[0].qty, 12);
        let restocks = office
            .storage()
            .logs()
            .iter()
            .filter(|l| l.action == LogAction::Restock)
            .count();
        assert_eq!(restocks, 1);
    }

    #[test]
    fn unknown_ids_and_quantities_are_refused() {
        let (_dir, office) = admin_office();
        let projector = stock(&office, "Projector", "School Equipment", "", 2);
        office.borrow_equipment(projector.id, 1).expect("borrow");

        assert!(matches!(
            office.update_item(
                projector.id + 1,
                ItemPatch {
                    qty: Some(3),
                    ..ItemPatch::default()
                }
            ),
            Err(OfficeError::ItemNotFound)
        ));
        assert!(matches!(
            office.return_equipment(projector.id, 0),
            Err(OfficeError::InvalidQty)
        ));
        assert!(matches!(
            office.return_equipment(projector.id, -1),
            Err(OfficeError::InvalidQty)
        ));
        let item = &office.list_inventory().expect("list")[0];
        assert_eq!((item.qty, item.borrowed_qty), (1, 1));
    }

    #[test]
    fn foreign_status_labels_survive_a_write() {
        let (dir, office) = admin_office();
        std::fs::write(
            dir.path().join("inventory.json"),
            r#"[
                {"id": 1, "name": "Projector", "category": "School Equipment", "qty": 2, "status": "Available"},
                {"id": 2, "name": "Laptop", "category": "School Equipment", "qty": 0, "status": "In Repair"}
            ]"#,
        )
        .expect("seed");
        assert_eq!(office.list_inventory().expect("list").len(), 2);

        stock(&office, "Pens", OFFICE_SUPPLIES, CONSUMABLES, 9);
        let names: Vec<String> = office
            .list_inventory()
            .expect("list")
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Projector", "Laptop", "Pens"]);
    }

    #[test]
    fn damaged_inventory_document_blocks_writes() {
        let (dir, office) = admin_office();
        let path = dir.path().join("inventory.json");
        std::fs::write(path.as_path(), "not json at all").expect("seed");

        let err = office
            .add_item(NewItem {
                name: "Pens".to_string(),
                category: OFFICE_SUPPLIES.to_string(),
                sub_category: CONSUMABLES.to_string(),
                qty: 3,
            })
            .expect_err("damaged");
        assert_eq!(err.code(), "CORRUPT_DOCUMENT:inventory");
        assert!(office.restock_office_supplies(&[1], 1).is_err());
        assert_eq!(
            std::fs::read_to_string(path.as_path()).expect("read"),
            "not json at all"
        );
        assert!(office.storage().logs().is_empty());
    }

    #[test]
    fn mutations_require_an_admin() {
        let (_dir, office) = admin_office();
        let desk = stock(&office, "Desk", "School Equipment", "", 3);
        office
            .storage()
            .set_current_user(&User {
                name: "Staff".to_string(),
                username: "staff".to_string(),
                role: Role::User,
            })
            .expect("session");
        assert!(matches!(
            office.borrow_equipment(desk.id, 1),
            Err(OfficeError::NotAuthorized)
        ));
        assert!(matches!(office.remove_item(desk.id), Err(OfficeError::NotAuthorized)));
        assert_eq!(office.list_inventory().expect("list")[0].qty, 3);
    }

    #[test]
    fn remove_and_clear_are_logged() {
        let (_dir, office) = admin_office();
        let desk = stock(&office, "Desk", "School Equipment", "", 3);
        stock(&office, "Chair", "School Equipment", "", 3);
        let rest = office.remove_item(desk.id).expect("remove");
        assert_eq!(rest.len(), 1);
        assert!(matches!(office.remove_item(desk.id), Err(OfficeError::ItemNotFound)));
        office.clear_all_inventory().expect("clear");
        assert!(office.list_inventory().expect("list").is_empty());
        let actions: Vec<_> = office.storage().logs().iter().map(|l| l.action.clone()).collect();
        assert_eq!(
            &actions[..2],
            &[LogAction::ClearInventory, LogAction::RemoveItem]
        );
    }
}
