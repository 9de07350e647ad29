//! Grocery item repository.

use lebensmittel_core::{GroupId, RecordId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

use super::require_non_empty;
use crate::errors::{Result, StoreError};
use crate::models::{GroceryItem, GroceryItemUpdate, NewGroceryItem};

const KIND: &str = "grocery item";

const COLUMNS: &str = "id, name, category, is_needed, is_shopping_checked, group_id, user_id";

/// Grocery item repository.
pub struct GroceryRepo;

impl GroceryRepo {
    /// All items of a group, ordered by name.
    pub fn list(conn: &Connection, group: &GroupId) -> Result<Vec<GroceryItem>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM grocery_items WHERE group_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt
            .query_map(params![group.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One item of a group.
    pub fn get(conn: &Connection, group: &GroupId, id: &RecordId) -> Result<GroceryItem> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM grocery_items WHERE id = ?1 AND group_id = ?2"),
            params![id.as_str(), group.as_str()],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(KIND, id.as_str()))
    }

    /// Insert a new item. `is_needed` defaults to `true`, `is_shopping_checked` to `false`.
    pub fn create(
        conn: &Connection,
        group: &GroupId,
        user: &UserId,
        input: NewGroceryItem,
    ) -> Result<GroceryItem> {
        require_non_empty("name", &input.name)?;
        require_non_empty("category", &input.category)?;
        let item = GroceryItem {
            id: RecordId::generate(),
            name: input.name,
            category: input.category,
            is_needed: input.is_needed.unwrap_or(true),
            is_shopping_checked: input.is_shopping_checked.unwrap_or(false),
            group_id: group.clone(),
            user_id: user.clone(),
        };
        let _ = conn.execute(
            &format!("INSERT INTO grocery_items ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                item.id.as_str(),
                item.name,
                item.category,
                item.is_needed,
                item.is_shopping_checked,
                item.group_id.as_str(),
                item.user_id.as_str(),
            ],
        )?;
        Ok(item)
    }

    /// Apply a partial update and return the stored result.
    pub fn update(
        conn: &Connection,
        group: &GroupId,
        id: &RecordId,
        update: GroceryItemUpdate,
    ) -> Result<GroceryItem> {
        if let Some(name) = &update.name {
            require_non_empty("name", name)?;
        }
        let mut item = Self::get(conn, group, id)?;
        update.apply(&mut item);
        let _ = conn.execute(
            "UPDATE grocery_items
             SET name = ?1, category = ?2, is_needed = ?3, is_shopping_checked = ?4
             WHERE id = ?5 AND group_id = ?6",
            params![
                item.name,
                item.category,
                item.is_needed,
                item.is_shopping_checked,
                id.as_str(),
                group.as_str(),
            ],
        )?;
        Ok(item)
    }

    /// Delete an item.
    pub fn delete(conn: &Connection, group: &GroupId, id: &RecordId) -> Result<()> {
        let changed = conn.execute(
            "DELETE FROM grocery_items WHERE id = ?1 AND group_id = ?2",
            params![id.as_str(), group.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found(KIND, id.as_str()));
        }
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroceryItem> {
        Ok(GroceryItem {
            id: RecordId::from(row.get::<_, String>(0)?),
            name: row.get(1)?,
            category: row.get(2)?,
            is_needed: row.get(3)?,
            is_shopping_checked: row.get(4)?,
            group_id: GroupId::from(row.get::<_, String>(5)?),
            user_id: UserId::from(row.get::<_, String>(6)?),
        })
    }
}
