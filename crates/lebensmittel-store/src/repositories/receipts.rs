//! Receipt repository. Item names are stored as a JSON array in one column.

use lebensmittel_core::{GroupId, RecordId, UserId};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use super::require_non_empty;
use crate::errors::{Result, StoreError};
use crate::models::{NewReceipt, Receipt, ReceiptUpdate};

const KIND: &str = "receipt";

const COLUMNS: &str = "id, date, total_amount, purchased_by, items, notes, group_id, user_id";

/// Receipt repository.
pub struct ReceiptRepo;

impl ReceiptRepo {
    /// All receipts of a group, newest first.
    pub fn list(conn: &Connection, group: &GroupId) -> Result<Vec<Receipt>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM receipts WHERE group_id = ?1 ORDER BY date DESC"
        ))?;
        let rows = stmt
            .query_map(params![group.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One receipt of a group.
    pub fn get(conn: &Connection, group: &GroupId, id: &RecordId) -> Result<Receipt> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM receipts WHERE id = ?1 AND group_id = ?2"),
            params![id.as_str(), group.as_str()],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(KIND, id.as_str()))
    }

    /// Insert a new receipt.
    pub fn create(
        conn: &Connection,
        group: &GroupId,
        user: &UserId,
        input: NewReceipt,
    ) -> Result<Receipt> {
        require_non_empty("purchasedBy", &input.purchased_by)?;
        validate_amount(input.total_amount)?;
        let receipt = Receipt {
            id: RecordId::generate(),
            date: input.date,
            total_amount: input.total_amount,
            purchased_by: input.purchased_by,
            items: input.items,
            notes: input.notes,
            group_id: group.clone(),
            user_id: user.clone(),
        };
        let items = serde_json::to_string(&receipt.items)?;
        let _ = conn.execute(
            &format!("INSERT INTO receipts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                receipt.id.as_str(),
                receipt.date,
                receipt.total_amount,
                receipt.purchased_by,
                items,
                receipt.notes,
                receipt.group_id.as_str(),
                receipt.user_id.as_str(),
            ],
        )?;
        Ok(receipt)
    }

    /// Apply a partial update and return the stored result.
    pub fn update(
        conn: &Connection,
        group: &GroupId,
        id: &RecordId,
        update: ReceiptUpdate,
    ) -> Result<Receipt> {
        if let Some(by) = &update.purchased_by {
            require_non_empty("purchasedBy", by)?;
        }
        if let Some(amount) = update.total_amount {
            validate_amount(amount)?;
        }
        let mut receipt = Self::get(conn, group, id)?;
        update.apply(&mut receipt);
        let items = serde_json::to_string(&receipt.items)?;
        let _ = conn.execute(
            "UPDATE receipts
             SET date = ?1, total_amount = ?2, purchased_by = ?3, items = ?4, notes = ?5
             WHERE id = ?6 AND group_id = ?7",
            params![
                receipt.date,
                receipt.total_amount,
                receipt.purchased_by,
                items,
                receipt.notes,
                id.as_str(),
                group.as_str(),
            ],
        )?;
        Ok(receipt)
    }

    /// Delete a receipt.
    pub fn delete(conn: &Connection, group: &GroupId, id: &RecordId) -> Result<()> {
        let changed = conn.execute(
            "DELETE FROM receipts WHERE id = ?1 AND group_id = ?2",
            params![id.as_str(), group.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found(KIND, id.as_str()));
        }
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Receipt> {
        let raw_items: String = row.get(4)?;
        let items = serde_json::from_str(&raw_items)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
        Ok(Receipt {
            id: RecordId::from(row.get::<_, String>(0)?),
            date: row.get(1)?,
            total_amount: row.get(2)?,
            purchased_by: row.get(3)?,
            items,
            notes: row.get(5)?,
            group_id: GroupId::from(row.get::<_, String>(6)?),
            user_id: UserId::from(row.get::<_, String>(7)?),
        })
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(StoreError::InvalidInput(
            "totalAmount must be a non-negative number".into(),
        ));
    }
    Ok(())
}
