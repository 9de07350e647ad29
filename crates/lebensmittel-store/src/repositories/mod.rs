//! Repository implementations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`.
//! Record lookups are always scoped by group: a record outside the given
//! group is reported as not found.

pub mod grocery;
pub mod groups;
pub mod meals;
pub mod receipts;

pub use grocery::GroceryRepo;
pub use groups::GroupRepo;
pub use meals::MealPlanRepo;
pub use receipts::ReceiptRepo;

use crate::errors::{Result, StoreError};

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
