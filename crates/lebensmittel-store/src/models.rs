//! Stored record types and their create/update inputs.
//!
//! Records serialize camelCase; dates serialize as `YYYY-MM-DD`. Update
//! structs carry one `Option` per mutable column: `None` leaves the column
//! untouched.

use chrono::NaiveDate;
use lebensmittel_core::{GroupId, RecordId, UserId};
use serde::{Deserialize, Serialize};

/// A household or other sharing unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group id.
    pub id: GroupId,
    /// Display name.
    pub name: String,
}

/// One entry on a group's grocery list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    /// Record id.
    pub id: RecordId,
    /// Item name.
    pub name: String,
    /// Free-form category, e.g. `"Dairy"`.
    pub category: String,
    /// On the shopping list.
    pub is_needed: bool,
    /// Ticked off during the current shopping trip.
    pub is_shopping_checked: bool,
    /// Owning group.
    pub group_id: GroupId,
    /// Creator.
    pub user_id: UserId,
}

/// Input for creating a grocery item.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroceryItem {
    /// Item name (required, non-empty).
    pub name: String,
    /// Category (required, non-empty).
    pub category: String,
    /// Defaults to `true`.
    #[serde(default)]
    pub is_needed: Option<bool>,
    /// Defaults to `false`.
    #[serde(default)]
    pub is_shopping_checked: Option<bool>,
}

/// Partial update for a grocery item.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItemUpdate {
    #[allow(missing_docs)]
    pub name: Option<String>,
    #[allow(missing_docs)]
    pub category: Option<String>,
    #[allow(missing_docs)]
    pub is_needed: Option<bool>,
    #[allow(missing_docs)]
    pub is_shopping_checked: Option<bool>,
}

impl GroceryItemUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.is_needed.is_none()
            && self.is_shopping_checked.is_none()
    }

    pub(crate) fn apply(self, item: &mut GroceryItem) {
        if let Some(v) = self.name {
            item.name = v;
        }
        if let Some(v) = self.category {
            item.category = v;
        }
        if let Some(v) = self.is_needed {
            item.is_needed = v;
        }
        if let Some(v) = self.is_shopping_checked {
            item.is_shopping_checked = v;
        }
    }
}

/// What a group plans to eat on one day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    /// Record id.
    pub id: RecordId,
    /// Calendar day.
    pub date: NaiveDate,
    /// Free-text description of the meal.
    pub meal_description: String,
    /// Owning group.
    pub group_id: GroupId,
    /// Creator.
    pub user_id: UserId,
}

/// Input for creating a meal plan.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMealPlan {
    #[allow(missing_docs)]
    pub date: NaiveDate,
    #[allow(missing_docs)]
    pub meal_description: String,
}

/// Partial update for a meal plan.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanUpdate {
    #[allow(missing_docs)]
    pub date: Option<NaiveDate>,
    #[allow(missing_docs)]
    pub meal_description: Option<String>,
}

impl MealPlanUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.meal_description.is_none()
    }

    pub(crate) fn apply(self, meal: &mut MealPlan) {
        if let Some(v) = self.date {
            meal.date = v;
        }
        if let Some(v) = self.meal_description {
            meal.meal_description = v;
        }
    }
}

/// A shopping receipt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Record id.
    pub id: RecordId,
    /// Purchase day.
    pub date: NaiveDate,
    /// Total paid.
    pub total_amount: f64,
    /// Who paid.
    pub purchased_by: String,
    /// Purchased item names, stored as a JSON array.
    pub items: Vec<String>,
    /// Optional note.
    pub notes: Option<String>,
    /// Owning group.
    pub group_id: GroupId,
    /// Creator.
    pub user_id: UserId,
}

/// Input for creating a receipt.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReceipt {
    #[allow(missing_docs)]
    pub date: NaiveDate,
    #[allow(missing_docs)]
    pub total_amount: f64,
    #[allow(missing_docs)]
    pub purchased_by: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub items: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for a receipt.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptUpdate {
    #[allow(missing_docs)]
    pub date: Option<NaiveDate>,
    #[allow(missing_docs)]
    pub total_amount: Option<f64>,
    #[allow(missing_docs)]
    pub purchased_by: Option<String>,
    #[allow(missing_docs)]
    pub items: Option<Vec<String>>,
    #[allow(missing_docs)]
    pub notes: Option<String>,
}

impl ReceiptUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.total_amount.is_none()
            && self.purchased_by.is_none()
            && self.items.is_none()
            && self.notes.is_none()
    }

    pub(crate) fn apply(self, receipt: &mut Receipt) {
        if let Some(v) = self.date {
            receipt.date = v;
        }
        if let Some(v) = self.total_amount {
            receipt.total_amount = v;
        }
        if let Some(v) = self.purchased_by {
            receipt.purchased_by = v;
        }
        if let Some(v) = self.items {
            receipt.items = v;
        }
        if let Some(v) = self.notes {
            receipt.notes = Some(v);
        }
    }
}
