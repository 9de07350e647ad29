//! Meal plan repository.

use lebensmittel_core::{GroupId, RecordId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

use super::require_non_empty;
use crate::errors::{Result, StoreError};
use crate::models::{MealPlan, MealPlanUpdate, NewMealPlan};

const KIND: &str = "meal plan";

/// Meal plan repository.
pub struct MealPlanRepo;

impl MealPlanRepo {
    /// All meal plans of a group, earliest first.
    pub fn list(conn: &Connection, group: &GroupId) -> Result<Vec<MealPlan>> {
        let mut stmt = conn.prepare(
            "SELECT id, date, meal_description, group_id, user_id
             FROM meal_plans WHERE group_id = ?1 ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![group.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One meal plan of a group.
    pub fn get(conn: &Connection, group: &GroupId, id: &RecordId) -> Result<MealPlan> {
        conn.query_row(
            "SELECT id, date, meal_description, group_id, user_id
             FROM meal_plans WHERE id = ?1 AND group_id = ?2",
            params![id.as_str(), group.as_str()],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(KIND, id.as_str()))
    }

    /// Insert a new meal plan.
    pub fn create(
        conn: &Connection,
        group: &GroupId,
        user: &UserId,
        input: NewMealPlan,
    ) -> Result<MealPlan> {
        require_non_empty("mealDescription", &input.meal_description)?;
        let meal = MealPlan {
            id: RecordId::generate(),
            date: input.date,
            meal_description: input.meal_description,
            group_id: group.clone(),
            user_id: user.clone(),
        };
        let _ = conn.execute(
            "INSERT INTO meal_plans (id, date, meal_description, group_id, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                meal.id.as_str(),
                meal.date,
                meal.meal_description,
                meal.group_id.as_str(),
                meal.user_id.as_str(),
            ],
        )?;
        Ok(meal)
    }

    /// Apply a partial update and return the stored result.
    pub fn update(
        conn: &Connection,
        group: &GroupId,
        id: &RecordId,
        update: MealPlanUpdate,
    ) -> Result<MealPlan> {
        if let Some(desc) = &update.meal_description {
            require_non_empty("mealDescription", desc)?;
        }
        let mut meal = Self::get(conn, group, id)?;
        update.apply(&mut meal);
        let _ = conn.execute(
            "UPDATE meal_plans SET date = ?1, meal_description = ?2
             WHERE id = ?3 AND group_id = ?4",
            params![meal.date, meal.meal_description, id.as_str(), group.as_str()],
        )?;
        Ok(meal)
    }

    /// Delete a meal plan.
    pub fn delete(conn: &Connection, group: &GroupId, id: &RecordId) -> Result<()> {
        let changed = conn.execute(
            "DELETE FROM meal_plans WHERE id = ?1 AND group_id = ?2",
            params![id.as_str(), group.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found(KIND, id.as_str()));
        }
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MealPlan> {
        Ok(MealPlan {
            id: RecordId::from(row.get::<_, String>(0)?),
            date: row.get(1)?,
            meal_description: row.get(2)?,
            group_id: GroupId::from(row.get::<_, String>(3)?),
            user_id: UserId::from(row.get::<_, String>(4)?),
        })
    }
}
