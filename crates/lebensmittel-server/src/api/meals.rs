//! `/api/meal-plans`

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use lebensmittel_core::RecordId;
use lebensmittel_store::{MealPlan, MealPlanUpdate, NewMealPlan};
use serde::Deserialize;
use serde_json::{Value, json};

use super::extract::ActiveGroup;
use super::parse_date;
use crate::errors::{ApiError, Result};
use crate::server::AppState;

/// POST body; `date` is `YYYY-MM-DD`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealPlan {
    date: Option<String>,
    meal_description: Option<String>,
}

/// PUT body; dates arrive as strings so a bad one gets its own message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchMealPlan {
    date: Option<String>,
    meal_description: Option<String>,
}

impl PatchMealPlan {
    fn into_update(self) -> Result<MealPlanUpdate> {
        Ok(MealPlanUpdate {
            date: self.date.as_deref().map(parse_date).transpose()?,
            meal_description: self.meal_description,
        })
    }
}

/// GET: every meal plan of the active group.
pub async fn list(State(state): State<AppState>, active: ActiveGroup) -> Result<Json<Value>> {
    let meals = state.store.list_meal_plans(&active.group).await?;
    Ok(Json(json!({ "mealPlans": meals, "count": meals.len() })))
}

/// POST: plan a meal.
pub async fn create(
    State(state): State<AppState>,
    active: ActiveGroup,
    body: std::result::Result<Json<CreateMealPlan>, JsonRejection>,
) -> Result<(StatusCode, Json<MealPlan>)> {
    let required = || ApiError::bad_request("date and mealDescription are required");
    let Json(body) = body.map_err(|_| required())?;
    let (Some(date), Some(meal_description)) = (
        body.date.filter(|s| !s.is_empty()),
        body.meal_description.filter(|s| !s.is_empty()),
    ) else {
        return Err(required());
    };

    let input = NewMealPlan {
        date: parse_date(&date)?,
        meal_description,
    };
    let meal = state
        .store
        .create_meal_plan(&active.group, &active.user, input)
        .await?;
    state
        .dispatcher
        .emit("meal_plan_created", &meal, &[meal.group_id.clone()]);
    Ok((StatusCode::CREATED, Json(meal)))
}

/// PUT: partial update of one meal plan.
pub async fn update(
    State(state): State<AppState>,
    active: ActiveGroup,
    Path(meal_id): Path<RecordId>,
    body: std::result::Result<Json<PatchMealPlan>, JsonRejection>,
) -> Result<Json<MealPlan>> {
    let Ok(Json(patch)) = body else {
        return Err(ApiError::bad_request("No data provided"));
    };
    let update = patch.into_update()?;
    if update.is_empty() {
        return Err(ApiError::bad_request("No data provided"));
    }
    let meal = state
        .store
        .update_meal_plan(&active.group, &meal_id, update)
        .await?;
    state
        .dispatcher
        .emit("meal_plan_updated", &meal, &[meal.group_id.clone()]);
    Ok(Json(meal))
}

/// DELETE: remove one meal plan.
pub async fn remove(
    State(state): State<AppState>,
    active: ActiveGroup,
    Path(meal_id): Path<RecordId>,
) -> Result<Json<Value>> {
    state.store.delete_meal_plan(&active.group, &meal_id).await?;
    state
        .dispatcher
        .emit("meal_plan_deleted", &json!({ "id": meal_id }), &[active.group]);
    Ok(Json(json!({ "message": "Meal plan deleted successfully" })))
}
