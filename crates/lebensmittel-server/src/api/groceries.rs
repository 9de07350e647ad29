//! `/api/grocery-items`

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use lebensmittel_core::RecordId;
use lebensmittel_store::{GroceryItem, GroceryItemUpdate, NewGroceryItem};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::extract::ActiveGroup;
use crate::errors::{ApiError, Result};
use crate::server::AppState;

/// POST body. Fields are optional so missing ones map to a single 400.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroceryItem {
    name: Option<String>,
    category: Option<String>,
    is_needed: Option<bool>,
    is_shopping_checked: Option<bool>,
}

/// GET: every item of the active group.
pub async fn list(State(state): State<AppState>, active: ActiveGroup) -> Result<Json<Value>> {
    let items = state.store.list_grocery_items(&active.group).await?;
    Ok(Json(json!({ "groceryItems": items, "count": items.len() })))
}

/// POST: create an item; `isNeeded` defaults to true, `isShoppingChecked` to false.
pub async fn create(
    State(state): State<AppState>,
    active: ActiveGroup,
    body: std::result::Result<Json<CreateGroceryItem>, JsonRejection>,
) -> Result<(StatusCode, Json<GroceryItem>)> {
    let required = || ApiError::bad_request("Name and category are required");
    let Json(body) = body.map_err(|_| required())?;
    let (Some(name), Some(category)) = (
        body.name.filter(|s| !s.is_empty()),
        body.category.filter(|s| !s.is_empty()),
    ) else {
        return Err(required());
    };

    let input = NewGroceryItem {
        name,
        category,
        is_needed: body.is_needed,
        is_shopping_checked: body.is_shopping_checked,
    };
    let item = state
        .store
        .create_grocery_item(&active.group, &active.user, input)
        .await?;
    info!(item_id = %item.id, group_id = %item.group_id, "grocery item created");
    state
        .dispatcher
        .emit("grocery_item_created", &item, &[item.group_id.clone()]);
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT: partial update of one item.
pub async fn update(
    State(state): State<AppState>,
    active: ActiveGroup,
    Path(item_id): Path<RecordId>,
    body: std::result::Result<Json<GroceryItemUpdate>, JsonRejection>,
) -> Result<Json<GroceryItem>> {
    let update = match body {
        Ok(Json(update)) if !update.is_empty() => update,
        _ => return Err(ApiError::bad_request("No data provided")),
    };
    let item = state
        .store
        .update_grocery_item(&active.group, &item_id, update)
        .await?;
    state
        .dispatcher
        .emit("grocery_item_updated", &item, &[item.group_id.clone()]);
    Ok(Json(item))
}

/// DELETE: remove one item.
pub async fn remove(
    State(state): State<AppState>,
    active: ActiveGroup,
    Path(item_id): Path<RecordId>,
) -> Result<Json<Value>> {
    state
        .store
        .delete_grocery_item(&active.group, &item_id)
        .await?;
    state.dispatcher.emit(
        "grocery_item_deleted",
        &json!({ "id": item_id }),
        &[active.group],
    );
    Ok(Json(json!({ "message": "Grocery item deleted successfully" })))
}
