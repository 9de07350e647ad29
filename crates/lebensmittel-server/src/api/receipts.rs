//! `/api/receipts`

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use lebensmittel_core::RecordId;
use lebensmittel_store::{NewReceipt, Receipt, ReceiptUpdate};
use serde::Deserialize;
use serde_json::{Value, json};

use super::extract::ActiveGroup;
use super::parse_date;
use crate::errors::{ApiError, Result};
use crate::server::AppState;

/// POST body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceipt {
    date: Option<String>,
    total_amount: Option<f64>,
    purchased_by: Option<String>,
    #[serde(default)]
    items: Vec<String>,
    notes: Option<String>,
}

/// PUT body. `totalAmount` may also arrive as a numeric string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchReceipt {
    date: Option<String>,
    total_amount: Option<Amount>,
    purchased_by: Option<String>,
    items: Option<Vec<String>>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Amount {
    Number(f64),
    Text(String),
}

impl PatchReceipt {
    fn into_update(self) -> Result<ReceiptUpdate> {
        let total_amount = match self.total_amount {
            None => None,
            Some(Amount::Number(n)) => Some(n),
            Some(Amount::Text(s)) => Some(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| ApiError::bad_request("totalAmount must be a number"))?,
            ),
        };
        Ok(ReceiptUpdate {
            date: self.date.as_deref().map(parse_date).transpose()?,
            total_amount,
            purchased_by: self.purchased_by,
            items: self.items,
            notes: self.notes,
        })
    }
}

/// GET: every receipt of the active group.
pub async fn list(State(state): State<AppState>, active: ActiveGroup) -> Result<Json<Value>> {
    let receipts = state.store.list_receipts(&active.group).await?;
    Ok(Json(json!({ "receipts": receipts, "count": receipts.len() })))
}

/// POST: record a receipt.
pub async fn create(
    State(state): State<AppState>,
    active: ActiveGroup,
    body: std::result::Result<Json<CreateReceipt>, JsonRejection>,
) -> Result<(StatusCode, Json<Receipt>)> {
    let required = || ApiError::bad_request("date, totalAmount, and purchasedBy are required");
    let Json(body) = body.map_err(|_| required())?;
    let (Some(date), Some(total_amount), Some(purchased_by)) = (
        body.date.filter(|s| !s.is_empty()),
        body.total_amount,
        body.purchased_by.filter(|s| !s.is_empty()),
    ) else {
        return Err(required());
    };

    let input = NewReceipt {
        date: parse_date(&date)?,
        total_amount,
        purchased_by,
        items: body.items,
        notes: body.notes,
    };
    let receipt = state
        .store
        .create_receipt(&active.group, &active.user, input)
        .await?;
    state
        .dispatcher
        .emit("receipt_created", &receipt, &[receipt.group_id.clone()]);
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// PUT: partial update of one receipt.
pub async fn update(
    State(state): State<AppState>,
    active: ActiveGroup,
    Path(receipt_id): Path<RecordId>,
    body: std::result::Result<Json<PatchReceipt>, JsonRejection>,
) -> Result<Json<Receipt>> {
    let Ok(Json(patch)) = body else {
        return Err(ApiError::bad_request("No data provided"));
    };
    let update = patch.into_update()?;
    if update.is_empty() {
        return Err(ApiError::bad_request("No data provided"));
    }
    let receipt = state
        .store
        .update_receipt(&active.group, &receipt_id, update)
        .await?;
    state
        .dispatcher
        .emit("receipt_updated", &receipt, &[receipt.group_id.clone()]);
    Ok(Json(receipt))
}

/// DELETE: remove one receipt.
pub async fn remove(
    State(state): State<AppState>,
    active: ActiveGroup,
    Path(receipt_id): Path<RecordId>,
) -> Result<Json<Value>> {
    state
        .store
        .delete_receipt(&active.group, &receipt_id)
        .await?;
    state
        .dispatcher
        .emit("receipt_deleted", &json!({ "id": receipt_id }), &[active.group]);
    Ok(Json(json!({ "message": "Receipt deleted successfully" })))
}
