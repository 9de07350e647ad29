//! `/api/groups`

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use lebensmittel_core::{GroupId, UserId};
use lebensmittel_store::Group;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::extract::AuthUser;
use crate::errors::{ApiError, Result};
use crate::server::AppState;

/// POST body for a new group.
#[derive(Debug, Deserialize)]
pub struct CreateGroup {
    name: Option<String>,
}

/// POST body for adding a member.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMember {
    user_id: Option<UserId>,
}

/// GET: the caller's groups, oldest membership first.
pub async fn list(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Value>> {
    let groups = state.store.groups_for_user(&user).await?;
    Ok(Json(json!({ "groups": groups, "count": groups.len() })))
}

/// POST: create a group with the caller as its first member.
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: std::result::Result<Json<CreateGroup>, JsonRejection>,
) -> Result<(StatusCode, Json<Group>)> {
    let name = body
        .ok()
        .and_then(|Json(body)| body.name)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Name is required"))?;

    let group = state.store.create_group(name, &user).await?;
    info!(group_id = %group.id, user_id = %user, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

/// POST `/{group_id}/members`: add a user to a group the caller belongs to.
pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(group_id): Path<GroupId>,
    body: std::result::Result<Json<AddMember>, JsonRejection>,
) -> Result<Json<Value>> {
    let member = body
        .ok()
        .and_then(|Json(body)| body.user_id)
        .filter(|id| !id.as_str().is_empty())
        .ok_or_else(|| ApiError::bad_request("userId is required"))?;

    if !state.store.is_member(&caller, &group_id).await? {
        return Err(ApiError::Forbidden(
            "user is not a member of the requested group".into(),
        ));
    }
    if state.store.add_member(&member, &group_id).await? {
        info!(group_id = %group_id, user_id = %member, "member added");
        state.dispatcher.emit(
            "group_member_added",
            &json!({ "groupId": group_id, "userId": member }),
            &[group_id.clone()],
        );
    }
    Ok(Json(json!({ "message": "User added to group successfully" })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use lebensmittel_core::{GroupId, UserId};
    use serde_json::json;

    use crate::api::test_support::Harness;

    #[tokio::test]
    async fn create_then_list() {
        let h = Harness::new();
        let (status, group) = h
            .call("POST", "/api/groups", Some("alice"), None, Some(json!({"name": "WG"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(group["name"], "WG");

        let (status, body) = h.call("GET", "/api/groups", Some("alice"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["groups"][0]["id"], group["id"]);
    }

    #[tokio::test]
    async fn create_makes_creator_a_member() {
        let h = Harness::new();
        let (_, group) = h
            .call("POST", "/api/groups", Some("alice"), None, Some(json!({"name": "WG"})))
            .await;
        let id = GroupId::from(group["id"].as_str().unwrap());
        assert!(h.store.is_member(&UserId::from("alice"), &id).await.unwrap());
        assert!(!h.store.is_member(&UserId::from("bob"), &id).await.unwrap());

        // the creator can act on the group straight away
        let (status, _) = h
            .call("GET", "/api/grocery-items", Some("alice"), Some(&id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn blank_name_rejected() {
        let h = Harness::new();
        let (status, body) = h
            .call("POST", "/api/groups", Some("alice"), None, Some(json!({"name": "  "})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Name is required");
    }

    #[tokio::test]
    async fn member_can_add_user_and_group_is_notified() {
        let h = Harness::new();
        let group = h.group("Home", "alice").await;
        let sink = h.listen(&group).await;

        let (status, _) = h
            .call(
                "POST",
                &format!("/api/groups/{group}/members"),
                Some("alice"),
                None,
                Some(json!({"userId": "bob"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.store.is_member(&UserId::from("bob"), &group).await.unwrap());

        // adding twice is a no-op and emits once
        let _ = h
            .call(
                "POST",
                &format!("/api/groups/{group}/members"),
                Some("alice"),
                None,
                Some(json!({"userId": "bob"})),
            )
            .await;
        let events = h.events(&sink).await;
        assert_eq!(
            events,
            [json!({"event": "group_member_added", "data": {"groupId": group.as_str(), "userId": "bob"}})]
        );
    }

    #[tokio::test]
    async fn outsider_cannot_add_members() {
        let h = Harness::new();
        let group = h.group("Home", "alice").await;
        let (status, _) = h
            .call(
                "POST",
                &format!("/api/groups/{group}/members"),
                Some("mallory"),
                None,
                Some(json!({"userId": "mallory"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!h.store.is_member(&UserId::from("mallory"), &group).await.unwrap());
    }
}
