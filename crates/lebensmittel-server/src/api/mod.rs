//! Authenticated REST resources.
//!
//! Mutating handlers emit their realtime event only after the store write
//! succeeds, targeted at the group that owns the record. Creating a group
//! emits nothing.

use axum::Router;
use axum::routing::{get, post, put};

use crate::server::AppState;

pub mod extract;
pub mod groceries;
pub mod groups;
pub mod meals;
pub mod receipts;

/// Routes mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/groups", get(groups::list).post(groups::create))
        .route("/groups/{group_id}/members", post(groups::add_member))
        .route(
            "/grocery-items",
            get(groceries::list).post(groceries::create),
        )
        .route(
            "/grocery-items/{item_id}",
            put(groceries::update).delete(groceries::remove),
        )
        .route("/meal-plans", get(meals::list).post(meals::create))
        .route(
            "/meal-plans/{meal_id}",
            put(meals::update).delete(meals::remove),
        )
        .route("/receipts", get(receipts::list).post(receipts::create))
        .route(
            "/receipts/{receipt_id}",
            put(receipts::update).delete(receipts::remove),
        )
}

/// Parse a `YYYY-MM-DD` request date.
pub(crate) fn parse_date(raw: &str) -> crate::errors::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| crate::errors::ApiError::bad_request("Invalid date format. Use YYYY-MM-DD"))
}


#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::test_support::{Harness, token_for};
    use super::*;
    use crate::auth::TokenKind;

    #[test]
    fn parse_date_accepts_iso_day() {
        assert_eq!(
            parse_date("2024-03-09").unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
        assert!(parse_date("09.03.2024").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[tokio::test]
    async fn missing_authorization_header() {
        let h = Harness::new();
        let (status, body) = h.call("GET", "/api/grocery-items", None, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Authorization header required"}));
    }

    #[tokio::test]
    async fn malformed_authorization_header() {
        let h = Harness::new();
        for value in ["Token abc", "bearer abc", "Bearer a b"] {
            let (status, body) = h
                .raw("GET", "/api/grocery-items", &[("authorization", value.into())], None)
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{value}");
            assert_eq!(body["error"], "Invalid authorization header format");
        }
    }

    #[tokio::test]
    async fn invalid_token_rejected() {
        let h = Harness::new();
        let (status, body) = h
            .raw("GET", "/api/groups", &[("authorization", "Bearer nope".into())], None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn refresh_token_is_wrong_type() {
        let h = Harness::new();
        let auth = format!("Bearer {}", token_for("alice", TokenKind::Refresh));
        let (status, body) = h
            .raw("GET", "/api/groups", &[("authorization", auth)], None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token type");
    }

    #[tokio::test]
    async fn user_without_groups_is_bad_request() {
        let h = Harness::new();
        let (status, body) = h
            .call("GET", "/api/receipts", Some("loner"), None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "user has no groups");
    }

    #[tokio::test]
    async fn foreign_group_header_is_forbidden() {
        let h = Harness::new();
        let _ = h.group("Alice Home", "alice").await;
        let bobs = h.group("Bob Home", "bob").await;
        let (status, body) = h
            .call("GET", "/api/meal-plans", Some("alice"), Some(&bobs), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "user is not a member of the requested group");
    }

    #[tokio::test]
    async fn first_group_is_default() {
        let h = Harness::new();
        let first = h.group("First", "alice").await;
        let second = h.group("Second", "alice").await;

        let (status, _) = h
            .call(
                "POST",
                "/api/grocery-items",
                Some("alice"),
                None,
                Some(json!({"name": "Milk", "category": "Dairy"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, in_first) = h
            .call("GET", "/api/grocery-items", Some("alice"), Some(&first), None)
            .await;
        let (_, in_second) = h
            .call("GET", "/api/grocery-items", Some("alice"), Some(&second), None)
            .await;
        assert_eq!(in_first["count"], 1);
        assert_eq!(in_second["count"], 0);
    }
}
