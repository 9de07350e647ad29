//! Request extractors for the authenticated REST surface.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use lebensmittel_core::{GroupId, UserId};
use tracing::debug;

use crate::auth::AuthError;
use crate::errors::ApiError;
use crate::server::AppState;

/// Header naming the group a request acts on.
pub const GROUP_HEADER: &str = "x-group-id";

/// The user authenticated by the request's access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Authorization header required"))?;

        let token = match header.split(' ').collect::<Vec<_>>().as_slice() {
            ["Bearer", token] => *token,
            _ => return Err(ApiError::unauthorized("Invalid authorization header format")),
        };

        match state.auth.validate(token) {
            Ok(user) => Ok(Self(user)),
            Err(AuthError::WrongType) => Err(ApiError::unauthorized("Invalid token type")),
            Err(err) => {
                debug!(error = %err, "access token rejected");
                Err(ApiError::unauthorized("Invalid or expired token"))
            }
        }
    }
}

/// The authenticated user plus the group the request acts on.
///
/// Taken from `X-Group-ID` when present (the user must belong to it),
/// otherwise the user's oldest membership.
#[derive(Debug, Clone)]
pub struct ActiveGroup {
    /// Caller.
    pub user: UserId,
    /// Group the request is scoped to.
    pub group: GroupId,
}

impl FromRequestParts<AppState> for ActiveGroup {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        let requested = parts
            .headers
            .get(GROUP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(GroupId::from);

        let groups = state
            .membership
            .user_groups(&user)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to get user groups: {e}")))?;

        let group = match requested {
            Some(group) if groups.contains(&group) => group,
            Some(_) => {
                return Err(ApiError::Forbidden(
                    "user is not a member of the requested group".into(),
                ));
            }
            None => groups
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::bad_request("user has no groups"))?,
        };
        Ok(Self { user, group })
    }
}
