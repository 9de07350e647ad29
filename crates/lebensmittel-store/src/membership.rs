//! Group membership query used to authorize realtime subscriptions.

use async_trait::async_trait;
use lebensmittel_core::{GroupId, UserId};

use crate::errors::Result;

/// Resolves which groups a user belongs to.
///
/// Callers query on every authorization decision; implementations must not
/// cache results across calls.
#[async_trait]
pub trait MembershipQuery: Send + Sync {
    /// Groups `user` belongs to, oldest membership first.
    async fn user_groups(&self, user: &UserId) -> Result<Vec<GroupId>>;
}
