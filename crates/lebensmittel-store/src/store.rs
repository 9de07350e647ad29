//! Async facade over the connection pool.
//!
//! Every call checks out a pooled connection on the blocking thread pool and
//! runs one repository operation there.

use async_trait::async_trait;
use lebensmittel_core::{GroupId, RecordId, UserId};
use rusqlite::Connection;
use tracing::info;

use crate::connection::{self, ConnectionConfig, ConnectionPool};
use crate::errors::{Result, StoreError};
use crate::membership::MembershipQuery;
use crate::migrations::run_migrations;
use crate::models::{
    GroceryItem, GroceryItemUpdate, Group, MealPlan, MealPlanUpdate, NewGroceryItem, NewMealPlan,
    NewReceipt, Receipt, ReceiptUpdate,
};
use crate::repositories::{GroceryRepo, GroupRepo, MealPlanRepo, ReceiptRepo};

/// Path value that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Shared handle to the record store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    /// Wrap an existing pool. Migrations are not run.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and apply pending migrations.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = if path == IN_MEMORY {
            connection::new_in_memory(config)?
        } else {
            connection::new_file(path, config)?
        };
        let applied = run_migrations(&*pool.get()?)?;
        info!(path, applied, "record store ready");
        Ok(Self { pool })
    }

    /// Fresh migrated in-memory store.
    pub fn in_memory() -> Result<Self> {
        Self::open(IN_MEMORY, &ConnectionConfig::default())
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("store task failed: {e}")))?
    }

    // ── Groups ──────────────────────────────────────────────────────

    /// Groups `user` belongs to, oldest membership first.
    pub async fn groups_for_user(&self, user: &UserId) -> Result<Vec<Group>> {
        let user = user.clone();
        self.run(move |conn| GroupRepo::list_for_user(conn, &user))
            .await
    }

    /// Create a group with `creator` as its first member.
    pub async fn create_group(&self, name: String, creator: &UserId) -> Result<Group> {
        let creator = creator.clone();
        self.run(move |conn| GroupRepo::create(conn, &name, &creator))
            .await
    }

    /// Add `user` to an existing group.
    pub async fn add_member(&self, user: &UserId, group: &GroupId) -> Result<bool> {
        let (user, group) = (user.clone(), group.clone());
        self.run(move |conn| GroupRepo::add_member(conn, &user, &group))
            .await
    }

    /// Whether `user` belongs to `group`.
    pub async fn is_member(&self, user: &UserId, group: &GroupId) -> Result<bool> {
        let (user, group) = (user.clone(), group.clone());
        self.run(move |conn| GroupRepo::is_member(conn, &user, &group))
            .await
    }

    // ── Grocery items ───────────────────────────────────────────────

    /// All grocery items of a group.
    pub async fn list_grocery_items(&self, group: &GroupId) -> Result<Vec<GroceryItem>> {
        let group = group.clone();
        self.run(move |conn| GroceryRepo::list(conn, &group)).await
    }

    /// Create a grocery item.
    pub async fn create_grocery_item(
        &self,
        group: &GroupId,
        user: &UserId,
        input: NewGroceryItem,
    ) -> Result<GroceryItem> {
        let (group, user) = (group.clone(), user.clone());
        self.run(move |conn| GroceryRepo::create(conn, &group, &user, input))
            .await
    }

    /// Update a grocery item of a group.
    pub async fn update_grocery_item(
        &self,
        group: &GroupId,
        id: &RecordId,
        update: GroceryItemUpdate,
    ) -> Result<GroceryItem> {
        let (group, id) = (group.clone(), id.clone());
        self.run(move |conn| GroceryRepo::update(conn, &group, &id, update))
            .await
    }

    /// Delete a grocery item of a group.
    pub async fn delete_grocery_item(&self, group: &GroupId, id: &RecordId) -> Result<()> {
        let (group, id) = (group.clone(), id.clone());
        self.run(move |conn| GroceryRepo::delete(conn, &group, &id))
            .await
    }

    // ── Meal plans ──────────────────────────────────────────────────

    /// All meal plans of a group.
    pub async fn list_meal_plans(&self, group: &GroupId) -> Result<Vec<MealPlan>> {
        let group = group.clone();
        self.run(move |conn| MealPlanRepo::list(conn, &group)).await
    }

    /// Create a meal plan.
    pub async fn create_meal_plan(
        &self,
        group: &GroupId,
        user: &UserId,
        input: NewMealPlan,
    ) -> Result<MealPlan> {
        let (group, user) = (group.clone(), user.clone());
        self.run(move |conn| MealPlanRepo::create(conn, &group, &user, input))
            .await
    }

    /// Update a meal plan of a group.
    pub async fn update_meal_plan(
        &self,
        group: &GroupId,
        id: &RecordId,
        update: MealPlanUpdate,
    ) -> Result<MealPlan> {
        let (group, id) = (group.clone(), id.clone());
        self.run(move |conn| MealPlanRepo::update(conn, &group, &id, update))
            .await
    }

    /// Delete a meal plan of a group.
    pub async fn delete_meal_plan(&self, group: &GroupId, id: &RecordId) -> Result<()> {
        let (group, id) = (group.clone(), id.clone());
        self.run(move |conn| MealPlanRepo::delete(conn, &group, &id))
            .await
    }

    // ── Receipts ────────────────────────────────────────────────────

    /// All receipts of a group.
    pub async fn list_receipts(&self, group: &GroupId) -> Result<Vec<Receipt>> {
        let group = group.clone();
        self.run(move |conn| ReceiptRepo::list(conn, &group)).await
    }

    /// Create a receipt.
    pub async fn create_receipt(
        &self,
        group: &GroupId,
        user: &UserId,
        input: NewReceipt,
    ) -> Result<Receipt> {
        let (group, user) = (group.clone(), user.clone());
        self.run(move |conn| ReceiptRepo::create(conn, &group, &user, input))
            .await
    }

    /// Update a receipt of a group.
    pub async fn update_receipt(
        &self,
        group: &GroupId,
        id: &RecordId,
        update: ReceiptUpdate,
    ) -> Result<Receipt> {
        let (group, id) = (group.clone(), id.clone());
        self.run(move |conn| ReceiptRepo::update(conn, &group, &id, update))
            .await
    }

    /// Delete a receipt of a group.
    pub async fn delete_receipt(&self, group: &GroupId, id: &RecordId) -> Result<()> {
        let (group, id) = (group.clone(), id.clone());
        self.run(move |conn| ReceiptRepo::delete(conn, &group, &id))
            .await
    }
}

#[async_trait]
impl MembershipQuery for Store {
    async fn user_groups(&self, user: &UserId) -> Result<Vec<GroupId>> {
        let user = user.clone();
        self.run(move |conn| GroupRepo::group_ids_for_user(conn, &user))
            .await
    }
}
