//! # lebensmittel-store
//!
//! `SQLite` record store for groups, grocery items, meal plans, and receipts.
//!
//! - **[`connection`]**: `r2d2` pool with WAL mode and foreign keys on every connection.
//! - **[`migrations`]**: version-tracked schema, embedded at compile time.
//! - **[`repositories`]**: stateless structs whose methods take `&Connection`.
//! - **[`membership`]**: the user → groups query the realtime layer authorizes against.
//! - **[`store`]**: async facade running repository calls on the blocking pool.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod membership;
pub mod migrations;
pub mod models;
pub mod repositories;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
pub use errors::{Result, StoreError};
pub use membership::MembershipQuery;
pub use migrations::{current_version, latest_version, run_migrations};
pub use models::{
    GroceryItem, GroceryItemUpdate, Group, MealPlan, MealPlanUpdate, NewGroceryItem, NewMealPlan,
    NewReceipt, Receipt, ReceiptUpdate,
};
pub use store::Store;
