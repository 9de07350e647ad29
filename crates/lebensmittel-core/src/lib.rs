//! # lebensmittel-core
//!
//! Shared vocabulary for the Lebensmittel crates:
//!
//! - **Branded IDs**: `UserId`, `GroupId`, `ConnectionId`, `RecordId` as newtypes
//! - **Logging**: `tracing` subscriber setup used by the binary and tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;

pub use ids::{ConnectionId, GroupId, RecordId, UserId};
