//! # lebensmittel-server
//!
//! Axum HTTP + `WebSocket` server for the Lebensmittel household backend.
//!
//! - REST resources under `/api`: groups, grocery items, meal plans, receipts
//! - `WebSocket` gateway at `/ws`: authenticated, group-scoped event fan-out
//! - A single dispatcher task owns every live connection and group index
//! - Health and Prometheus endpoints
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use auth::{CredentialValidator, JwtValidator};
pub use config::{RealtimeConfig, ServerConfig};
pub use server::{AppState, LebensmittelServer};
pub use websocket::dispatcher::DispatcherHandle;
