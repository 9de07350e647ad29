//! # lebensmittel-settings
//!
//! Configuration with layered sources for the Lebensmittel backend.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`Settings::default()`]
//! 2. **User file**: `~/.lebensmittel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PORT`, `SECRET_KEY`, `DATABASE_PATH` and
//!    `LEBENSMITTEL_*` overrides (highest priority)
//!
//! There is no global instance: the binary loads a [`Settings`] value once
//! and hands the relevant sections to each subsystem.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
