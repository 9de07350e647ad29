//! Settings types.
//!
//! Every struct is `#[serde(default)]`, so a partial JSON file only needs to
//! name the keys it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Real-time fan-out tuning.
    pub realtime: RealtimeSettings,
    /// Record store.
    pub database: DatabaseSettings,
    /// Access-token validation.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.realtime.validate()?;
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "database.poolSize must be greater than 0".into(),
            ));
        }
        if self.auth.secret_key.is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.secretKey must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Connection keep-alive and dispatcher intake settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Deadline for any single outbound frame write.
    pub write_wait_ms: u64,
    /// Inbound idle budget; refreshed by every received frame including pongs.
    pub pong_wait_ms: u64,
    /// Ping interval. Must be shorter than `pong_wait_ms`.
    pub ping_period_ms: u64,
    /// Largest accepted inbound message.
    pub max_message_bytes: usize,
    /// Capacity of the dispatcher intake queue.
    pub intake_capacity: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            write_wait_ms: 10_000,
            pong_wait_ms: 60_000,
            ping_period_ms: 54_000,
            max_message_bytes: 512 * 1024,
            intake_capacity: 256,
        }
    }
}

impl RealtimeSettings {
    /// Write deadline as a [`Duration`].
    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    /// Idle budget as a [`Duration`].
    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    /// Ping interval as a [`Duration`].
    pub fn ping_period(&self) -> Duration {
        Duration::from_millis(self.ping_period_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.intake_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "realtime.intakeCapacity must be greater than 0".into(),
            ));
        }
        if self.write_wait_ms == 0 || self.ping_period_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "realtime timeouts must be greater than 0".into(),
            ));
        }
        if self.ping_period_ms >= self.pong_wait_ms {
            return Err(SettingsError::InvalidValue(format!(
                "realtime.pingPeriodMs ({}) must be shorter than realtime.pongWaitMs ({})",
                self.ping_period_ms, self.pong_wait_ms
            )));
        }
        Ok(())
    }
}

/// Record store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// SQLite file path. `:memory:` selects an in-memory database.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        Self {
            path: format!("{home}/.lebensmittel/lebensmittel.db"),
            pool_size: 8,
        }
    }
}

/// Access-token validation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC secret shared with the token issuer.
    pub secret_key: String,
    /// Allowed clock skew when checking `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: "your-secret-key-here".to_string(),
            leeway_secs: 0,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_match_keepalive_constants() {
        let rt = RealtimeSettings::default();
        assert_eq!(rt.write_wait(), Duration::from_secs(10));
        assert_eq!(rt.pong_wait(), Duration::from_secs(60));
        // ping period is nine tenths of the pong window
        assert_eq!(rt.ping_period(), rt.pong_wait() * 9 / 10);
        assert_eq!(rt.max_message_bytes, 512 * 1024);
    }

    #[test]
    fn default_settings_validate() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn ping_period_must_be_shorter_than_pong_wait() {
        let mut settings = Settings::default();
        settings.realtime.ping_period_ms = settings.realtime.pong_wait_ms;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("pingPeriodMs"));
    }

    #[test]
    fn zero_intake_capacity_rejected() {
        let mut settings = Settings::default();
        settings.realtime.intake_capacity = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn empty_secret_rejected() {
        let mut settings = Settings::default();
        settings.auth.secret_key.clear();
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("secretKey"));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["realtime"]["pongWaitMs"], 60_000);
        assert_eq!(json["database"]["poolSize"], 8);
        assert_eq!(json["server"]["port"], 8000);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"realtime": {"intakeCapacity": 16}}"#).unwrap();
        assert_eq!(settings.realtime.intake_capacity, 16);
        assert_eq!(settings.realtime.write_wait_ms, 10_000);
        assert_eq!(settings.server.host, "0.0.0.0");
    }
}
