//! Server configuration.

use std::time::Duration;

use lebensmittel_settings::Settings;

/// Tuning for live connections and the dispatcher.
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// Deadline for any single outbound frame (event, welcome, echo, ping).
    pub write_wait: Duration,
    /// Inbound idle budget. Any received frame, pongs included, restarts it.
    pub pong_wait: Duration,
    /// Interval between server pings. Shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Largest accepted inbound message in bytes.
    pub max_message_bytes: usize,
    /// Dispatcher intake queue capacity.
    pub intake_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_message_bytes: 512 * 1024,
            intake_capacity: 256,
        }
    }
}

/// Configuration for the HTTP listener.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Realtime connection settings.
    pub realtime: RealtimeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            realtime: RealtimeConfig::default(),
        }
    }
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        let rt = &settings.realtime;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            realtime: RealtimeConfig {
                write_wait: rt.write_wait(),
                pong_wait: rt.pong_wait(),
                ping_period: rt.ping_period(),
                max_message_bytes: rt.max_message_bytes,
                intake_capacity: rt.intake_capacity,
            },
        }
    }
}
