//! Configuration for the game server.

use std::path::Path;
use std::time::Duration;

use codebreak_core::SessionTiming;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener settings.
    pub network: NetworkConfig,
    /// Room layout and start-up handshake.
    pub rooms: RoomsConfig,
    /// Session clocks.
    pub timing: TimingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP port players connect to.
    pub port: u16,
    /// Address to bind.
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Number of rooms, numbered from 1.
    pub count: u32,
    /// How long both players get to answer `GAME_START`, in milliseconds.
    pub ready_timeout_ms: u64,
}

/// Session timing overrides. Durations in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub watchdog_tick_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub transient_timeout_ms: u64,
    pub permanent_timeout_ms: u64,
    pub status_interval_ms: u64,
    pub temporary_confirm_ms: u64,
    pub permanent_confirm_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 4242,
            bind: "0.0.0.0".into(),
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            count: 4,
            ready_timeout_ms: 10_000,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        let timing = SessionTiming::default();
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            watchdog_tick_ms: ms(timing.watchdog_tick),
            heartbeat_interval_ms: ms(timing.heartbeat_interval),
            transient_timeout_ms: ms(timing.transient_timeout),
            permanent_timeout_ms: ms(timing.permanent_timeout),
            status_interval_ms: ms(timing.status_interval),
            temporary_confirm_ms: ms(timing.temporary_confirm),
            permanent_confirm_ms: ms(timing.permanent_confirm),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// `bind:port` for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.rooms.ready_timeout_ms)
    }

    /// Session clocks. Zero periods are raised to one millisecond so the
    /// session's interval timers stay valid.
    pub fn session_timing(&self) -> SessionTiming {
        let t = &self.timing;
        let ms = |v: u64| Duration::from_millis(v);
        let period = |v: u64| Duration::from_millis(v.max(1));
        SessionTiming {
            watchdog_tick: period(t.watchdog_tick_ms),
            heartbeat_interval: period(t.heartbeat_interval_ms),
            transient_timeout: ms(t.transient_timeout_ms),
            permanent_timeout: ms(t.permanent_timeout_ms),
            status_interval: period(t.status_interval_ms),
            temporary_confirm: ms(t.temporary_confirm_ms),
            permanent_confirm: ms(t.permanent_confirm_ms),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
