//! Connection parameters for one bridge interface.
//!
//! The record is supplied by the host (typically deserialized from the node
//! configuration file) and borrowed for the lifetime of one start/stop
//! cycle; the interface never mutates or persists it.

use std::time::Duration;

use serde::Deserialize;

use crate::error::BridgeError;

/// Default TCP port, shared by client and server mode.
pub const DEFAULT_PORT: u16 = 4242;

/// Largest payload a single frame may carry.
pub const DEFAULT_MTU: usize = 1064;

/// Advertised link bitrate, read by the routing layer for path selection.
/// TCP backbones are effectively 10 Mbps+; advertising a realistic figure
/// lets the mesh prefer this interface over radio paths when both exist.
pub const BITRATE_BPS: u64 = 10_000_000;

/// Announce-rate cap advertised to the routing layer, in percent of link
/// capacity. Keeps backbone announce flooding in check.
pub const ANNOUNCE_CAP: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfaceMode {
    /// Listen for incoming connections from the backbone.
    Server,
    /// Connect out to a backbone TCP server.
    Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub mode: IfaceMode,

    /// Listen port (server mode).
    #[serde(default = "defaults::port")]
    pub listen_port: u16,

    /// Remote host to connect to (client mode). Hostname or address.
    #[serde(default)]
    pub target_host: String,

    /// Remote port to connect to (client mode).
    #[serde(default = "defaults::port")]
    pub target_port: u16,

    /// Connection slots held for the session (server mode).
    #[serde(default = "defaults::max_clients")]
    pub max_clients: usize,

    #[serde(default = "defaults::mtu")]
    pub mtu: usize,

    /// Bounds the outbound handshake.
    #[serde(default = "defaults::connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Bounds any individual send. Kept short so a stalled peer cannot
    /// stall the tick loop.
    #[serde(default = "defaults::write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// How long a connection may sit idle before it is forcibly recycled.
    /// 0 disables the idle teardown. Silently dead peers are common on
    /// radio-adjacent links and would otherwise leak a slot forever.
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Initial reconnect interval (client mode).
    #[serde(default = "defaults::reconnect_min_ms")]
    pub reconnect_min_ms: u64,

    /// Reconnect backoff ceiling (client mode).
    #[serde(default = "defaults::reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Interval between empty keepalive frames on idle links.
    #[serde(default = "defaults::keepalive_ms")]
    pub keepalive_ms: u64,
}

mod defaults {
    pub fn port() -> u16 {
        super::DEFAULT_PORT
    }
    pub fn max_clients() -> usize {
        8
    }
    pub fn mtu() -> usize {
        super::DEFAULT_MTU
    }
    pub fn connect_timeout_ms() -> u64 {
        6_000
    }
    pub fn write_timeout_ms() -> u64 {
        2_000
    }
    pub fn read_timeout_ms() -> u64 {
        120_000
    }
    pub fn reconnect_min_ms() -> u64 {
        10_000
    }
    pub fn reconnect_max_ms() -> u64 {
        120_000
    }
    pub fn keepalive_ms() -> u64 {
        30_000
    }
}

impl BridgeConfig {
    /// A server-mode record with defaults for everything but the port.
    pub fn server(listen_port: u16) -> Self {
        Self {
            mode: IfaceMode::Server,
            listen_port,
            target_host: String::new(),
            target_port: DEFAULT_PORT,
            max_clients: defaults::max_clients(),
            mtu: DEFAULT_MTU,
            connect_timeout_ms: defaults::connect_timeout_ms(),
            write_timeout_ms: defaults::write_timeout_ms(),
            read_timeout_ms: defaults::read_timeout_ms(),
            reconnect_min_ms: defaults::reconnect_min_ms(),
            reconnect_max_ms: defaults::reconnect_max_ms(),
            keepalive_ms: defaults::keepalive_ms(),
        }
    }

    /// A client-mode record with defaults for everything but the target.
    pub fn client(target_host: impl Into<String>, target_port: u16) -> Self {
        Self {
            mode: IfaceMode::Client,
            target_host: target_host.into(),
            target_port,
            ..Self::server(DEFAULT_PORT)
        }
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.mtu == 0 {
            return Err(BridgeError::Config("mtu must be nonzero".into()));
        }
        if self.max_clients == 0 {
            return Err(BridgeError::Config("max_clients must be nonzero".into()));
        }
        if self.mode == IfaceMode::Client && self.target_host.is_empty() {
            return Err(BridgeError::Config("client mode requires target_host".into()));
        }
        if self.reconnect_min_ms == 0 || self.reconnect_min_ms > self.reconnect_max_ms {
            return Err(BridgeError::Config(format!(
                "reconnect interval bounds out of order: {} > {}",
                self.reconnect_min_ms, self.reconnect_max_ms
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// `None` when the idle teardown is disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms != 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }

    pub fn reconnect_min(&self) -> Duration {
        Duration::from_millis(self.reconnect_min_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_ms)
    }
}
